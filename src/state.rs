use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tokio::sync::Mutex;

use crate::auth::oauth::{GitHub, Google, IdentityProvider};
use crate::auth::oauth_state::OAuthStateStore;
use crate::config::Config;
use crate::rate_limit::{FixedWindowLimiter, RateLimiter, SystemClock};

pub type DbPool = Pool<SqliteConnectionManager>;

pub const GOOGLE_CALLBACK_PATH: &str = "/GoogleCallback";
pub const GITHUB_CALLBACK_PATH: &str = "/login/github/callback";

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub limiter: Arc<dyn RateLimiter>,
    pub oauth_states: Arc<Mutex<OAuthStateStore>>,
    pub google: Arc<dyn IdentityProvider>,
    pub github: Arc<dyn IdentityProvider>,
}

impl AppState {
    /// State wired to the real providers and the wall clock.
    pub fn new(db: DbPool, config: Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("forum/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()?;

        let google = Google::new(
            http.clone(),
            config.google.clone(),
            config.redirect_url(&config.google, GOOGLE_CALLBACK_PATH),
        );
        let github = GitHub::new(
            http,
            config.github.clone(),
            config.redirect_url(&config.github, GITHUB_CALLBACK_PATH),
        );
        let limiter = FixedWindowLimiter::new(
            SystemClock,
            config.rate_limit.max_requests,
            Duration::from_millis(config.rate_limit.window_ms),
        );

        Ok(Self {
            db,
            config,
            limiter: Arc::new(limiter),
            oauth_states: Arc::new(Mutex::new(OAuthStateStore::new())),
            google: Arc::new(google),
            github: Arc::new(github),
        })
    }

    pub fn with_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_providers(
        mut self,
        google: Arc<dyn IdentityProvider>,
        github: Arc<dyn IdentityProvider>,
    ) -> Self {
        self.google = google;
        self.github = github;
        self
    }

    pub fn provider(&self, name: &str) -> Option<&Arc<dyn IdentityProvider>> {
        match name {
            crate::auth::oauth::GOOGLE => Some(&self.google),
            crate::auth::oauth::GITHUB => Some(&self.github),
            _ => None,
        }
    }
}
