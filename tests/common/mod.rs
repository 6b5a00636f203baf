//! Shared harness: an in-memory store, a scratch uploads directory and
//! helpers for driving the router with `oneshot`.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use forum::auth::oauth::{ExternalIdentity, IdentityProvider, OAuthError, GITHUB, GOOGLE};
use forum::config::Config;
use forum::db;
use forum::state::AppState;
use tempfile::TempDir;
use tower::ServiceExt;

pub const PASSWORD: &str = "Passw0rd!";

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    _dir: TempDir,
}

pub fn config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.rate_limit.enabled = false;
    config.auth.secure_cookie = false;
    config.auth.bcrypt_cost = 4;
    config.tls.enabled = false;
    config.storage.path = Some(dir.path().join("uploads"));
    config
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(|config| config, |state| state)
    }

    /// Builds the app after letting the caller adjust config and state.
    pub fn with(
        configure: impl FnOnce(Config) -> Config,
        wire: impl FnOnce(AppState) -> AppState,
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let pool = db::memory_pool().unwrap();
        db::run_migrations(&pool).unwrap();
        let state = wire(AppState::new(pool, configure(config(&dir))).unwrap());
        Self {
            router: forum::app(state.clone()),
            state,
            _dir: dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        self.send(get(uri, cookie)).await
    }

    pub async fn post_form(&self, uri: &str, body: &str, cookie: Option<&str>) -> Response<Body> {
        self.send(form(uri, body, cookie)).await
    }

    pub async fn signup(&self, name: &str) -> Response<Body> {
        let body = format!("name={name}&email={name}%40example.com&password={PASSWORD}");
        self.post_form("/user/signup", &body, None).await
    }

    /// Registers `name` and returns the `session=<token>` pair to send back.
    pub async fn login_as(&self, name: &str) -> String {
        let response = self.signup(name).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let body = format!("email={name}%40example.com&password={PASSWORD}");
        let response = self.post_form("/user/login", &body, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_pair(&response).expect("login sets a session cookie")
    }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

const BOUNDARY: &str = "forum-test-boundary";

/// A multipart/form-data request with text fields and an optional file.
pub fn multipart(
    uri: &str,
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &[u8])>,
    cookie: Option<&str>,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("response has a Location header")
        .to_str()
        .unwrap()
        .to_string()
}

/// The `name=value` part of the session Set-Cookie header.
pub fn session_pair(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("session="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

/// Provider double that hands back a fixed identity.
pub struct StubProvider {
    pub name: &'static str,
    pub identity: ExternalIdentity,
    pub revoked: AtomicBool,
}

impl StubProvider {
    pub fn new(name: &'static str, email: &str, display_name: &str) -> Arc<Self> {
        Arc::new(Self {
            name,
            identity: ExternalIdentity {
                provider_id: (name == GOOGLE).then(|| "109876543210".to_string()),
                email: email.to_string(),
                name: display_name.to_string(),
            },
            revoked: AtomicBool::new(false),
        })
    }

    pub fn was_revoked(&self) -> bool {
        self.revoked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for StubProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn authorize_url(&self, state: &str) -> Result<String, OAuthError> {
        Ok(format!("https://{}.test/authorize?state={}", self.name, state))
    }

    async fn exchange_code(&self, code: &str) -> Result<String, OAuthError> {
        if code == "good-code" {
            Ok(format!("{}-access-token", self.name))
        } else {
            Err(OAuthError::Provider("bad_verification_code".into()))
        }
    }

    async fn fetch_identity(&self, _access_token: &str) -> Result<ExternalIdentity, OAuthError> {
        Ok(self.identity.clone())
    }

    async fn revoke(&self, _access_token: &str) -> Result<(), OAuthError> {
        self.revoked.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub fn stub_github(email: &str, name: &str) -> Arc<StubProvider> {
    StubProvider::new(GITHUB, email, name)
}
