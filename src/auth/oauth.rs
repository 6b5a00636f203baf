//! Federated login against Google and GitHub (OAuth2 authorization-code
//! flow) and reconciliation of the returned identity with local users.

use async_trait::async_trait;
use rusqlite::Connection;
use serde::Deserialize;

use crate::auth::password::UNUSABLE_PASSWORD;
use crate::config::OAuthClientConfig;
use crate::db::models::NewUser;
use crate::db::users;

pub const GOOGLE: &str = "google";
pub const GITHUB: &str = "github";

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const GOOGLE_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";
const GOOGLE_SCOPES: &str = "https://www.googleapis.com/auth/userinfo.profile \
                             https://www.googleapis.com/auth/userinfo.email";

const GITHUB_AUTH_URL: &str = "https://github.com/login/oauth/authorize";
const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const GITHUB_USER_URL: &str = "https://api.github.com/user";
const GITHUB_EMAILS_URL: &str = "https://api.github.com/user/emails";

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("state parameter does not match a pending login")]
    StateMismatch,

    #[error("{0} login is not configured")]
    NotConfigured(&'static str),

    #[error("callback is missing the authorization code")]
    MissingCode,

    #[error("request to provider failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider rejected the request: {0}")]
    Provider(String),

    #[error("provider returned no email address")]
    MissingEmail,

    #[error("invalid provider URL: {0}")]
    Url(#[from] url::ParseError),
}

/// The profile fields a provider hands back after a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    /// Stable provider-side id, used as the local user id when present.
    pub provider_id: Option<String>,
    pub email: String,
    pub name: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// URL the browser is sent to, carrying `state` for the callback check.
    fn authorize_url(&self, state: &str) -> Result<String, OAuthError>;

    async fn exchange_code(&self, code: &str) -> Result<String, OAuthError>;

    async fn fetch_identity(&self, access_token: &str) -> Result<ExternalIdentity, OAuthError>;

    /// Providers without a revocation endpoint keep the default no-op.
    async fn revoke(&self, _access_token: &str) -> Result<(), OAuthError> {
        Ok(())
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl TokenResponse {
    fn into_token(self) -> Result<String, OAuthError> {
        match self.access_token.filter(|t| !t.is_empty()) {
            Some(token) => Ok(token),
            None => Err(OAuthError::Provider(
                self.error_description
                    .or(self.error)
                    .unwrap_or_else(|| "no access token in response".to_string()),
            )),
        }
    }
}

pub struct Google {
    http: reqwest::Client,
    client: OAuthClientConfig,
    redirect_url: String,
}

impl Google {
    pub fn new(http: reqwest::Client, client: OAuthClientConfig, redirect_url: String) -> Self {
        Self {
            http,
            client,
            redirect_url,
        }
    }

    fn ensure_configured(&self) -> Result<(), OAuthError> {
        if self.client.is_configured() {
            Ok(())
        } else {
            Err(OAuthError::NotConfigured(GOOGLE))
        }
    }
}

#[derive(Deserialize)]
struct GoogleUser {
    id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    given_name: String,
}

#[async_trait]
impl IdentityProvider for Google {
    fn name(&self) -> &'static str {
        GOOGLE
    }

    fn authorize_url(&self, state: &str) -> Result<String, OAuthError> {
        self.ensure_configured()?;
        let url = url::Url::parse_with_params(
            GOOGLE_AUTH_URL,
            &[
                ("client_id", self.client.client_id.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", GOOGLE_SCOPES),
                ("state", state),
            ],
        )?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<String, OAuthError> {
        self.ensure_configured()?;
        let response: TokenResponse = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.client.client_id.as_str()),
                ("client_secret", self.client.client_secret.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?
            .json()
            .await?;
        response.into_token()
    }

    async fn fetch_identity(&self, access_token: &str) -> Result<ExternalIdentity, OAuthError> {
        let user: GoogleUser = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if user.email.is_empty() {
            return Err(OAuthError::MissingEmail);
        }
        let name = if user.given_name.is_empty() {
            user.name
        } else {
            user.given_name
        };
        Ok(ExternalIdentity {
            provider_id: Some(user.id),
            email: user.email,
            name,
        })
    }

    async fn revoke(&self, access_token: &str) -> Result<(), OAuthError> {
        self.http
            .post(GOOGLE_REVOKE_URL)
            .query(&[("token", access_token)])
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

pub struct GitHub {
    http: reqwest::Client,
    client: OAuthClientConfig,
    redirect_url: String,
}

impl GitHub {
    pub fn new(http: reqwest::Client, client: OAuthClientConfig, redirect_url: String) -> Self {
        Self {
            http,
            client,
            redirect_url,
        }
    }

    fn ensure_configured(&self) -> Result<(), OAuthError> {
        if self.client.is_configured() {
            Ok(())
        } else {
            Err(OAuthError::NotConfigured(GITHUB))
        }
    }
}

#[derive(Deserialize)]
struct GitHubUser {
    login: String,
    name: Option<String>,
    email: Option<String>,
}

#[derive(Deserialize)]
struct GitHubEmail {
    email: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    verified: bool,
}

/// The primary address if GitHub has verified it, else any verified one.
/// Unverified addresses are skipped.
fn pick_verified_email(emails: Vec<GitHubEmail>) -> Option<String> {
    let verified: Vec<GitHubEmail> = emails
        .into_iter()
        .filter(|e| e.verified && !e.email.is_empty())
        .collect();
    let position = verified.iter().position(|e| e.primary).unwrap_or(0);
    verified.into_iter().nth(position).map(|e| e.email)
}

#[async_trait]
impl IdentityProvider for GitHub {
    fn name(&self) -> &'static str {
        GITHUB
    }

    fn authorize_url(&self, state: &str) -> Result<String, OAuthError> {
        self.ensure_configured()?;
        let url = url::Url::parse_with_params(
            GITHUB_AUTH_URL,
            &[
                ("client_id", self.client.client_id.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("scope", "user:email"),
                ("state", state),
            ],
        )?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<String, OAuthError> {
        self.ensure_configured()?;
        let response: TokenResponse = self
            .http
            .post(GITHUB_TOKEN_URL)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&serde_json::json!({
                "client_id": self.client.client_id,
                "client_secret": self.client.client_secret,
                "code": code,
            }))
            .send()
            .await?
            .json()
            .await?;
        response.into_token()
    }

    async fn fetch_identity(&self, access_token: &str) -> Result<ExternalIdentity, OAuthError> {
        let authorization = format!("token {access_token}");

        let user: GitHubUser = self
            .http
            .get(GITHUB_USER_URL)
            .header(reqwest::header::AUTHORIZATION, &authorization)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // Private addresses are only listed on the emails endpoint.
        let email = match user.email.filter(|e| !e.is_empty()) {
            Some(email) => email,
            None => {
                let emails: Vec<GitHubEmail> = self
                    .http
                    .get(GITHUB_EMAILS_URL)
                    .header(reqwest::header::AUTHORIZATION, &authorization)
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                pick_verified_email(emails).ok_or(OAuthError::MissingEmail)?
            }
        };

        Ok(ExternalIdentity {
            provider_id: None,
            email,
            name: user.name.filter(|n| !n.is_empty()).unwrap_or(user.login),
        })
    }
}

/// Outcome of matching an external identity against local users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub user_id: String,
    pub created: bool,
}

/// Finds the local user with exactly the identity's email, then the user
/// keyed by the provider id, creating one when neither exists. Emails are
/// compared as given, without normalization.
pub fn reconcile_identity(
    conn: &Connection,
    identity: &ExternalIdentity,
) -> rusqlite::Result<Reconciled> {
    if let Some(user) = users::get_by_email(conn, &identity.email)? {
        return Ok(Reconciled {
            user_id: user.id,
            created: false,
        });
    }

    // A provider account whose email changed since its first login.
    if let Some(provider_id) = &identity.provider_id {
        if let Some(user) = users::get_by_id(conn, provider_id)? {
            return Ok(Reconciled {
                user_id: user.id,
                created: false,
            });
        }
    }

    let id = identity
        .provider_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let name = available_name(conn, identity, &id)?;

    users::create(
        conn,
        &NewUser {
            id: id.clone(),
            name,
            email: identity.email.clone(),
            hashed_password: UNUSABLE_PASSWORD.to_string(),
        },
    )?;

    Ok(Reconciled {
        user_id: id,
        created: true,
    })
}

// Names are unique locally but not across providers.
fn available_name(
    conn: &Connection,
    identity: &ExternalIdentity,
    id: &str,
) -> rusqlite::Result<String> {
    let base = match identity.name.trim() {
        "" => identity
            .email
            .split('@')
            .next()
            .unwrap_or_default()
            .to_string(),
        name => name.to_string(),
    };
    if !users::name_exists(conn, &base)? {
        return Ok(base);
    }
    let suffix: String = id.chars().filter(char::is_ascii_alphanumeric).take(6).collect();
    Ok(format!("{base}-{suffix}"))
}
