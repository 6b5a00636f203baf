//! Cookie sessions. The cookie always carries a token minted here; a
//! provider access token, when there is one, stays on the session row.

use chrono::{Duration, Utc};
use rand::Rng;
use rusqlite::Connection;

use crate::config::AuthConfig;
use crate::db::models::{Session, User};
use crate::db::{self, sessions, users};

/// Provider credentials to keep on a session created by a federated login.
#[derive(Debug, Clone, Copy)]
pub struct ProviderGrant<'a> {
    pub provider: &'a str,
    pub access_token: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStart {
    /// The browser already holds a session row for this user.
    Unchanged,
    Started { token: String, cookie: String },
}

impl SessionStart {
    pub fn cookie(&self) -> Option<&str> {
        match self {
            SessionStart::Unchanged => None,
            SessionStart::Started { cookie, .. } => Some(cookie),
        }
    }
}

/// Maps a cookie token to its user. Anything short of a live session for an
/// existing user is "not logged in"; storage failures are logged and treated
/// the same way.
pub fn resolve(conn: &Connection, token: Option<&str>) -> Option<User> {
    let token = token.filter(|t| !t.is_empty())?;
    match lookup(conn, token) {
        Ok(user) => user,
        Err(e) => {
            tracing::error!("Session lookup failed: {}", e);
            None
        }
    }
}

fn lookup(conn: &Connection, token: &str) -> rusqlite::Result<Option<User>> {
    match sessions::active_user_id(conn, token, &db::now())? {
        Some(user_id) => users::get_by_id(conn, &user_id),
        None => Ok(None),
    }
}

/// Begins a session for `user_id`.
///
/// A cookie naming a live session row of the same user keeps that row and its
/// expiry; only the provider credentials of a federated login are written
/// onto it. A cookie naming a missing row, an expired row or another user's
/// row is replaced: the old row is deleted and a new token minted.
pub fn start(
    conn: &Connection,
    auth: &AuthConfig,
    existing: Option<&str>,
    user_id: &str,
    grant: Option<ProviderGrant<'_>>,
) -> rusqlite::Result<SessionStart> {
    if let Some(existing) = existing.filter(|t| !t.is_empty()) {
        match sessions::get(conn, existing)? {
            Some(session) if session.user_id == user_id && session.expires_at > db::now() => {
                if let Some(grant) = grant {
                    sessions::set_provider(conn, existing, grant.provider, grant.access_token)?;
                }
                return Ok(SessionStart::Unchanged);
            }
            Some(_) => {
                tracing::debug!("Session cookie is stale or belongs to another user, replacing it");
                sessions::delete(conn, existing)?;
            }
            None => tracing::debug!("Session cookie has no matching row, replacing it"),
        }
    }

    let token = generate_token();
    let now = Utc::now();
    sessions::create(
        conn,
        &Session {
            id: token.clone(),
            user_id: user_id.to_string(),
            provider: grant.map(|g| g.provider.to_string()),
            provider_token: grant.map(|g| g.access_token.to_string()),
            created_at: db::timestamp(now),
            expires_at: db::timestamp(now + Duration::hours(auth.session_hours as i64)),
        },
    )?;

    let cookie = session_cookie(auth, &token);
    Ok(SessionStart::Started { token, cookie })
}

/// Removes the session row behind `token`, returning it so the caller can
/// revoke any provider token it carried.
pub fn end(conn: &Connection, token: Option<&str>) -> rusqlite::Result<Option<Session>> {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    let session = sessions::get(conn, token)?;
    sessions::delete(conn, token)?;
    Ok(session)
}

pub fn session_cookie(auth: &AuthConfig, token: &str) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        auth.cookie_name,
        token,
        auth.session_hours * 3600
    );
    if auth.secure_cookie {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_session_cookie(auth: &AuthConfig) -> String {
    format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
        auth.cookie_name
    )
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
