use std::time::Instant;

use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;

use crate::auth::oauth::{self, OAuthError, GITHUB, GOOGLE};
use crate::auth::password;
use crate::auth::session::{self, ProviderGrant};
use crate::db::models::NewUser;
use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::extractors::{MaybeUser, SessionToken};
use crate::routes::home::{rejected, Html};
use crate::routes::Layout;
use crate::state::AppState;
use crate::validation::{self, FormErrors};

// -- Templates --

#[derive(Template)]
#[template(path = "pages/signup.html")]
pub struct SignupTemplate {
    pub layout: Layout,
    pub name: String,
    pub email: String,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
    pub email: String,
    pub errors: FormErrors,
}

// -- Request types --

#[derive(Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub state: String,
    pub code: Option<String>,
}

const BAD_CREDENTIALS: &str = "Email or Password is incorrect";

fn redirect_with_cookie(to: &str, cookie: Option<&str>) -> Response {
    let mut response = Redirect::to(to).into_response();
    if let Some(value) = cookie.and_then(|c| HeaderValue::from_str(c).ok()) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

// -- Signup --

/// GET /user/signup
pub async fn signup_page(user: MaybeUser) -> Response {
    if user.is_logged_in() {
        return Redirect::to("/").into_response();
    }
    Html(SignupTemplate {
        layout: Layout::new(None),
        name: String::new(),
        email: String::new(),
        errors: FormErrors::new(),
    })
    .into_response()
}

/// POST /user/signup
pub async fn signup(
    State(state): State<AppState>,
    Form(form): Form<SignupForm>,
) -> AppResult<Response> {
    let name = form.name.trim().to_string();
    let email = form.email.trim().to_string();

    let mut errors = validation::validate_signup(&name, &email, &form.password);
    {
        let conn = state.db.get()?;
        if !errors.has("name") && users::name_exists(&conn, &name)? {
            errors.add("name", "Name already exists");
        }
        if !errors.has("email") && users::email_exists(&conn, &email)? {
            errors.add("email", "Email already exists");
        }
    }
    if !errors.is_empty() {
        return Ok(rejected(SignupTemplate {
            layout: Layout::new(None),
            name,
            email,
            errors,
        }));
    }

    let cost = state.config.auth.bcrypt_cost;
    let hashed_password =
        tokio::task::spawn_blocking(move || password::hash(&form.password, cost))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;

    let conn = state.db.get()?;
    users::create(
        &conn,
        &NewUser {
            id: uuid::Uuid::now_v7().to_string(),
            name: name.clone(),
            email,
            hashed_password,
        },
    )?;
    tracing::info!("User {} registered", name);

    Ok(Redirect::to("/user/login").into_response())
}

// -- Login --

/// GET /user/login
pub async fn login_page(user: MaybeUser) -> Response {
    if user.is_logged_in() {
        return Redirect::to("/").into_response();
    }
    Html(LoginTemplate {
        layout: Layout::new(None),
        email: String::new(),
        errors: FormErrors::new(),
    })
    .into_response()
}

/// POST /user/login. Unknown email and wrong password read the same.
pub async fn login(
    State(state): State<AppState>,
    token: SessionToken,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let email = form.email.trim().to_string();
    let invalid = |email: String, errors: FormErrors| {
        rejected(LoginTemplate {
            layout: Layout::new(None),
            email,
            errors,
        })
    };

    let errors = validation::validate_login(&email, &form.password);
    if !errors.is_empty() {
        return Ok(invalid(email, errors));
    }

    let user = {
        let conn = state.db.get()?;
        users::get_by_email(&conn, &email)?
    };
    let verified = match &user {
        Some(user) => {
            let hashed = user.hashed_password.clone();
            tokio::task::spawn_blocking(move || password::verify(&form.password, &hashed))
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?
        }
        None => false,
    };
    let Some(user) = user.filter(|_| verified) else {
        let mut errors = FormErrors::new();
        errors.add("generic", BAD_CREDENTIALS);
        return Ok(invalid(email, errors));
    };

    let conn = state.db.get()?;
    let started = session::start(&conn, &state.config.auth, token.as_deref(), &user.id, None)?;
    tracing::debug!("User {} logged in", user.name);

    Ok(redirect_with_cookie("/", started.cookie()))
}

// -- Logout --

/// GET /user/logout: ends the session and revokes any Google token on it.
pub async fn logout(
    State(state): State<AppState>,
    user: MaybeUser,
    token: SessionToken,
) -> AppResult<Response> {
    if !user.is_logged_in() {
        return Ok(Redirect::to("/user/login").into_response());
    }

    let ended = {
        let conn = state.db.get()?;
        session::end(&conn, token.as_deref())?
    };

    if let Some(ended) = ended {
        if let (Some(GOOGLE), Some(access_token)) =
            (ended.provider.as_deref(), ended.provider_token.as_deref())
        {
            if let Err(e) = state.google.revoke(access_token).await {
                tracing::warn!("Failed to revoke Google token: {}", e);
            }
        }
    }

    Ok(redirect_with_cookie(
        "/",
        Some(&session::clear_session_cookie(&state.config.auth)),
    ))
}

// -- Federated login --

/// GET /login/google
pub async fn google_login(State(state): State<AppState>) -> AppResult<Response> {
    begin_oauth(&state, GOOGLE).await
}

/// GET /GoogleCallback
pub async fn google_callback(
    State(state): State<AppState>,
    token: SessionToken,
    Query(query): Query<CallbackQuery>,
) -> AppResult<Response> {
    finish_oauth(&state, GOOGLE, token, query).await
}

/// GET /login/github
pub async fn github_login(State(state): State<AppState>) -> AppResult<Response> {
    begin_oauth(&state, GITHUB).await
}

/// GET /login/github/callback
pub async fn github_callback(
    State(state): State<AppState>,
    token: SessionToken,
    Query(query): Query<CallbackQuery>,
) -> AppResult<Response> {
    finish_oauth(&state, GITHUB, token, query).await
}

async fn begin_oauth(state: &AppState, name: &'static str) -> AppResult<Response> {
    let provider = state.provider(name).ok_or(AppError::NotFound)?;
    let oauth_state = state.oauth_states.lock().await.issue(name, Instant::now());
    let url = provider.authorize_url(&oauth_state)?;
    Ok(Redirect::temporary(&url).into_response())
}

async fn finish_oauth(
    state: &AppState,
    name: &'static str,
    token: SessionToken,
    query: CallbackQuery,
) -> AppResult<Response> {
    let provider = state.provider(name).ok_or(AppError::NotFound)?;

    let state_ok = state
        .oauth_states
        .lock()
        .await
        .take(&query.state, name, Instant::now());
    if !state_ok {
        return Err(OAuthError::StateMismatch.into());
    }
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or(OAuthError::MissingCode)?;

    let access_token = provider.exchange_code(&code).await?;
    let identity = provider.fetch_identity(&access_token).await?;

    let conn = state.db.get()?;
    let reconciled = oauth::reconcile_identity(&conn, &identity)?;
    if reconciled.created {
        tracing::info!("Created user {} from {} login", identity.email, provider.name());
    }
    let started = session::start(
        &conn,
        &state.config.auth,
        token.as_deref(),
        &reconciled.user_id,
        Some(ProviderGrant {
            provider: provider.name(),
            access_token: &access_token,
        }),
    )?;

    Ok(redirect_with_cookie("/", started.cookie()))
}
