use axum::routing::get;
use axum::Router;

use crate::auth::handlers;
use crate::state::{AppState, GITHUB_CALLBACK_PATH, GOOGLE_CALLBACK_PATH};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/user/signup",
            get(handlers::signup_page).post(handlers::signup),
        )
        .route("/user/login", get(handlers::login_page).post(handlers::login))
        .route("/user/logout", get(handlers::logout))
        .route("/login/google", get(handlers::google_login))
        .route(GOOGLE_CALLBACK_PATH, get(handlers::google_callback))
        .route("/login/github", get(handlers::github_login))
        .route("/login/github/", get(handlers::github_login))
        .route(GITHUB_CALLBACK_PATH, get(handlers::github_callback))
}
