use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::db::filter::PostFilter;
use crate::db::posts;
use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::routes::{filters, post_cards, Layout, PostCard, CATEGORIES};
use crate::state::AppState;
use crate::validation::{self, FormErrors};

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub layout: Layout,
    pub posts: Vec<PostCard>,
    pub search: String,
    pub errors: FormErrors,
    pub categories: &'static [&'static str],
}

impl HomeTemplate {
    fn new(layout: Layout, posts: Vec<PostCard>) -> Self {
        Self {
            layout,
            posts,
            search: String::new(),
            errors: FormErrors::new(),
            categories: CATEGORIES,
        }
    }
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// Renders a form page with a 400 status so clients can tell it was rejected.
pub fn rejected<T: Template>(template: T) -> Response {
    let mut response = Html(template).into_response();
    if response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::BAD_REQUEST;
    }
    response
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/search", get(search))
        .route("/filter", post(filter))
}

/// GET /: every post, newest first.
pub async fn index(State(state): State<AppState>, user: MaybeUser) -> AppResult<Response> {
    let conn = state.db.get()?;
    let cards = post_cards(&conn, posts::list_all(&conn)?)?;
    Ok(Html(HomeTemplate::new(Layout::new(user.0), cards)).into_response())
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub search: String,
}

/// GET /search?search=
pub async fn search(
    State(state): State<AppState>,
    user: MaybeUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Response> {
    let errors = validation::validate_search(&query.search);
    if !errors.is_empty() {
        let mut page = HomeTemplate::new(Layout::new(user.0), Vec::new());
        page.search = query.search;
        page.errors = errors;
        return Ok(rejected(page));
    }

    let conn = state.db.get()?;
    let cards = post_cards(&conn, posts::search(&conn, &query.search)?)?;

    let mut page = HomeTemplate::new(Layout::new(user.0), cards);
    page.search = query.search;
    Ok(Html(page).into_response())
}

/// POST /filter: `category-filter` and `likes-filter` may repeat.
pub async fn filter(
    State(state): State<AppState>,
    user: MaybeUser,
    Form(fields): Form<Vec<(String, String)>>,
) -> AppResult<Response> {
    let (filter, errors) = parse_filter(&fields);
    if !errors.is_empty() {
        let mut page = HomeTemplate::new(Layout::new(user.0), Vec::new());
        page.errors = errors;
        return Ok(rejected(page));
    }

    let conn = state.db.get()?;
    let cards = post_cards(&conn, posts::list_filtered(&conn, &filter)?)?;
    Ok(Html(HomeTemplate::new(Layout::new(user.0), cards)).into_response())
}

fn parse_filter(fields: &[(String, String)]) -> (PostFilter, FormErrors) {
    let mut errors = FormErrors::new();
    let values = |key: &'static str| {
        fields
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.trim())
    };

    let from_date = match values("date-filter").find(|v| !v.is_empty()) {
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                errors.add("date", "Date must be in YYYY-MM-DD format");
                None
            }
        },
        None => None,
    };

    // Unparseable bucket values are skipped.
    let likes = values("likes-filter").filter_map(|v| v.parse::<i64>().ok());

    let filter = PostFilter::new()
        .categories(values("category-filter"))
        .from_date(from_date)
        .like_buckets(likes);
    (filter, errors)
}
