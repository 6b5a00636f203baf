pub mod assets;
pub mod auth;
pub mod home;
pub mod posts;
pub mod profile;

use std::collections::HashMap;

use askama::Template;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chrono::Datelike;
use rusqlite::Connection;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::db::models::{Comment, Post, ReactionCounts, User};
use crate::db::{comments, reactions};
use crate::extractors::MaybeUser;
use crate::routes::home::Html;
use crate::state::AppState;

/// Categories offered on the post form and the filter.
pub const CATEGORIES: &[&str] = &[
    "General",
    "Technology",
    "Science",
    "Sports",
    "Music",
    "Movies",
    "Gaming",
    "Travel",
];

/// Builds the full application: every route, the 404 fallback, and the
/// middleware stack.
pub fn app(state: AppState) -> Router {
    let uploads = ServeDir::new(state.config.uploads_path());

    let mut router = Router::new()
        .merge(home::router())
        .merge(posts::router())
        .merge(profile::router())
        .merge(auth::router())
        .route("/static/{*path}", get(assets::serve))
        .nest_service("/uploads", uploads)
        .fallback(not_found)
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-xss-protection"),
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("deny"),
        ));

    if state.config.rate_limit.enabled {
        router = router.layer(middleware::from_fn_with_state(
            state.clone(),
            crate::rate_limit::enforce,
        ));
    }

    router
        .layer(middleware::from_fn(crate::tls::strip_www))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Per-page chrome: who is logged in and the footer year.
pub struct Layout {
    pub user: Option<User>,
    pub current_year: i32,
}

impl Layout {
    pub fn new(user: Option<User>) -> Self {
        Self {
            user,
            current_year: chrono::Local::now().year(),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }
}

/// A post with the counts shown next to it.
pub struct PostCard {
    pub post: Post,
    pub comments: i64,
    pub reactions: ReactionCounts,
}

/// A comment with its like/dislike counts.
pub struct CommentCard {
    pub comment: Comment,
    pub reactions: ReactionCounts,
}

/// Enriches posts with comment and reaction totals, one grouped query per
/// aggregate.
pub fn post_cards(conn: &Connection, posts: Vec<Post>) -> rusqlite::Result<Vec<PostCard>> {
    let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
    let comment_counts = comments::counts_by_post(conn, &ids)?;
    let reaction_counts = reactions::post_counts(conn, &ids)?;
    Ok(cards(posts, &reaction_counts, |p| {
        comment_counts.get(&p.id).copied().unwrap_or(0)
    }))
}

/// Like [`post_cards`] but the reaction counts are only `user_id`'s own.
pub fn post_cards_for_user(
    conn: &Connection,
    user_id: &str,
    posts: Vec<Post>,
) -> rusqlite::Result<Vec<PostCard>> {
    let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
    let comment_counts = comments::counts_by_post(conn, &ids)?;
    let reaction_counts = reactions::post_counts_by_user(conn, user_id, &ids)?;
    Ok(cards(posts, &reaction_counts, |p| {
        comment_counts.get(&p.id).copied().unwrap_or(0)
    }))
}

fn cards(
    posts: Vec<Post>,
    reaction_counts: &HashMap<String, ReactionCounts>,
    comment_count: impl Fn(&Post) -> i64,
) -> Vec<PostCard> {
    posts
        .into_iter()
        .map(|post| PostCard {
            comments: comment_count(&post),
            reactions: reaction_counts.get(&post.id).copied().unwrap_or_default(),
            post,
        })
        .collect()
}

pub fn comment_cards(
    conn: &Connection,
    comments: Vec<Comment>,
) -> rusqlite::Result<Vec<CommentCard>> {
    let ids: Vec<&str> = comments.iter().map(|c| c.id.as_str()).collect();
    let counts = reactions::comment_counts(conn, &ids)?;
    Ok(attach_comment_counts(comments, &counts))
}

pub fn comment_cards_for_user(
    conn: &Connection,
    user_id: &str,
    comments: Vec<Comment>,
) -> rusqlite::Result<Vec<CommentCard>> {
    let ids: Vec<&str> = comments.iter().map(|c| c.id.as_str()).collect();
    let counts = reactions::comment_counts_by_user(conn, user_id, &ids)?;
    Ok(attach_comment_counts(comments, &counts))
}

fn attach_comment_counts(
    comments: Vec<Comment>,
    counts: &HashMap<String, ReactionCounts>,
) -> Vec<CommentCard> {
    comments
        .into_iter()
        .map(|comment| CommentCard {
            reactions: counts.get(&comment.id).copied().unwrap_or_default(),
            comment,
        })
        .collect()
}

pub mod filters {
    use chrono::{Local, NaiveDateTime, TimeZone, Utc};

    /// Renders a stored UTC timestamp as local "15:04 on 02 Jan 2006".
    pub fn human_date<T: std::fmt::Display>(stored: T) -> askama::Result<String> {
        let stored = stored.to_string();
        let Ok(naive) = NaiveDateTime::parse_from_str(&stored, crate::db::TIMESTAMP_FORMAT) else {
            return Ok(String::new());
        };
        let local = Utc.from_utc_datetime(&naive).with_timezone(&Local);
        Ok(local.format("%H:%M on %d %b %Y").to_string())
    }
}

#[derive(Template)]
#[template(path = "pages/not_found.html")]
pub struct NotFoundTemplate {
    pub layout: Layout,
}

pub async fn not_found(user: MaybeUser) -> Response {
    let mut response = Html(NotFoundTemplate {
        layout: Layout::new(user.0),
    })
    .into_response();
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}
