use askama::Template;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::db::models::User;
use crate::db::{comments, posts};
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::routes::home::Html;
use crate::routes::{
    comment_cards, comment_cards_for_user, filters, post_cards, post_cards_for_user, CommentCard,
    Layout, PostCard,
};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/profile.html")]
pub struct ProfileTemplate {
    pub layout: Layout,
    pub profile: User,
    pub post_count: usize,
    pub comment_count: usize,
}

#[derive(Template)]
#[template(path = "pages/profile_posts.html")]
pub struct ProfilePostsTemplate {
    pub layout: Layout,
    pub heading: &'static str,
    pub posts: Vec<PostCard>,
}

#[derive(Template)]
#[template(path = "pages/profile_comments.html")]
pub struct ProfileCommentsTemplate {
    pub layout: Layout,
    pub heading: &'static str,
    pub comments: Vec<CommentCard>,
}

#[derive(Template)]
#[template(path = "pages/profile_activity.html")]
pub struct ActivityTemplate {
    pub layout: Layout,
    pub posts: Vec<PostCard>,
    pub comments: Vec<CommentCard>,
    pub reacted_posts: Vec<PostCard>,
    pub reacted_comments: Vec<CommentCard>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user/profile", get(overview))
        .route("/user/profile/posts", get(own_posts))
        .route("/user/profile/comments", get(own_comments))
        .route("/user/profile/post/reactions", get(reacted_posts))
        .route("/user/profile/comment/reactions", get(reacted_comments))
        .route("/user/profile/activity", get(activity))
}

/// GET /user/profile
pub async fn overview(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let post_count = posts::list_by_user(&conn, &user.id)?.len();
    let comment_count = comments::list_by_user(&conn, &user.id)?.len();

    Ok(Html(ProfileTemplate {
        layout: Layout::new(Some(user.clone())),
        profile: user,
        post_count,
        comment_count,
    })
    .into_response())
}

pub async fn own_posts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let cards = post_cards(&conn, posts::list_by_user(&conn, &user.id)?)?;
    Ok(Html(ProfilePostsTemplate {
        layout: Layout::new(Some(user)),
        heading: "My posts",
        posts: cards,
    })
    .into_response())
}

pub async fn own_comments(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let cards = comment_cards(&conn, comments::list_by_user(&conn, &user.id)?)?;
    Ok(Html(ProfileCommentsTemplate {
        layout: Layout::new(Some(user)),
        heading: "My comments",
        comments: cards,
    })
    .into_response())
}

/// Counts shown here are the user's own likes and dislikes.
pub async fn reacted_posts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let cards = post_cards_for_user(&conn, &user.id, posts::list_reacted_by_user(&conn, &user.id)?)?;
    Ok(Html(ProfilePostsTemplate {
        layout: Layout::new(Some(user)),
        heading: "Posts I reacted to",
        posts: cards,
    })
    .into_response())
}

pub async fn reacted_comments(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let cards = comment_cards_for_user(
        &conn,
        &user.id,
        comments::list_reacted_by_user(&conn, &user.id)?,
    )?;
    Ok(Html(ProfileCommentsTemplate {
        layout: Layout::new(Some(user)),
        heading: "Comments I reacted to",
        comments: cards,
    })
    .into_response())
}

/// GET /user/profile/activity: everything above on one page.
pub async fn activity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let page = ActivityTemplate {
        posts: post_cards(&conn, posts::list_by_user(&conn, &user.id)?)?,
        comments: comment_cards(&conn, comments::list_by_user(&conn, &user.id)?)?,
        reacted_posts: post_cards_for_user(
            &conn,
            &user.id,
            posts::list_reacted_by_user(&conn, &user.id)?,
        )?,
        reacted_comments: comment_cards_for_user(
            &conn,
            &user.id,
            comments::list_reacted_by_user(&conn, &user.id)?,
        )?,
        layout: Layout::new(Some(user)),
    };
    Ok(Html(page).into_response())
}
