use askama::Template;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use bytes::Bytes;
use serde::Deserialize;

use crate::db::models::{NewComment, NewPost, ReactionKind, CATEGORY_SEPARATOR};
use crate::db::{comments, posts, reactions};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::routes::home::{rejected, Html};
use crate::routes::{comment_cards, filters, post_cards, CommentCard, Layout, PostCard, CATEGORIES};
use crate::state::AppState;
use crate::upload;
use crate::validation::{self, FormErrors, ImageMeta, IMAGE_MAX_BYTES};

/// Leaves room above the image limit so oversized files reach validation
/// instead of failing at the body limit.
const CREATE_BODY_LIMIT: usize = 2 * IMAGE_MAX_BYTES;

#[derive(Template)]
#[template(path = "pages/post.html")]
pub struct PostTemplate {
    pub layout: Layout,
    pub card: PostCard,
    pub comments: Vec<CommentCard>,
    pub comment: String,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "pages/create.html")]
pub struct CreateTemplate {
    pub layout: Layout,
    pub categories: &'static [&'static str],
    pub title: String,
    pub content: String,
    pub selected: Vec<String>,
    pub errors: FormErrors,
}

impl CreateTemplate {
    fn is_selected(&self, category: &str) -> bool {
        self.selected.iter().any(|c| c == category)
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/post", get(show))
        .route("/post/", get(show))
        .route(
            "/post/create",
            get(create_page)
                .post(create)
                .layer(DefaultBodyLimit::max(CREATE_BODY_LIMIT)),
        )
        .route("/post/comment", post(comment))
        .route("/post/reaction", post(react))
        .route("/post/comment/reaction", post(react_to_comment))
}

#[derive(Deserialize)]
pub struct PostQuery {
    pub id: Option<String>,
}

/// GET /post?id=
pub async fn show(
    State(state): State<AppState>,
    user: MaybeUser,
    Query(query): Query<PostQuery>,
) -> AppResult<Response> {
    let id = query.id.filter(|id| !id.is_empty()).ok_or(AppError::NotFound)?;
    let page = post_page(&state, Layout::new(user.0), &id, String::new(), FormErrors::new())?;
    Ok(Html(page).into_response())
}

fn post_page(
    state: &AppState,
    layout: Layout,
    post_id: &str,
    comment: String,
    errors: FormErrors,
) -> AppResult<PostTemplate> {
    let conn = state.db.get()?;
    let post = posts::get(&conn, post_id)?.ok_or(AppError::NotFound)?;
    let card = post_cards(&conn, vec![post])?
        .pop()
        .ok_or_else(|| AppError::Internal("post card missing".into()))?;
    let comments = comment_cards(&conn, comments::list_by_post(&conn, post_id)?)?;

    Ok(PostTemplate {
        layout,
        card,
        comments,
        comment,
        errors,
    })
}

/// GET /post/create
pub async fn create_page(CurrentUser(user): CurrentUser) -> Response {
    Html(CreateTemplate {
        layout: Layout::new(Some(user)),
        categories: CATEGORIES,
        title: String::new(),
        content: String::new(),
        selected: Vec::new(),
        errors: FormErrors::new(),
    })
    .into_response()
}

struct ImageUpload {
    file_name: String,
    content_type: String,
    bytes: Bytes,
}

#[derive(Default)]
struct CreateForm {
    title: String,
    content: String,
    categories: Vec<String>,
    image: Option<ImageUpload>,
}

async fn read_create_form(mut multipart: Multipart) -> AppResult<CreateForm> {
    let bad = |e: axum::extract::multipart::MultipartError| AppError::BadRequest(e.to_string());
    let mut form = CreateForm::default();

    while let Some(field) = multipart.next_field().await.map_err(bad)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => form.title = field.text().await.map_err(bad)?,
            "content" => form.content = field.text().await.map_err(bad)?,
            "categories" => {
                let category = field.text().await.map_err(bad)?;
                if !category.trim().is_empty() {
                    form.categories.push(category.trim().to_string());
                }
            }
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(bad)?;
                // Browsers send an empty part when no file was chosen.
                if !file_name.is_empty() || !bytes.is_empty() {
                    form.image = Some(ImageUpload {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

/// POST /post/create (multipart)
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let form = read_create_form(multipart).await?;

    let image_meta = form.image.as_ref().map(|image| ImageMeta {
        file_name: &image.file_name,
        content_type: &image.content_type,
        size: image.bytes.len(),
    });
    let errors = validation::validate_post(
        &form.title,
        &form.content,
        &form.categories,
        image_meta.as_ref(),
    );
    if !errors.is_empty() {
        return Ok(rejected(CreateTemplate {
            layout: Layout::new(Some(user)),
            categories: CATEGORIES,
            title: form.title,
            content: form.content,
            selected: form.categories,
            errors,
        }));
    }

    let image_path = match form.image {
        Some(image) => {
            let dir = state.config.uploads_path();
            let extension = validation::extension(&image.file_name).unwrap_or_default();
            let stored = tokio::task::spawn_blocking(move || {
                upload::store_image(&dir, &extension, &image.bytes)
            })
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;
            Some(stored)
        }
        None => None,
    };

    let id = uuid::Uuid::now_v7().to_string();
    let conn = state.db.get()?;
    posts::create(
        &conn,
        &NewPost {
            id: id.clone(),
            user_id: user.id.clone(),
            title: form.title.trim().to_string(),
            content: form.content.trim().to_string(),
            image_path,
            category: form.categories.join(CATEGORY_SEPARATOR),
        },
    )?;
    tracing::info!("Post {} created by {}", id, user.name);

    Ok(Redirect::to(&format!("/post?id={id}")).into_response())
}

#[derive(Deserialize)]
pub struct CommentForm {
    pub post_id: String,
    #[serde(default)]
    pub comment: String,
}

/// POST /post/comment
pub async fn comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let errors = validation::validate_comment(&form.comment);
    if !errors.is_empty() {
        let page = post_page(
            &state,
            Layout::new(Some(user)),
            &form.post_id,
            form.comment,
            errors,
        )?;
        return Ok(rejected(page));
    }

    let conn = state.db.get()?;
    posts::get(&conn, &form.post_id)?.ok_or(AppError::NotFound)?;
    comments::create(
        &conn,
        &NewComment {
            id: uuid::Uuid::now_v7().to_string(),
            post_id: form.post_id.clone(),
            user_id: user.id,
            content: form.comment.trim().to_string(),
        },
    )?;

    Ok(Redirect::to(&format!("/post?id={}", form.post_id)).into_response())
}

#[derive(Deserialize)]
pub struct ReactionForm {
    pub post_id: String,
    pub reaction_type: String,
}

fn parse_kind(raw: &str) -> AppResult<ReactionKind> {
    raw.parse().map_err(AppError::BadRequest)
}

/// POST /post/reaction
pub async fn react(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<ReactionForm>,
) -> AppResult<Response> {
    let kind = parse_kind(&form.reaction_type)?;

    let conn = state.db.get()?;
    posts::get(&conn, &form.post_id)?.ok_or(AppError::NotFound)?;
    reactions::add_post_reaction(&conn, &user.id, &form.post_id, kind)?;

    Ok(Redirect::to(&format!("/post?id={}", form.post_id)).into_response())
}

#[derive(Deserialize)]
pub struct CommentReactionForm {
    pub post_id: String,
    pub comment_id: String,
    pub reaction_type: String,
}

/// POST /post/comment/reaction
pub async fn react_to_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<CommentReactionForm>,
) -> AppResult<Response> {
    let kind = parse_kind(&form.reaction_type)?;

    let conn = state.db.get()?;
    let comment = comments::get(&conn, &form.comment_id)?
        .filter(|c| c.post_id == form.post_id)
        .ok_or(AppError::NotFound)?;
    reactions::add_comment_reaction(&conn, &user.id, &comment.post_id, &comment.id, kind)?;

    Ok(Redirect::to(&format!("/post?id={}", form.post_id)).into_response())
}
