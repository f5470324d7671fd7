use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::post::{NewPost, Post, PostUpdate};
use crate::routes::extract::{AppJson, AppQuery};
use crate::routes::{require_text, Created};
use crate::services::posts::DEFAULT_RECENT_LIMIT;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PostListQuery {
    pub user_id: Option<String>,
    pub limit: Option<usize>,
}

/// POST /api/v1/posts
pub async fn handle_create_post(
    State(state): State<AppState>,
    AppJson(new): AppJson<NewPost>,
) -> Result<(StatusCode, Json<Created>), AppError> {
    require_text("user_id", &new.user_id)?;
    require_text("content", &new.content)?;

    let id = state.posts.create_post(new).await?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

/// GET /api/v1/posts/:id
pub async fn handle_get_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Json<Post>, AppError> {
    state
        .posts
        .get_post(&post_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Post {post_id} not found")))
}

/// PATCH /api/v1/posts/:id
pub async fn handle_update_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    AppJson(update): AppJson<PostUpdate>,
) -> Result<StatusCode, AppError> {
    if let Some(content) = &update.content {
        require_text("content", content)?;
    }
    if !state.posts.update_post(&post_id, &update).await? {
        return Err(AppError::NotFound(format!("Post {post_id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/posts/:id
pub async fn handle_delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<StatusCode, AppError> {
    if !state.posts.delete_post(&post_id).await? {
        return Err(AppError::NotFound(format!("Post {post_id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/posts?user_id= | ?limit=
///
/// With `user_id`: that author's posts, newest first. Otherwise the most recent posts.
pub async fn handle_list_posts(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<PostListQuery>,
) -> Result<Json<Vec<Post>>, AppError> {
    let posts = match params.user_id {
        Some(user_id) => state.posts.get_user_posts(&user_id).await?,
        None => {
            state
                .posts
                .get_recent_posts(params.limit.unwrap_or(DEFAULT_RECENT_LIMIT))
                .await?
        }
    };
    Ok(Json(posts))
}
