use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::profile::{NewProfile, Profile, ProfileRole, ProfileUpdate};
use crate::routes::extract::{AppJson, AppQuery};
use crate::routes::{require_text, Created};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RoleQuery {
    pub role: ProfileRole,
}

/// POST /api/v1/profiles
pub async fn handle_create_profile(
    State(state): State<AppState>,
    AppJson(new): AppJson<NewProfile>,
) -> Result<(StatusCode, Json<Created>), AppError> {
    require_text("user_id", &new.user_id)?;
    if new.user_id.starts_with('_') {
        return Err(AppError::Validation(
            "user_id cannot start with an underscore".to_string(),
        ));
    }
    require_text("username", &new.username)?;

    let id = state.profiles.create_profile(new).await?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

/// GET /api/v1/profiles/:id
pub async fn handle_get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Profile>, AppError> {
    state
        .profiles
        .get_profile(&user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Profile {user_id} not found")))
}

/// PATCH /api/v1/profiles/:id
pub async fn handle_update_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    AppJson(update): AppJson<ProfileUpdate>,
) -> Result<StatusCode, AppError> {
    if let Some(username) = &update.username {
        require_text("username", username)?;
    }
    if !state.profiles.update_profile(&user_id, &update).await? {
        return Err(AppError::NotFound(format!("Profile {user_id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/profiles/:id
pub async fn handle_delete_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    if !state.profiles.delete_profile(&user_id).await? {
        return Err(AppError::NotFound(format!("Profile {user_id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/profiles?role=
pub async fn handle_list_profiles(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<RoleQuery>,
) -> Result<Json<Vec<Profile>>, AppError> {
    Ok(Json(state.profiles.get_profiles_by_role(params.role).await?))
}
