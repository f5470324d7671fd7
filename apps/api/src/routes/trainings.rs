use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::training::{
    ModuleUpdate, NewModule, NewTraining, Training, TrainingModule, TrainingStatus, TrainingUpdate,
};
use crate::routes::extract::{AppJson, AppQuery};
use crate::routes::{require_text, Created};
use crate::services::trainings::DEFAULT_STATUS_LIMIT;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct TrainingListQuery {
    pub status: Option<TrainingStatus>,
    pub created_by: Option<String>,
    pub limit: Option<usize>,
}

// ────────────────────────────────────────────────────────────────────────────
// Trainings
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/trainings
pub async fn handle_create_training(
    State(state): State<AppState>,
    AppJson(new): AppJson<NewTraining>,
) -> Result<(StatusCode, Json<Created>), AppError> {
    require_text("title", &new.title)?;
    require_text("created_by", &new.created_by)?;

    let id = state.trainings.create_training(new).await?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

/// GET /api/v1/trainings/:id
pub async fn handle_get_training(
    State(state): State<AppState>,
    Path(training_id): Path<String>,
) -> Result<Json<Training>, AppError> {
    state
        .trainings
        .get_training(&training_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Training {training_id} not found")))
}

/// PATCH /api/v1/trainings/:id
pub async fn handle_update_training(
    State(state): State<AppState>,
    Path(training_id): Path<String>,
    AppJson(update): AppJson<TrainingUpdate>,
) -> Result<StatusCode, AppError> {
    if let Some(title) = &update.title {
        require_text("title", title)?;
    }
    if !state
        .trainings
        .update_training(&training_id, &update)
        .await?
    {
        return Err(AppError::NotFound(format!("Training {training_id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/trainings/:id
pub async fn handle_delete_training(
    State(state): State<AppState>,
    Path(training_id): Path<String>,
) -> Result<StatusCode, AppError> {
    if !state.trainings.delete_training(&training_id).await? {
        return Err(AppError::NotFound(format!("Training {training_id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/trainings?created_by= | ?status=&limit=
pub async fn handle_list_trainings(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<TrainingListQuery>,
) -> Result<Json<Vec<Training>>, AppError> {
    let trainings = match (params.created_by, params.status) {
        (Some(creator_id), _) => state.trainings.get_trainings_by_creator(&creator_id).await?,
        (None, Some(status)) => {
            state
                .trainings
                .get_trainings_by_status(status, params.limit.unwrap_or(DEFAULT_STATUS_LIMIT))
                .await?
        }
        (None, None) => {
            return Err(AppError::Validation(
                "either status or created_by is required".to_string(),
            ))
        }
    };
    Ok(Json(trainings))
}

// ────────────────────────────────────────────────────────────────────────────
// Modules
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/trainings/:id/modules
pub async fn handle_create_module(
    State(state): State<AppState>,
    Path(training_id): Path<String>,
    AppJson(new): AppJson<NewModule>,
) -> Result<(StatusCode, Json<Created>), AppError> {
    require_text("title", &new.title)?;

    let id = state.trainings.create_module(&training_id, new).await?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

/// GET /api/v1/trainings/:id/modules
pub async fn handle_list_modules(
    State(state): State<AppState>,
    Path(training_id): Path<String>,
) -> Result<Json<Vec<TrainingModule>>, AppError> {
    Ok(Json(
        state.trainings.get_modules_by_training(&training_id).await?,
    ))
}

/// GET /api/v1/modules/:id
pub async fn handle_get_module(
    State(state): State<AppState>,
    Path(module_id): Path<String>,
) -> Result<Json<TrainingModule>, AppError> {
    state
        .trainings
        .get_module(&module_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Module {module_id} not found")))
}

/// PATCH /api/v1/modules/:id
pub async fn handle_update_module(
    State(state): State<AppState>,
    Path(module_id): Path<String>,
    AppJson(update): AppJson<ModuleUpdate>,
) -> Result<StatusCode, AppError> {
    if let Some(title) = &update.title {
        require_text("title", title)?;
    }
    if !state.trainings.update_module(&module_id, &update).await? {
        return Err(AppError::NotFound(format!("Module {module_id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/modules/:id
pub async fn handle_delete_module(
    State(state): State<AppState>,
    Path(module_id): Path<String>,
) -> Result<StatusCode, AppError> {
    if !state.trainings.delete_module(&module_id).await? {
        return Err(AppError::NotFound(format!("Module {module_id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
