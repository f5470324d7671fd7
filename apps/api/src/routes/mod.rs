pub mod extract;
pub mod health;
pub mod posts;
pub mod profiles;
pub mod trainings;
pub mod webhook;

use axum::{
    routing::{get, post},
    Router,
};
use serde::Serialize;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Created {
    pub id: String,
}

fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Action server (dialogue engine)
        .route("/webhook", post(webhook::handle_webhook))
        .route("/actions", get(webhook::handle_list_actions))
        // Profiles
        .route(
            "/api/v1/profiles",
            get(profiles::handle_list_profiles).post(profiles::handle_create_profile),
        )
        .route(
            "/api/v1/profiles/:id",
            get(profiles::handle_get_profile)
                .patch(profiles::handle_update_profile)
                .delete(profiles::handle_delete_profile),
        )
        // Posts
        .route(
            "/api/v1/posts",
            get(posts::handle_list_posts).post(posts::handle_create_post),
        )
        .route(
            "/api/v1/posts/:id",
            get(posts::handle_get_post)
                .patch(posts::handle_update_post)
                .delete(posts::handle_delete_post),
        )
        // Trainings and modules
        .route(
            "/api/v1/trainings",
            get(trainings::handle_list_trainings).post(trainings::handle_create_training),
        )
        .route(
            "/api/v1/trainings/:id",
            get(trainings::handle_get_training)
                .patch(trainings::handle_update_training)
                .delete(trainings::handle_delete_training),
        )
        .route(
            "/api/v1/trainings/:id/modules",
            get(trainings::handle_list_modules).post(trainings::handle_create_module),
        )
        .route(
            "/api/v1/modules/:id",
            get(trainings::handle_get_module)
                .patch(trainings::handle_update_module)
                .delete(trainings::handle_delete_module),
        )
        .with_state(state)
}
