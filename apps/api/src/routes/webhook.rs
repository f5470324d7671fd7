//! Action-server endpoints consumed by the dialogue engine.

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::actions::tracker::Tracker;
use crate::actions::ActionOutcome;
use crate::errors::AppError;
use crate::routes::extract::AppJson;
use crate::state::AppState;

/// One action invocation as posted by the engine. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
pub struct ActionCall {
    pub next_action: String,
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub tracker: Tracker,
    #[serde(default)]
    pub domain: Value,
}

/// POST /webhook
pub async fn handle_webhook(
    State(state): State<AppState>,
    AppJson(call): AppJson<ActionCall>,
) -> Result<Json<ActionOutcome>, AppError> {
    let ActionCall {
        next_action,
        sender_id,
        mut tracker,
        domain,
    } = call;
    if tracker.sender_id.is_none() {
        tracker.sender_id = sender_id;
    }

    let outcome = state
        .actions
        .execute(&next_action, &tracker, &domain)
        .ok_or(AppError::ActionNotFound(next_action))?;

    Ok(Json(outcome))
}

/// GET /actions
pub async fn handle_list_actions(State(state): State<AppState>) -> Json<Value> {
    let names: Vec<Value> = state
        .actions
        .names()
        .into_iter()
        .map(|name| json!({ "name": name }))
        .collect();
    Json(Value::Array(names))
}
