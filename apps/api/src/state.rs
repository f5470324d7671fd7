use std::sync::Arc;

use crate::actions::evaluation::ResponseEvaluator;
use crate::actions::ActionRegistry;
use crate::services::{PostService, ProfileService, TrainingService};
use crate::store::DocumentStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Interview actions dispatched by the webhook.
    pub actions: Arc<ActionRegistry>,
    pub profiles: ProfileService,
    pub posts: PostService,
    pub trainings: TrainingService,
}

impl AppState {
    /// Every service shares the one store handle built in `main`.
    pub fn new(store: Arc<dyn DocumentStore>, evaluator: Arc<dyn ResponseEvaluator>) -> Self {
        Self {
            actions: Arc::new(ActionRegistry::interview(evaluator)),
            profiles: ProfileService::new(store.clone()),
            posts: PostService::new(store.clone()),
            trainings: TrainingService::new(store),
        }
    }
}
