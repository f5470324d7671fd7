// Conversation actions: stateless handlers dispatched by name from the dialogue engine.
// Each one reads the tracker snapshot, may publish messages, and returns slot events.

pub mod evaluation;
pub mod interview;
pub mod tracker;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::actions::evaluation::ResponseEvaluator;
use crate::actions::interview::{
    AskFollowUp, EvaluateResponse, SetInterviewSettings, StoreCandidateResponse, StoreQuestion,
};
use crate::actions::tracker::{BotMessage, Dispatcher, Event, Tracker};

pub trait Action: Send + Sync {
    /// Name the dialogue engine dispatches on.
    fn name(&self) -> &'static str;

    fn run(&self, dispatcher: &mut Dispatcher, tracker: &Tracker, domain: &Value) -> Vec<Event>;
}

/// Result of one action run, in the shape the engine expects back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    pub events: Vec<Event>,
    pub responses: Vec<BotMessage>,
}

/// Actions in registration order. Lookup is by exact name.
#[derive(Default)]
pub struct ActionRegistry {
    actions: Vec<Box<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The five interview actions, with `evaluator` scoring answers.
    pub fn interview(evaluator: Arc<dyn ResponseEvaluator>) -> Self {
        Self::new()
            .register(SetInterviewSettings)
            .register(EvaluateResponse::new(evaluator))
            .register(AskFollowUp)
            .register(StoreCandidateResponse)
            .register(StoreQuestion)
    }

    /// Adds an action. A later action with the same name replaces the earlier one.
    pub fn register(mut self, action: impl Action + 'static) -> Self {
        self.actions.retain(|existing| existing.name() != action.name());
        self.actions.push(Box::new(action));
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn Action> {
        self.actions
            .iter()
            .find(|action| action.name() == name)
            .map(|action| action.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.actions.iter().map(|action| action.name()).collect()
    }

    /// Runs the named action. `None` when no action is registered under `name`.
    pub fn execute(&self, name: &str, tracker: &Tracker, domain: &Value) -> Option<ActionOutcome> {
        let action = self.get(name)?;
        debug!(
            "Running {name} for sender {}",
            tracker.sender_id.as_deref().unwrap_or("unknown")
        );

        let mut dispatcher = Dispatcher::default();
        let events = action.run(&mut dispatcher, tracker, domain);
        Some(ActionOutcome {
            events,
            responses: dispatcher.into_messages(),
        })
    }
}
