//! The mock-interview actions invoked by the dialogue engine.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::actions::evaluation::ResponseEvaluator;
use crate::actions::tracker::{Dispatcher, Event, Tracker};
use crate::actions::Action;

pub const SLOT_INTERVIEWER_STYLE: &str = "interviewer_style";
pub const SLOT_INTERVIEW_TYPE: &str = "interview_type";
pub const SLOT_QUESTION: &str = "question";
pub const SLOT_CANDIDATE_RESPONSE: &str = "candidate_response";

pub const CLOSURE_FOLLOW_UP: &str =
    "Can you provide a practical example of using closures in a real project?";
pub const REACT_FOLLOW_UP: &str = "How would you optimize the performance of a React component?";
pub const GENERIC_FOLLOW_UP: &str =
    "Can you elaborate on your previous answer with more specific examples?";

/// Reads `{"interviewerStyle", "interviewType"}` from the message text into slots.
pub struct SetInterviewSettings;

impl Action for SetInterviewSettings {
    fn name(&self) -> &'static str {
        "action_set_interview_settings"
    }

    fn run(&self, _dispatcher: &mut Dispatcher, tracker: &Tracker, _domain: &Value) -> Vec<Event> {
        let raw = tracker.latest_text().unwrap_or("{}");
        let settings = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(settings)) => settings,
            Ok(_) => {
                warn!("Interview settings payload is not an object; using defaults");
                Default::default()
            }
            Err(e) => {
                warn!("Interview settings are not valid JSON ({e}); using defaults");
                Default::default()
            }
        };

        let field = |key: &str| settings.get(key).cloned().unwrap_or(Value::Null);
        vec![
            Event::slot(SLOT_INTERVIEWER_STYLE, field("interviewerStyle")),
            Event::slot(SLOT_INTERVIEW_TYPE, field("interviewType")),
        ]
    }
}

#[derive(Serialize)]
struct EvaluationMessage<'a> {
    text: &'a str,
    confidence: f64,
    evaluation: &'a str,
    suggestions: &'a [String],
}

/// Scores the latest answer and publishes the feedback. Sets no slots.
pub struct EvaluateResponse {
    evaluator: Arc<dyn ResponseEvaluator>,
}

impl EvaluateResponse {
    pub fn new(evaluator: Arc<dyn ResponseEvaluator>) -> Self {
        Self { evaluator }
    }
}

impl Action for EvaluateResponse {
    fn name(&self) -> &'static str {
        "action_evaluate_response"
    }

    fn run(&self, dispatcher: &mut Dispatcher, tracker: &Tracker, _domain: &Value) -> Vec<Event> {
        let response = tracker.latest_text().unwrap_or_default();
        let interview_type = tracker.slot_text(SLOT_INTERVIEW_TYPE);

        let evaluation = self.evaluator.evaluate(response, interview_type);
        debug!(
            "Evaluated response: confidence={:.2} type={}",
            evaluation.confidence,
            interview_type.unwrap_or("unset")
        );

        let message = EvaluationMessage {
            text: &evaluation.feedback,
            confidence: evaluation.confidence,
            evaluation: &evaluation.feedback,
            suggestions: &evaluation.suggestions,
        };
        dispatcher.utter_message(serde_json::to_string(&message).unwrap_or_default());

        vec![]
    }
}

#[derive(Serialize)]
struct FollowUpMessage<'a> {
    text: &'a str,
    #[serde(rename = "followUpQuestion")]
    follow_up_question: &'a str,
}

/// Picks a canned follow-up from the current question and makes it the new question.
pub struct AskFollowUp;

impl Action for AskFollowUp {
    fn name(&self) -> &'static str {
        "action_ask_follow_up"
    }

    fn run(&self, dispatcher: &mut Dispatcher, tracker: &Tracker, _domain: &Value) -> Vec<Event> {
        let current_question = tracker.slot_text(SLOT_QUESTION).unwrap_or_default();
        // Read for parity with the engine's slot set; the follow-up ignores it.
        let interview_type = tracker.slot_text(SLOT_INTERVIEW_TYPE);

        let follow_up = follow_up_for(current_question);
        debug!(
            "Follow-up chosen for type={}: {follow_up}",
            interview_type.unwrap_or("unset")
        );

        let message = FollowUpMessage {
            text: follow_up,
            follow_up_question: follow_up,
        };
        dispatcher.utter_message(serde_json::to_string(&message).unwrap_or_default());

        vec![Event::slot(SLOT_QUESTION, follow_up)]
    }
}

/// `closure` is checked before `react`; both match case-insensitively anywhere in the question.
pub fn follow_up_for(question: &str) -> &'static str {
    let question = question.to_lowercase();
    if question.contains("closure") {
        CLOSURE_FOLLOW_UP
    } else if question.contains("react") {
        REACT_FOLLOW_UP
    } else {
        GENERIC_FOLLOW_UP
    }
}

pub struct StoreCandidateResponse;

impl Action for StoreCandidateResponse {
    fn name(&self) -> &'static str {
        "action_store_candidate_response"
    }

    fn run(&self, _dispatcher: &mut Dispatcher, tracker: &Tracker, _domain: &Value) -> Vec<Event> {
        let response = tracker.latest_text().unwrap_or_default();
        vec![Event::slot(SLOT_CANDIDATE_RESPONSE, response)]
    }
}

pub struct StoreQuestion;

impl Action for StoreQuestion {
    fn name(&self) -> &'static str {
        "action_store_question"
    }

    fn run(&self, _dispatcher: &mut Dispatcher, tracker: &Tracker, _domain: &Value) -> Vec<Event> {
        let question = tracker.latest_text().unwrap_or_default();
        vec![Event::slot(SLOT_QUESTION, question)]
    }
}
