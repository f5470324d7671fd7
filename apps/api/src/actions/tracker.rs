//! Conversation snapshot handed to actions, and what actions hand back.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LatestMessage {
    #[serde(default)]
    pub text: Option<String>,
}

/// Read-only view of one conversation as supplied by the dialogue engine.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Tracker {
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub slots: HashMap<String, Value>,
    #[serde(default)]
    pub latest_message: LatestMessage,
}

impl Tracker {
    /// Slot value, treating an explicit `null` as unset.
    pub fn get_slot(&self, name: &str) -> Option<&Value> {
        self.slots.get(name).filter(|v| !v.is_null())
    }

    /// Slot value as text. Non-string values read as unset.
    pub fn slot_text(&self, name: &str) -> Option<&str> {
        self.get_slot(name).and_then(Value::as_str)
    }

    pub fn latest_text(&self) -> Option<&str> {
        self.latest_message.text.as_deref()
    }
}

/// A state mutation the dialogue engine applies after the action returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum Event {
    #[serde(rename = "slot")]
    SlotSet {
        name: String,
        value: Value,
        timestamp: Option<f64>,
    },
}

impl Event {
    pub fn slot(name: &str, value: impl Into<Value>) -> Self {
        Event::SlotSet {
            name: name.to_string(),
            value: value.into(),
            timestamp: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BotMessage {
    pub text: String,
}

/// Collects messages published during one action run.
#[derive(Debug, Default)]
pub struct Dispatcher {
    messages: Vec<BotMessage>,
}

impl Dispatcher {
    pub fn utter_message(&mut self, text: impl Into<String>) {
        self.messages.push(BotMessage { text: text.into() });
    }

    pub fn into_messages(self) -> Vec<BotMessage> {
        self.messages
    }
}
