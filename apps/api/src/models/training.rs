use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{timestamp, RecordKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl TrainingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingStatus::Draft => "draft",
            TrainingStatus::Published => "published",
            TrainingStatus::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Training {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub title: String,
    pub description: String,
    pub category_id: Option<String>,
    pub duration: Option<String>,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    pub target_audience: Option<String>,
    pub max_participants: Option<u32>,
    #[serde(default)]
    pub status: TrainingStatus,
    pub created_by: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: RecordKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTraining {
    pub title: String,
    pub description: String,
    pub created_by: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub max_participants: Option<u32>,
    #[serde(default)]
    pub status: TrainingStatus,
}

impl Training {
    pub fn from_new(new: NewTraining, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            rev: None,
            title: new.title,
            description: new.description,
            category_id: new.category_id,
            duration: new.duration,
            learning_objectives: new.learning_objectives,
            prerequisites: new.prerequisites,
            target_audience: new.target_audience,
            max_participants: new.max_participants,
            status: new.status,
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
            kind: RecordKind::Training,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_objectives: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prerequisites: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_participants: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TrainingStatus>,
}

/// One unit of a training. `order_index` drives display order; `training_id` is not checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingModule {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub training_id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub order_index: i32,
    pub duration: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: RecordKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewModule {
    pub title: String,
    pub content: Value,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub order_index: i32,
    #[serde(default)]
    pub duration: Option<String>,
}

impl TrainingModule {
    pub fn from_new(training_id: &str, new: NewModule, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            rev: None,
            training_id: training_id.to_string(),
            title: new.title,
            description: new.description,
            content: new.content,
            order_index: new.order_index,
            duration: new.duration,
            created_at: now,
            updated_at: now,
            kind: RecordKind::Module,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_index: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}
