use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{timestamp, RecordKind};

/// A community post. Counters start at zero; nothing here increments them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub user_id: String,
    pub content: String,
    pub image_url: Option<String>,
    pub likes_count: u32,
    pub comments_count: u32,
    pub shares_count: u32,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: RecordKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPost {
    pub user_id: String,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl Post {
    pub fn from_new(new: NewPost, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            rev: None,
            user_id: new.user_id,
            content: new.content,
            image_url: new.image_url,
            likes_count: 0,
            comments_count: 0,
            shares_count: 0,
            created_at: now,
            kind: RecordKind::Post,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likes_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares_count: Option<u32>,
}
