use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{timestamp, RecordKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileRole {
    #[default]
    Trainee,
    Trainer,
    Admin,
}

impl ProfileRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileRole::Trainee => "trainee",
            ProfileRole::Trainer => "trainer",
            ProfileRole::Admin => "admin",
        }
    }
}

/// A user profile. Keyed by the externally supplied user id, not a generated one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub username: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    #[serde(default)]
    pub role: ProfileRole,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: RecordKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProfile {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub role: ProfileRole,
}

impl Profile {
    pub fn from_new(new: NewProfile, now: DateTime<Utc>) -> Self {
        Self {
            id: new.user_id,
            rev: None,
            username: new.username,
            full_name: new.full_name,
            avatar_url: new.avatar_url,
            bio: new.bio,
            role: new.role,
            created_at: now,
            updated_at: now,
            kind: RecordKind::Profile,
        }
    }
}

/// Partial update. Only `Some` fields reach the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<ProfileRole>,
}
