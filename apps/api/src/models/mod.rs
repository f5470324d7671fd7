pub mod post;
pub mod profile;
pub mod training;

use serde::{Deserialize, Serialize};

/// Fixed-width RFC 3339 timestamps (microsecond precision, `Z` suffix), so
/// string order in the store matches time order for `created_at` sorts.
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn format(at: &DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn to_value(at: &DateTime<Utc>) -> Value {
        Value::String(format(at))
    }

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Discriminant stored in every document's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Profile,
    Post,
    Training,
    Module,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Profile => "profile",
            RecordKind::Post => "post",
            RecordKind::Training => "training",
            RecordKind::Module => "module",
        }
    }
}
