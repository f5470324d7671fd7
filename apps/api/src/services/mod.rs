//! Domain record services. Each one binds a collection name, stamps and tags
//! new records, and turns typed queries into a single `find` round trip.

pub mod posts;
pub mod profiles;
pub mod trainings;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::store::StoreError;

pub use posts::PostService;
pub use profiles::ProfileService;
pub use trainings::TrainingService;

fn encode<T: Serialize>(record: &T) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(record)?)
}

fn decode<T: DeserializeOwned>(document: Value) -> Result<T, StoreError> {
    Ok(serde_json::from_value(document)?)
}

fn decode_all<T: DeserializeOwned>(documents: Vec<Value>) -> Result<Vec<T>, StoreError> {
    documents.into_iter().map(decode).collect()
}

/// Flattens a typed partial update into the field map the store merges.
fn update_fields<T: Serialize>(update: &T) -> Result<Map<String, Value>, StoreError> {
    match serde_json::to_value(update)? {
        Value::Object(fields) => Ok(fields),
        _ => Ok(Map::new()),
    }
}
