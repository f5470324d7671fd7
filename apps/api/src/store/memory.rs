//! In-memory `DocumentStore` used by service and router tests.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::store::{DocumentStore, FindQuery, SortDirection, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn with_collections(names: &[&str]) -> Self {
        let store = Self::default();
        {
            let mut collections = store.collections.lock().unwrap();
            for name in names {
                collections.insert(name.to_string(), BTreeMap::new());
            }
        }
        store
    }

    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }
}

fn missing_collection(name: &str) -> StoreError {
    StoreError::Api {
        status: 404,
        reason: format!("Database {name} does not exist."),
    }
}

fn next_rev(document: &Value) -> String {
    let generation = document
        .get("_rev")
        .and_then(Value::as_str)
        .and_then(|rev| rev.split('-').next())
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(0);
    format!("{}-mem", generation + 1)
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn ensure_collections(&self, names: &[&str]) -> Result<(), StoreError> {
        let mut collections = self.collections.lock().unwrap();
        for name in names {
            collections.entry(name.to_string()).or_default();
        }
        Ok(())
    }

    async fn create(&self, collection: &str, mut document: Value) -> Result<String, StoreError> {
        let mut collections = self.collections.lock().unwrap();
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| missing_collection(collection))?;

        let id = document
            .get("_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        if docs.contains_key(&id) {
            return Err(StoreError::Conflict { id });
        }

        if let Value::Object(map) = &mut document {
            map.insert("_id".to_string(), Value::String(id.clone()));
            map.insert("_rev".to_string(), Value::String("1-mem".to_string()));
        }
        docs.insert(id.clone(), document);
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let collections = self.collections.lock().unwrap();
        let docs = collections
            .get(collection)
            .ok_or_else(|| missing_collection(collection))?;
        Ok(docs.get(id).cloned())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<bool, StoreError> {
        let mut collections = self.collections.lock().unwrap();
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| missing_collection(collection))?;

        let Some(document) = docs.get_mut(id) else {
            return Ok(false);
        };
        let rev = next_rev(document);
        if let Value::Object(map) = document {
            for (key, value) in fields {
                map.insert(key, value);
            }
            map.insert("_rev".to_string(), Value::String(rev));
        }
        Ok(true)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut collections = self.collections.lock().unwrap();
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| missing_collection(collection))?;
        Ok(docs.remove(id).is_some())
    }

    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.lock().unwrap();
        let docs = collections
            .get(collection)
            .ok_or_else(|| missing_collection(collection))?;

        let mut found: Vec<Value> = docs
            .values()
            .filter(|doc| {
                query
                    .selector
                    .iter()
                    .all(|(field, expected)| doc.get(field) == Some(expected))
            })
            .cloned()
            .collect();

        if let Some((field, direction)) = &query.sort {
            found.sort_by(|a, b| {
                let ordering = compare_values(a.get(field), b.get(field));
                match direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            found.truncate(limit);
        }
        Ok(found)
    }
}
