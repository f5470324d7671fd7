//! Document store gateway.
//!
//! Everything that touches persistence goes through `DocumentStore`. Services
//! hold an `Arc<dyn DocumentStore>`; production wires in `CouchClient`, tests
//! wire in the in-memory store.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub mod couch;
#[cfg(test)]
pub mod memory;

pub use couch::CouchClient;

pub const PROFILES: &str = "profiles";
pub const POSTS: &str = "posts";
pub const COMMENTS: &str = "comments";
pub const LIKES: &str = "likes";
pub const TRAININGS: &str = "trainings";
pub const TRAINING_MODULES: &str = "training_modules";

/// Collections provisioned at startup. `comments` and `likes` are reserved;
/// no service reads or writes them yet.
pub const REQUIRED_COLLECTIONS: [&str; 6] =
    [PROFILES, POSTS, COMMENTS, LIKES, TRAININGS, TRAINING_MODULES];

/// A JSON index backing one sorted query. The last field is the sort key;
/// the leading fields are the equality filters the query pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub collection: &'static str,
    pub name: &'static str,
    pub fields: &'static [&'static str],
}

pub const POSTS_BY_CREATED: IndexSpec = IndexSpec {
    collection: POSTS,
    name: "posts-by-created",
    fields: &["type", "created_at"],
};

pub const POSTS_BY_USER: IndexSpec = IndexSpec {
    collection: POSTS,
    name: "posts-by-user",
    fields: &["type", "user_id", "created_at"],
};

pub const TRAININGS_BY_STATUS: IndexSpec = IndexSpec {
    collection: TRAININGS,
    name: "trainings-by-status",
    fields: &["type", "status", "created_at"],
};

pub const TRAININGS_BY_CREATOR: IndexSpec = IndexSpec {
    collection: TRAININGS,
    name: "trainings-by-creator",
    fields: &["type", "created_by", "created_at"],
};

pub const MODULES_BY_TRAINING: IndexSpec = IndexSpec {
    collection: TRAINING_MODULES,
    name: "modules-by-training",
    fields: &["type", "training_id", "order_index"],
};

/// Indexes provisioned at startup, one per sorted service query.
pub const REQUIRED_INDEXES: [IndexSpec; 5] = [
    POSTS_BY_CREATED,
    POSTS_BY_USER,
    TRAININGS_BY_STATUS,
    TRAININGS_BY_CREATOR,
    MODULES_BY_TRAINING,
];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store API error (status {status}): {reason}")]
    Api { status: u16, reason: String },

    #[error("Revision conflict on document {id}")]
    Conflict { id: String },

    #[error("Document decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Declarative selector: equality filters, optional single-field sort, optional limit.
///
/// A sorted query names the index that serves it; CouchDB refuses to sort
/// on fields no index covers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    pub selector: Map<String, Value>,
    pub sort: Option<(String, SortDirection)>,
    pub index: Option<IndexSpec>,
    pub limit: Option<usize>,
}

impl FindQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.selector.insert(field.to_string(), value.into());
        self
    }

    pub fn sort(mut self, field: &str, direction: SortDirection) -> Self {
        self.sort = Some((field.to_string(), direction));
        self
    }

    pub fn using(mut self, index: IndexSpec) -> Self {
        self.index = Some(index);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Renders the query as a Mango `_find` request body.
    pub fn to_mango(&self) -> Value {
        let mut body = Map::new();
        body.insert("selector".to_string(), Value::Object(self.selector.clone()));
        if let Some((field, direction)) = &self.sort {
            // Sorting through an index lists every index column in one direction.
            let fields: Vec<&str> = match &self.index {
                Some(index) => index.fields.to_vec(),
                None => vec![field.as_str()],
            };
            let order: Vec<Value> = fields
                .into_iter()
                .map(|f| {
                    let mut entry = Map::new();
                    entry.insert(f.to_string(), serde_json::json!(direction));
                    Value::Object(entry)
                })
                .collect();
            body.insert("sort".to_string(), Value::Array(order));
        }
        if let Some(index) = &self.index {
            body.insert(
                "use_index".to_string(),
                serde_json::json!([index.name, index.name]),
            );
        }
        if let Some(limit) = self.limit {
            body.insert("limit".to_string(), Value::from(limit));
        }
        Value::Object(body)
    }
}

/// The persistence seam. Not-found is reported through `Option`/`bool`, never as an error.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates any missing collection. Safe to call repeatedly.
    async fn ensure_collections(&self, names: &[&str]) -> Result<(), StoreError>;

    /// Stores a new document and returns its identifier.
    async fn create(&self, collection: &str, document: Value) -> Result<String, StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Merges `fields` into the stored document. `Ok(false)` when it does not exist.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<bool, StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Value>, StoreError>;
}
