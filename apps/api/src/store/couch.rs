//! CouchDB client: the single place that speaks the CouchDB HTTP API.
//!
//! Constructed once in `main` via `connect` and shared behind `Arc<dyn DocumentStore>`.
//! No retries: a failed round trip surfaces as `StoreError` to the caller.

use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::config::Config;
use crate::store::{DocumentStore, FindQuery, IndexSpec, StoreError};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Page size for `_find` calls without an explicit limit. CouchDB otherwise
/// caps a response at 25 documents.
const FIND_PAGE_SIZE: usize = 200;

#[derive(Debug, Deserialize)]
struct CouchErrorBody {
    reason: String,
}

#[derive(Debug, Deserialize)]
struct CreatedDoc {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FindResponse {
    docs: Vec<Value>,
    #[serde(default)]
    bookmark: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndexCreated {
    result: String,
}

#[derive(Debug, Deserialize)]
struct Welcome {
    #[serde(default)]
    version: Option<String>,
}

#[derive(Clone)]
pub struct CouchClient {
    client: Client,
    base: Url,
    user: String,
    password: String,
}

impl CouchClient {
    /// Builds the client without touching the network.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let base = Url::parse(&config.couchdb_url)
            .with_context(|| format!("Invalid COUCHDB_URL '{}'", config.couchdb_url))?;
        if base.cannot_be_a_base() {
            bail!("COUCHDB_URL '{}' cannot be used as a base URL", config.couchdb_url);
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base,
            user: config.couchdb_user.clone(),
            password: config.couchdb_password.clone(),
        })
    }

    /// Builds the client, checks the server answers, and provisions `collections`
    /// and the `indexes` their sorted queries run through.
    pub async fn connect(
        config: &Config,
        collections: &[&str],
        indexes: &[IndexSpec],
    ) -> anyhow::Result<Self> {
        let couch = Self::new(config)?;
        info!("Connecting to CouchDB at {}...", couch.base);

        let version = couch.ping().await.context("CouchDB is unreachable")?;
        info!(
            "CouchDB reachable (version {})",
            version.as_deref().unwrap_or("unknown")
        );

        couch
            .ensure_collections(collections)
            .await
            .context("Failed to provision CouchDB databases")?;
        couch
            .ensure_indexes(indexes)
            .await
            .context("Failed to provision CouchDB indexes")?;

        Ok(couch)
    }

    /// Creates each JSON index. CouchDB answers `exists` for an index that is
    /// already defined, so this is safe on every start.
    pub async fn ensure_indexes(&self, indexes: &[IndexSpec]) -> Result<(), StoreError> {
        for index in indexes {
            let body = json!({
                "index": {"fields": index.fields},
                "ddoc": index.name,
                "name": index.name,
                "type": "json"
            });
            let response = self
                .request(Method::POST, self.url(&[index.collection, "_index"]))
                .json(&body)
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(api_error(response).await);
            }

            let created: IndexCreated = response.json().await?;
            if created.result == "created" {
                info!("Created index '{}' on '{}'", index.name, index.collection);
            } else {
                debug!("Index '{}' on '{}' {}", index.name, index.collection, created.result);
            }
        }
        Ok(())
    }

    async fn ping(&self) -> Result<Option<String>, StoreError> {
        let response = self.request(Method::GET, self.url(&[])).send().await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        let welcome: Welcome = response.json().await?;
        Ok(welcome.version)
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // `new` rejects cannot-be-a-base URLs, so this always succeeds.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.user, Some(&self.password))
    }
}

/// Converts a non-success response into `StoreError::Api`, preferring CouchDB's `reason`.
async fn api_error(response: Response) -> StoreError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let reason = serde_json::from_str::<CouchErrorBody>(&body)
        .map(|e| e.reason)
        .unwrap_or(body);
    StoreError::Api { status, reason }
}

#[async_trait]
impl DocumentStore for CouchClient {
    async fn ensure_collections(&self, names: &[&str]) -> Result<(), StoreError> {
        for &name in names {
            let url = self.url(&[name]);
            let exists = self.request(Method::HEAD, url.clone()).send().await?;
            match exists.status() {
                s if s.is_success() => continue,
                StatusCode::NOT_FOUND => {}
                _ => return Err(api_error(exists).await),
            }

            let created = self.request(Method::PUT, url).send().await?;
            match created.status() {
                // 412: created concurrently by someone else
                s if s.is_success() || s == StatusCode::PRECONDITION_FAILED => {
                    info!("Provisioned CouchDB database '{name}'");
                }
                _ => return Err(api_error(created).await),
            }
        }
        Ok(())
    }

    async fn create(&self, collection: &str, document: Value) -> Result<String, StoreError> {
        let response = self
            .request(Method::POST, self.url(&[collection]))
            .json(&document)
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            let id = document
                .get("_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Err(StoreError::Conflict { id });
        }
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let created: CreatedDoc = response.json().await?;
        debug!("Created document {} in {collection}", created.id);
        Ok(created.id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        // Leading underscores address CouchDB endpoints, never records.
        if id.starts_with('_') {
            return Ok(None);
        }

        let response = self
            .request(Method::GET, self.url(&[collection, id]))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(Some(response.json().await?))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<bool, StoreError> {
        let Some(mut document) = self.get(collection, id).await? else {
            return Ok(false);
        };

        if let Value::Object(existing) = &mut document {
            for (key, value) in fields {
                existing.insert(key, value);
            }
        }

        let response = self
            .request(Method::PUT, self.url(&[collection, id]))
            .json(&document)
            .send()
            .await?;

        match response.status() {
            StatusCode::CONFLICT => Err(StoreError::Conflict { id: id.to_string() }),
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => {
                debug!("Updated document {id} in {collection}");
                Ok(true)
            }
            _ => Err(api_error(response).await),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let Some(document) = self.get(collection, id).await? else {
            return Ok(false);
        };
        let rev = document
            .get("_rev")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let response = self
            .request(Method::DELETE, self.url(&[collection, id]))
            .query(&[("rev", rev.as_str())])
            .send()
            .await?;

        match response.status() {
            StatusCode::CONFLICT => Err(StoreError::Conflict { id: id.to_string() }),
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => {
                debug!("Deleted document {id} from {collection}");
                Ok(true)
            }
            _ => Err(api_error(response).await),
        }
    }

    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Value>, StoreError> {
        let url = self.url(&[collection, "_find"]);
        let mut body = query.to_mango();
        // An explicit limit is one request; otherwise page on the bookmark
        // until a short page comes back.
        let paged = query.limit.is_none();
        if paged {
            body["limit"] = Value::from(FIND_PAGE_SIZE);
        }

        let mut docs = Vec::new();
        loop {
            let response = self
                .request(Method::POST, url.clone())
                .json(&body)
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(api_error(response).await);
            }

            let page: FindResponse = response.json().await?;
            let page_len = page.docs.len();
            docs.extend(page.docs);

            match page.bookmark {
                Some(bookmark) if paged && page_len == FIND_PAGE_SIZE => {
                    body["bookmark"] = Value::String(bookmark);
                }
                _ => break,
            }
        }

        debug!("Found {} documents in {collection}", docs.len());
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SortDirection, MODULES_BY_TRAINING, POSTS_BY_USER, REQUIRED_INDEXES};
    use serde_json::json;
    use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> CouchClient {
        let uri = server.uri();
        let config = Config::from_lookup(|key| match key {
            "COUCHDB_URL" => Some(uri.clone()),
            _ => None,
        })
        .unwrap();
        CouchClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_ensure_collections_creates_only_missing() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/profiles"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/posts"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/posts"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/profiles"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        client_for(&server)
            .ensure_collections(&["profiles", "posts"])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ensure_collections_tolerates_concurrent_create() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/likes"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/likes"))
            .respond_with(ResponseTemplate::new(412).set_body_json(json!({
                "error": "file_exists",
                "reason": "The database could not be created, the file already exists."
            })))
            .mount(&server)
            .await;

        assert!(client_for(&server).ensure_collections(&["likes"]).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_sends_basic_auth_and_returns_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posts"))
            .and(header(
                "authorization",
                "Basic YWRtaW46cGFsbHlib3QtYWRtaW4tcGFzc3dvcmQ=",
            ))
            .and(body_partial_json(json!({"_id": "p-1", "type": "post"})))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"ok": true, "id": "p-1", "rev": "1-abc"})),
            )
            .mount(&server)
            .await;

        let id = client_for(&server)
            .create("posts", json!({"_id": "p-1", "type": "post"}))
            .await
            .unwrap();
        assert_eq!(id, "p-1");
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/profiles/ghost"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"error": "not_found", "reason": "missing"})),
            )
            .mount(&server)
            .await;

        let doc = client_for(&server).get("profiles", "ghost").await.unwrap();
        assert!(doc.is_none());
    }

    #[tokio::test]
    async fn test_server_error_surfaces_reason() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/profiles/u-1"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({"error": "unknown", "reason": "disk full"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).get("profiles", "u-1").await.unwrap_err();
        match err {
            StoreError::Api { status, reason } => {
                assert_eq!(status, 500);
                assert_eq!(reason, "disk full");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_merges_fields_and_keeps_revision() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/posts/p-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_id": "p-1",
                "_rev": "1-abc",
                "content": "original",
                "likes_count": 0,
                "type": "post"
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/posts/p-1"))
            .and(body_json(json!({
                "_id": "p-1",
                "_rev": "1-abc",
                "content": "edited",
                "likes_count": 0,
                "type": "post"
            })))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"ok": true, "id": "p-1", "rev": "2-def"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut fields = Map::new();
        fields.insert("content".to_string(), json!("edited"));
        let updated = client_for(&server)
            .update("posts", "p-1", fields)
            .await
            .unwrap();
        assert!(updated);
    }

    #[tokio::test]
    async fn test_update_conflict_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/posts/p-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"_id": "p-1", "_rev": "1-abc"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/posts/p-1"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": "conflict",
                "reason": "Document update conflict."
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .update("posts", "p-1", Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { id } if id == "p-1"));
    }

    #[tokio::test]
    async fn test_delete_missing_returns_false() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/trainings/t-9"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let deleted = client_for(&server).delete("trainings", "t-9").await.unwrap();
        assert!(!deleted);
    }

    #[tokio::test]
    async fn test_delete_passes_current_revision() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/trainings/t-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"_id": "t-1", "_rev": "3-xyz"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/trainings/t-1"))
            .and(query_param("rev", "3-xyz"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": true, "id": "t-1", "rev": "4-del"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        assert!(client_for(&server).delete("trainings", "t-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_find_posts_mango_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posts/_find"))
            .and(body_json(json!({
                "selector": {"type": "post", "user_id": "u-1"},
                "sort": [{"type": "desc"}, {"user_id": "desc"}, {"created_at": "desc"}],
                "use_index": ["posts-by-user", "posts-by-user"],
                "limit": FIND_PAGE_SIZE
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "docs": [{"_id": "p-2"}, {"_id": "p-1"}],
                "bookmark": "nil"
            })))
            .mount(&server)
            .await;

        let query = FindQuery::new()
            .eq("user_id", "u-1")
            .eq("type", "post")
            .sort("created_at", SortDirection::Desc)
            .using(POSTS_BY_USER);
        let docs = client_for(&server).find("posts", &query).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["_id"], "p-2");
    }

    #[tokio::test]
    async fn test_find_without_limit_follows_bookmark() {
        let server = MockServer::start().await;
        let first_page: Vec<Value> = (0..FIND_PAGE_SIZE)
            .map(|i| json!({"_id": format!("m-{i}")}))
            .collect();
        Mock::given(method("POST"))
            .and(path("/training_modules/_find"))
            .and(body_partial_json(json!({"bookmark": "page-2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "docs": [{"_id": "m-last"}],
                "bookmark": "page-3"
            })))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/training_modules/_find"))
            .and(body_partial_json(json!({"limit": FIND_PAGE_SIZE})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "docs": first_page,
                "bookmark": "page-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let query = FindQuery::new()
            .eq("training_id", "t-1")
            .eq("type", "module")
            .sort("order_index", SortDirection::Asc)
            .using(MODULES_BY_TRAINING);
        let docs = client_for(&server)
            .find("training_modules", &query)
            .await
            .unwrap();
        assert_eq!(docs.len(), FIND_PAGE_SIZE + 1);
        assert_eq!(docs[FIND_PAGE_SIZE]["_id"], "m-last");
    }

    #[tokio::test]
    async fn test_find_with_limit_is_a_single_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posts/_find"))
            .and(body_partial_json(json!({"limit": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "docs": [{"_id": "p-2"}, {"_id": "p-1"}],
                "bookmark": "more"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let query = FindQuery::new().eq("type", "post").limit(2);
        let docs = client_for(&server).find("posts", &query).await.unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[tokio::test]
    async fn test_unsorted_index_error_surfaces_as_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posts/_find"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "no_usable_index",
                "reason": "No index exists for this sort, try indexing by the sort fields."
            })))
            .mount(&server)
            .await;

        let query = FindQuery::new().sort("created_at", SortDirection::Desc);
        let err = client_for(&server).find("posts", &query).await.unwrap_err();
        assert!(matches!(err, StoreError::Api { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_ensure_indexes_posts_json_index_definitions() {
        let server = MockServer::start().await;
        for index in REQUIRED_INDEXES {
            Mock::given(method("POST"))
                .and(path(format!("/{}/_index", index.collection)))
                .and(body_json(json!({
                    "index": {"fields": index.fields},
                    "ddoc": index.name,
                    "name": index.name,
                    "type": "json"
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "result": "created",
                    "id": format!("_design/{}", index.name),
                    "name": index.name
                })))
                .expect(1)
                .mount(&server)
                .await;
        }

        client_for(&server)
            .ensure_indexes(&REQUIRED_INDEXES)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ensure_indexes_accepts_existing_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posts/_index"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "exists",
                "id": "_design/posts-by-user",
                "name": "posts-by-user"
            })))
            .mount(&server)
            .await;

        assert!(client_for(&server)
            .ensure_indexes(&[POSTS_BY_USER])
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_reserved_ids_are_never_requested() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rows": []})))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.get("profiles", "_all_docs").await.unwrap().is_none());
        assert!(!client.delete("profiles", "_design/x").await.unwrap());
    }

    #[tokio::test]
    async fn test_document_ids_are_encoded_as_one_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/profiles/a%2Fb"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"_id": "a/b"})))
            .mount(&server)
            .await;

        let doc = client_for(&server).get("profiles", "a/b").await.unwrap();
        assert_eq!(doc.unwrap()["_id"], "a/b");
    }

    #[tokio::test]
    async fn test_connect_pings_then_provisions_databases_and_indexes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"couchdb": "Welcome", "version": "3.3.3"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/profiles"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/posts/_index"))
            .and(body_partial_json(json!({
                "index": {"fields": ["type", "user_id", "created_at"]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "created",
                "id": "_design/posts-by-user",
                "name": "posts-by-user"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let uri = server.uri();
        let config = Config::from_lookup(|key| match key {
            "COUCHDB_URL" => Some(uri.clone()),
            _ => None,
        })
        .unwrap();
        assert!(CouchClient::connect(&config, &["profiles"], &[POSTS_BY_USER])
            .await
            .is_ok());
    }
}
