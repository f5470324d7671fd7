use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::models::post::{NewPost, Post, PostUpdate};
use crate::models::RecordKind;
use crate::services::{decode, decode_all, encode, update_fields};
use crate::store::{
    DocumentStore, FindQuery, SortDirection, StoreError, POSTS, POSTS_BY_CREATED, POSTS_BY_USER,
};

pub const DEFAULT_RECENT_LIMIT: usize = 20;

#[derive(Clone)]
pub struct PostService {
    store: Arc<dyn DocumentStore>,
}

impl PostService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Creates a post with a fresh id and zeroed counters; returns the id.
    pub async fn create_post(&self, new: NewPost) -> Result<String, StoreError> {
        let post = Post::from_new(new, Utc::now());
        let id = self.store.create(POSTS, encode(&post)?).await?;
        info!("Created post {id} by {}", post.user_id);
        Ok(id)
    }

    pub async fn get_post(&self, post_id: &str) -> Result<Option<Post>, StoreError> {
        self.store.get(POSTS, post_id).await?.map(decode).transpose()
    }

    pub async fn update_post(&self, post_id: &str, update: &PostUpdate) -> Result<bool, StoreError> {
        self.store
            .update(POSTS, post_id, update_fields(update)?)
            .await
    }

    pub async fn delete_post(&self, post_id: &str) -> Result<bool, StoreError> {
        self.store.delete(POSTS, post_id).await
    }

    /// All posts by one author, newest first.
    pub async fn get_user_posts(&self, user_id: &str) -> Result<Vec<Post>, StoreError> {
        let query = FindQuery::new()
            .eq("user_id", user_id)
            .eq("type", RecordKind::Post.as_str())
            .sort("created_at", SortDirection::Desc)
            .using(POSTS_BY_USER);
        decode_all(self.store.find(POSTS, &query).await?)
    }

    pub async fn get_recent_posts(&self, limit: usize) -> Result<Vec<Post>, StoreError> {
        let query = FindQuery::new()
            .eq("type", RecordKind::Post.as_str())
            .sort("created_at", SortDirection::Desc)
            .using(POSTS_BY_CREATED)
            .limit(limit);
        decode_all(self.store.find(POSTS, &query).await?)
    }
}
