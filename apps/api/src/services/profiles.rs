use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::models::profile::{NewProfile, Profile, ProfileRole, ProfileUpdate};
use crate::models::{timestamp, RecordKind};
use crate::services::{decode, decode_all, encode, update_fields};
use crate::store::{DocumentStore, FindQuery, StoreError, PROFILES};

#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn DocumentStore>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Stores a profile under the caller's user id and returns that id.
    pub async fn create_profile(&self, new: NewProfile) -> Result<String, StoreError> {
        let profile = Profile::from_new(new, Utc::now());
        let id = self.store.create(PROFILES, encode(&profile)?).await?;
        info!("Created profile {id} ({})", profile.role.as_str());
        Ok(id)
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        self.store
            .get(PROFILES, user_id)
            .await?
            .map(decode)
            .transpose()
    }

    /// Merges the supplied fields and refreshes `updated_at`. `Ok(false)` if absent.
    pub async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<bool, StoreError> {
        let mut fields = update_fields(update)?;
        fields.insert("updated_at".to_string(), timestamp::to_value(&Utc::now()));
        self.store.update(PROFILES, user_id, fields).await
    }

    pub async fn delete_profile(&self, user_id: &str) -> Result<bool, StoreError> {
        self.store.delete(PROFILES, user_id).await
    }

    pub async fn get_profiles_by_role(&self, role: ProfileRole) -> Result<Vec<Profile>, StoreError> {
        let query = FindQuery::new()
            .eq("role", role.as_str())
            .eq("type", RecordKind::Profile.as_str());
        decode_all(self.store.find(PROFILES, &query).await?)
    }
}
