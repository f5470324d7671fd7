use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::models::training::{
    ModuleUpdate, NewModule, NewTraining, Training, TrainingModule, TrainingStatus, TrainingUpdate,
};
use crate::models::{timestamp, RecordKind};
use crate::services::{decode, decode_all, encode, update_fields};
use crate::store::{
    DocumentStore, FindQuery, SortDirection, StoreError, MODULES_BY_TRAINING, TRAININGS,
    TRAININGS_BY_CREATOR, TRAININGS_BY_STATUS, TRAINING_MODULES,
};

pub const DEFAULT_STATUS_LIMIT: usize = 20;

/// Trainings and their modules. Modules live in their own collection and are
/// linked only by `training_id`; deleting a training leaves its modules alone.
#[derive(Clone)]
pub struct TrainingService {
    store: Arc<dyn DocumentStore>,
}

impl TrainingService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn create_training(&self, new: NewTraining) -> Result<String, StoreError> {
        let training = Training::from_new(new, Utc::now());
        let id = self.store.create(TRAININGS, encode(&training)?).await?;
        info!(
            "Created training {id} ({}) by {}",
            training.status.as_str(),
            training.created_by
        );
        Ok(id)
    }

    pub async fn get_training(&self, training_id: &str) -> Result<Option<Training>, StoreError> {
        self.store
            .get(TRAININGS, training_id)
            .await?
            .map(decode)
            .transpose()
    }

    pub async fn update_training(
        &self,
        training_id: &str,
        update: &TrainingUpdate,
    ) -> Result<bool, StoreError> {
        self.touch_and_update(TRAININGS, training_id, update).await
    }

    pub async fn delete_training(&self, training_id: &str) -> Result<bool, StoreError> {
        self.store.delete(TRAININGS, training_id).await
    }

    pub async fn get_trainings_by_status(
        &self,
        status: TrainingStatus,
        limit: usize,
    ) -> Result<Vec<Training>, StoreError> {
        let query = FindQuery::new()
            .eq("status", status.as_str())
            .eq("type", RecordKind::Training.as_str())
            .sort("created_at", SortDirection::Desc)
            .using(TRAININGS_BY_STATUS)
            .limit(limit);
        decode_all(self.store.find(TRAININGS, &query).await?)
    }

    pub async fn get_trainings_by_creator(
        &self,
        creator_id: &str,
    ) -> Result<Vec<Training>, StoreError> {
        let query = FindQuery::new()
            .eq("created_by", creator_id)
            .eq("type", RecordKind::Training.as_str())
            .sort("created_at", SortDirection::Desc)
            .using(TRAININGS_BY_CREATOR);
        decode_all(self.store.find(TRAININGS, &query).await?)
    }

    pub async fn create_module(
        &self,
        training_id: &str,
        new: NewModule,
    ) -> Result<String, StoreError> {
        let module = TrainingModule::from_new(training_id, new, Utc::now());
        let id = self
            .store
            .create(TRAINING_MODULES, encode(&module)?)
            .await?;
        info!(
            "Created module {id} at position {} of training {training_id}",
            module.order_index
        );
        Ok(id)
    }

    pub async fn get_module(&self, module_id: &str) -> Result<Option<TrainingModule>, StoreError> {
        self.store
            .get(TRAINING_MODULES, module_id)
            .await?
            .map(decode)
            .transpose()
    }

    pub async fn update_module(
        &self,
        module_id: &str,
        update: &ModuleUpdate,
    ) -> Result<bool, StoreError> {
        self.touch_and_update(TRAINING_MODULES, module_id, update)
            .await
    }

    pub async fn delete_module(&self, module_id: &str) -> Result<bool, StoreError> {
        self.store.delete(TRAINING_MODULES, module_id).await
    }

    /// Modules of a training in display order (`order_index` ascending).
    pub async fn get_modules_by_training(
        &self,
        training_id: &str,
    ) -> Result<Vec<TrainingModule>, StoreError> {
        let query = FindQuery::new()
            .eq("training_id", training_id)
            .eq("type", RecordKind::Module.as_str())
            .sort("order_index", SortDirection::Asc)
            .using(MODULES_BY_TRAINING);
        decode_all(self.store.find(TRAINING_MODULES, &query).await?)
    }

    async fn touch_and_update<T: Serialize>(
        &self,
        collection: &str,
        id: &str,
        update: &T,
    ) -> Result<bool, StoreError> {
        let mut fields = update_fields(update)?;
        fields.insert("updated_at".to_string(), timestamp::to_value(&Utc::now()));
        self.store.update(collection, id, fields).await
    }
}
