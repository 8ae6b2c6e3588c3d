//! Persistence boundary for the model registry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use wattcast_core::{ModelId, ModelMetadata, PerformanceMetrics};

use crate::artifact::ModelArtifact;

/// Everything needed to restore one model into the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedModel {
    pub metadata: ModelMetadata,
    pub artifact: ModelArtifact,
    /// Rolling performance window, oldest first.
    #[serde(default)]
    pub performance: Vec<PerformanceMetrics>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryStoreError {
    #[error("registry store i/o failed: {0}")]
    Io(String),
    #[error("registry record is corrupt: {0}")]
    Corrupt(String),
}

/// Registry store abstraction consulted at `ModelManager::init` and `shutdown`.
pub trait ModelRegistryStore: Send + Sync {
    /// Load every persisted model.
    fn load_all(&self) -> Result<Vec<PersistedModel>, RegistryStoreError>;

    /// Insert or replace the record for `model.metadata.model_id`.
    fn save(&self, model: &PersistedModel) -> Result<(), RegistryStoreError>;

    /// Insert or replace several records in one write.
    fn save_batch(&self, models: &[PersistedModel]) -> Result<(), RegistryStoreError> {
        models.iter().try_for_each(|m| self.save(m))
    }
}

impl<S: ModelRegistryStore + ?Sized> ModelRegistryStore for Arc<S> {
    fn load_all(&self) -> Result<Vec<PersistedModel>, RegistryStoreError> {
        (**self).load_all()
    }

    fn save(&self, model: &PersistedModel) -> Result<(), RegistryStoreError> {
        (**self).save(model)
    }

    fn save_batch(&self, models: &[PersistedModel]) -> Result<(), RegistryStoreError> {
        (**self).save_batch(models)
    }
}

/// In-memory registry store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryRegistryStore {
    models: RwLock<HashMap<ModelId, PersistedModel>>,
}

impl InMemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn get(&self, id: ModelId) -> Option<PersistedModel> {
        self.models.read().ok().and_then(|m| m.get(&id).cloned())
    }
}

impl ModelRegistryStore for InMemoryRegistryStore {
    fn load_all(&self) -> Result<Vec<PersistedModel>, RegistryStoreError> {
        let models = self
            .models
            .read()
            .map_err(|_| RegistryStoreError::Io("lock poisoned".to_string()))?;
        let mut out: Vec<PersistedModel> = models.values().cloned().collect();
        out.sort_by_key(|m| m.metadata.model_id);
        Ok(out)
    }

    fn save(&self, model: &PersistedModel) -> Result<(), RegistryStoreError> {
        self.save_batch(std::slice::from_ref(model))
    }

    fn save_batch(&self, batch: &[PersistedModel]) -> Result<(), RegistryStoreError> {
        let mut models = self
            .models
            .write()
            .map_err(|_| RegistryStoreError::Io("lock poisoned".to_string()))?;
        for model in batch {
            models.insert(model.metadata.model_id, model.clone());
        }
        Ok(())
    }
}
