//! JSON-file backed model registry store.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use wattcast_core::{DomainResult, ModelId};
use wattcast_models::{ManagerConfig, ModelManager, ModelRegistryStore, PersistedModel, RegistryStoreError};

/// Keeps every registered model in a single JSON document.
///
/// Writes go to a sibling temp file first and are renamed into place.
#[derive(Debug)]
pub struct JsonFileRegistryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileRegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<BTreeMap<ModelId, PersistedModel>, RegistryStoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(RegistryStoreError::Io(format!("{}: {e}", self.path.display()))),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let models: Vec<PersistedModel> = serde_json::from_str(&raw)
            .map_err(|e| RegistryStoreError::Corrupt(format!("{}: {e}", self.path.display())))?;
        Ok(models.into_iter().map(|m| (m.metadata.model_id, m)).collect())
    }

    fn write(&self, models: &BTreeMap<ModelId, PersistedModel>) -> Result<(), RegistryStoreError> {
        let records: Vec<&PersistedModel> = models.values().collect();
        let body = serde_json::to_vec_pretty(&records).map_err(|e| RegistryStoreError::Io(e.to_string()))?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| RegistryStoreError::Io(format!("{}: {e}", dir.display())))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|e| RegistryStoreError::Io(format!("{}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path).map_err(|e| RegistryStoreError::Io(format!("{}: {e}", self.path.display())))?;
        Ok(())
    }
}

impl ModelRegistryStore for JsonFileRegistryStore {
    fn load_all(&self) -> Result<Vec<PersistedModel>, RegistryStoreError> {
        let models = self.read()?;
        debug!(path = %self.path.display(), models = models.len(), "registry loaded");
        Ok(models.into_values().collect())
    }

    fn save(&self, model: &PersistedModel) -> Result<(), RegistryStoreError> {
        self.save_batch(std::slice::from_ref(model))
    }

    /// One read and one atomic rewrite of the file for the whole batch.
    fn save_batch(&self, batch: &[PersistedModel]) -> Result<(), RegistryStoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| RegistryStoreError::Io("lock poisoned".to_string()))?;
        let mut models = self.read()?;
        for model in batch {
            models.insert(model.metadata.model_id, model.clone());
        }
        self.write(&models)
    }
}

/// Registry backed by the JSON file at `path`, or purely in memory when `None`.
pub fn open_registry(path: Option<&Path>, config: ManagerConfig) -> DomainResult<ModelManager> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "opening model registry");
            ModelManager::init(Arc::new(JsonFileRegistryStore::new(path)), config)
        }
        None => Ok(ModelManager::new(config)),
    }
}
