//! Model lifecycle manager.
//!
//! Tracks which trained model is authoritative for each
//! (building, algorithm) pair.
//!
//! ## Locking
//!
//! ```text
//! index: RwLock<ModelId → key>          (lookup / registration only)
//! slots: RwLock<key → Arc<Mutex<slot>>> (lookup / slot creation only)
//!                                │
//!                                ▼
//!                   slot: Mutex { models, active }   ◄── every mutation
//! ```
//!
//! Outer locks are released before a slot mutex is taken, except during
//! registration, which holds `index` while inserting to keep ids unique. The
//! active model of a key and the status of its models change together under
//! the slot mutex, so no reader ever observes zero or two active models while
//! a promotion is in flight.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use wattcast_core::{
    Algorithm, BuildingId, DomainError, DomainResult, ModelId, ModelMetadata, ModelStatus, PerformanceMetrics,
};

use crate::artifact::ModelArtifact;
use crate::stats;
use crate::store::{ModelRegistryStore, PersistedModel};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Number of performance records kept per model.
    pub performance_window: usize,
    /// A model is healthy while `rmse <= ratio · |normalization mean|`.
    pub health_rmse_ratio: f64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            performance_window: 30,
            health_rmse_ratio: 0.15,
        }
    }
}

impl ManagerConfig {
    /// Health verdict for a model with `metadata`'s normalization and `performance`.
    pub fn health_of(&self, metadata: &ModelMetadata, performance: &PerformanceMetrics) -> ModelHealth {
        if performance.rmse <= self.health_rmse_ratio * metadata.normalization.mean.abs() {
            ModelHealth::Healthy
        } else {
            ModelHealth::NeedsRetraining
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ModelKey {
    building_id: BuildingId,
    algorithm: Algorithm,
}

impl ModelKey {
    fn of(metadata: &ModelMetadata) -> Self {
        Self {
            building_id: metadata.building_id.clone(),
            algorithm: metadata.algorithm,
        }
    }
}

#[derive(Debug)]
struct ModelEntry {
    metadata: ModelMetadata,
    artifact: Arc<ModelArtifact>,
    window: VecDeque<PerformanceMetrics>,
    /// Bumped on every change; `saved` is the last revision written to the store.
    revision: u64,
    saved: u64,
}

impl ModelEntry {
    /// Window mean MAE and root-mean-square RMSE.
    fn effective(&self) -> PerformanceMetrics {
        if self.window.is_empty() {
            return self.metadata.performance;
        }
        let maes: Vec<f64> = self.window.iter().map(|m| m.mae).collect();
        let rmses: Vec<f64> = self.window.iter().map(|m| m.rmse).collect();
        PerformanceMetrics {
            mae: stats::mean(&maes),
            rmse: stats::rms(&rmses),
        }
    }

    fn snapshot(&self) -> ModelMetadata {
        let mut m = self.metadata.clone();
        m.performance = self.effective();
        m
    }

    fn set_status(&mut self, status: ModelStatus) {
        if self.metadata.status != status {
            self.metadata.status = status;
            self.touch();
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn is_dirty(&self) -> bool {
        self.revision != self.saved
    }

    fn persisted(&self) -> PersistedModel {
        PersistedModel {
            metadata: self.metadata.clone(),
            artifact: (*self.artifact).clone(),
            performance: self.window.iter().copied().collect(),
        }
    }
}

#[derive(Debug, Default)]
struct KeySlot {
    models: HashMap<ModelId, ModelEntry>,
    active: Option<ModelId>,
}

/// Read-only view of a model for inference.
#[derive(Debug, Clone)]
pub struct ModelHandle {
    pub artifact: Arc<ModelArtifact>,
    /// Snapshot taken when the handle was resolved, with effective performance.
    pub metadata: ModelMetadata,
}

impl ModelHandle {
    pub fn model_id(&self) -> ModelId {
        self.metadata.model_id
    }

    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    pub fn algorithm(&self) -> Algorithm {
        self.metadata.algorithm
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelHealth {
    Healthy,
    NeedsRetraining,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub model_id: ModelId,
    pub building_id: BuildingId,
    pub algorithm: Algorithm,
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub mae: f64,
    pub rmse: f64,
    /// Records in the rolling window.
    pub samples: usize,
    pub health: ModelHealth,
}

/// Registered/active model counts.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegistryCounts {
    pub registered: usize,
    pub active: usize,
}

fn poisoned<T>(_: PoisonError<T>) -> DomainError {
    DomainError::model_unavailable("model registry lock poisoned")
}

pub struct ModelManager {
    index: RwLock<HashMap<ModelId, ModelKey>>,
    slots: RwLock<HashMap<ModelKey, Arc<Mutex<KeySlot>>>>,
    config: ManagerConfig,
    store: Option<Arc<dyn ModelRegistryStore>>,
}

impl core::fmt::Debug for ModelManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ModelManager")
            .field("config", &self.config)
            .field("persistent", &self.store.is_some())
            .finish_non_exhaustive()
    }
}

impl ModelManager {
    /// Empty registry without persistence.
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            index: RwLock::new(HashMap::new()),
            slots: RwLock::new(HashMap::new()),
            config,
            store: None,
        }
    }

    /// Load every persisted model from `store`.
    ///
    /// If the store holds several active models for one key, the most
    /// recently trained one stays active and the others are retired.
    pub fn init(store: Arc<dyn ModelRegistryStore>, config: ManagerConfig) -> DomainResult<Self> {
        let persisted = store
            .load_all()
            .map_err(|e| DomainError::upstream(format!("loading model registry: {e}")))?;

        let mut manager = Self::new(config);
        let mut loaded = 0usize;
        for record in persisted {
            manager.restore(record)?;
            loaded += 1;
        }
        manager.store = Some(store);

        let counts = manager.counts()?;
        info!(loaded, active = counts.active, "model registry initialized");
        Ok(manager)
    }

    fn restore(&mut self, record: PersistedModel) -> DomainResult<()> {
        let PersistedModel {
            metadata,
            artifact,
            performance,
        } = record;
        metadata.validate()?;
        artifact.validate()?;
        let key = ModelKey::of(&metadata);
        let id = metadata.model_id;

        let index = self.index.get_mut().map_err(poisoned)?;
        if index.insert(id, key.clone()).is_some() {
            return Err(DomainError::validation(format!("model {id} is persisted twice")));
        }

        let slots = self.slots.get_mut().map_err(poisoned)?;
        let slot = slots.entry(key).or_default();
        let slot = Arc::get_mut(slot)
            .ok_or_else(|| DomainError::model_unavailable("registry slot shared during init"))?
            .get_mut()
            .map_err(poisoned)?;

        let mut window: VecDeque<PerformanceMetrics> = performance.into_iter().collect();
        while window.len() > self.config.performance_window.max(1) {
            window.pop_front();
        }
        let mut entry = ModelEntry {
            metadata,
            artifact: Arc::new(artifact),
            window,
            revision: 0,
            saved: 0,
        };

        if entry.metadata.is_active() {
            match slot.active.and_then(|prev| slot.models.get_mut(&prev)) {
                Some(prev) if prev.metadata.trained_at >= entry.metadata.trained_at => {
                    warn!(model_id = %id, kept = %prev.metadata.model_id, "duplicate active model retired on load");
                    entry.set_status(ModelStatus::Retired);
                }
                Some(prev) => {
                    warn!(model_id = %prev.metadata.model_id, kept = %id, "duplicate active model retired on load");
                    prev.set_status(ModelStatus::Retired);
                    slot.active = Some(id);
                }
                None => slot.active = Some(id),
            }
        }
        slot.models.insert(id, entry);
        Ok(())
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    fn key_of(&self, id: ModelId) -> DomainResult<ModelKey> {
        self.index
            .read()
            .map_err(poisoned)?
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("model {id}")))
    }

    fn slot(&self, key: &ModelKey) -> DomainResult<Option<Arc<Mutex<KeySlot>>>> {
        Ok(self.slots.read().map_err(poisoned)?.get(key).cloned())
    }

    /// Run `f` on the entry of model `id` with its slot locked.
    fn with_entry<T>(&self, id: ModelId, f: impl FnOnce(&mut KeySlot) -> DomainResult<T>) -> DomainResult<T> {
        let key = self.key_of(id)?;
        let slot = self
            .slot(&key)?
            .ok_or_else(|| DomainError::not_found(format!("model {id}")))?;
        let mut guard = slot.lock().map_err(poisoned)?;
        if !guard.models.contains_key(&id) {
            return Err(DomainError::not_found(format!("model {id}")));
        }
        f(&mut guard)
    }

    /// Register a trained model. New models start retired.
    pub fn register_model(&self, metadata: ModelMetadata, artifact: ModelArtifact) -> DomainResult<ModelId> {
        metadata.validate()?;
        artifact.validate()?;
        if artifact.algorithm() != metadata.algorithm {
            return Err(DomainError::validation(format!(
                "artifact is a {} model but metadata declares {}",
                artifact.algorithm(),
                metadata.algorithm
            )));
        }

        let id = metadata.model_id;
        let key = ModelKey::of(&metadata);

        let mut index = self.index.write().map_err(poisoned)?;
        if index.contains_key(&id) {
            return Err(DomainError::validation(format!("model {id} is already registered")));
        }

        let slot = {
            let mut slots = self.slots.write().map_err(poisoned)?;
            slots.entry(key.clone()).or_default().clone()
        };

        let mut entry = ModelEntry {
            window: VecDeque::from([metadata.performance]),
            metadata,
            artifact: Arc::new(artifact),
            revision: 1,
            saved: 0,
        };
        entry.metadata.status = ModelStatus::Retired;

        info!(
            model_id = %id,
            building_id = %key.building_id,
            algorithm = %key.algorithm,
            version = %entry.metadata.version,
            "model registered"
        );
        slot.lock().map_err(poisoned)?.models.insert(id, entry);
        index.insert(id, key);
        Ok(id)
    }

    /// Resolve the active model for (building, algorithm).
    pub fn get_active_model(&self, building_id: &BuildingId, algorithm: Algorithm) -> DomainResult<ModelHandle> {
        let key = ModelKey {
            building_id: building_id.clone(),
            algorithm,
        };
        let unavailable = || DomainError::model_unavailable(format!("no active {algorithm} model for building {building_id}"));

        let slot = self.slot(&key)?.ok_or_else(unavailable)?;
        let guard = slot.lock().map_err(poisoned)?;
        let entry = guard
            .active
            .and_then(|id| guard.models.get(&id))
            .ok_or_else(unavailable)?;
        Ok(ModelHandle {
            artifact: Arc::clone(&entry.artifact),
            metadata: entry.snapshot(),
        })
    }

    /// Activate `id`, retiring the previous active model of the same key.
    pub fn promote(&self, id: ModelId) -> DomainResult<ModelMetadata> {
        self.with_entry(id, |slot| {
            let previous = slot.active.filter(|prev| *prev != id);
            if let Some(prev) = previous.and_then(|p| slot.models.get_mut(&p)) {
                prev.set_status(ModelStatus::Retired);
            }
            slot.active = Some(id);
            let entry = slot
                .models
                .get_mut(&id)
                .ok_or_else(|| DomainError::not_found(format!("model {id}")))?;
            entry.set_status(ModelStatus::Active);
            info!(
                model_id = %id,
                previous = ?previous.map(|p| p.to_string()),
                version = %entry.metadata.version,
                "model promoted"
            );
            Ok(entry.snapshot())
        })
    }

    /// Retire `id`. Retiring the active model leaves its key without one.
    pub fn retire(&self, id: ModelId) -> DomainResult<ModelMetadata> {
        self.with_entry(id, |slot| {
            if slot.active == Some(id) {
                slot.active = None;
            }
            let entry = slot
                .models
                .get_mut(&id)
                .ok_or_else(|| DomainError::not_found(format!("model {id}")))?;
            entry.set_status(ModelStatus::Retired);
            info!(model_id = %id, "model retired");
            Ok(entry.snapshot())
        })
    }

    /// Append `metrics` to the model's rolling window and return the new
    /// effective performance.
    pub fn record_performance(&self, id: ModelId, metrics: PerformanceMetrics) -> DomainResult<PerformanceMetrics> {
        metrics.validate()?;
        let window = self.config.performance_window.max(1);
        self.with_entry(id, |slot| {
            let entry = slot
                .models
                .get_mut(&id)
                .ok_or_else(|| DomainError::not_found(format!("model {id}")))?;
            entry.window.push_back(metrics);
            while entry.window.len() > window {
                entry.window.pop_front();
            }
            entry.touch();
            Ok(entry.effective())
        })
    }

    pub fn metadata(&self, id: ModelId) -> DomainResult<ModelMetadata> {
        self.with_entry(id, |slot| {
            slot.models
                .get(&id)
                .map(ModelEntry::snapshot)
                .ok_or_else(|| DomainError::not_found(format!("model {id}")))
        })
    }

    /// Every model registered for `building_id`, ordered by algorithm then training time.
    pub fn list_models(&self, building_id: &BuildingId) -> DomainResult<Vec<ModelMetadata>> {
        let slots: Vec<Arc<Mutex<KeySlot>>> = self
            .slots
            .read()
            .map_err(poisoned)?
            .iter()
            .filter(|(k, _)| &k.building_id == building_id)
            .map(|(_, s)| Arc::clone(s))
            .collect();

        let mut out = Vec::new();
        for slot in slots {
            let guard = slot.lock().map_err(poisoned)?;
            out.extend(guard.models.values().map(ModelEntry::snapshot));
        }
        out.sort_by(|a, b| {
            a.algorithm
                .cmp(&b.algorithm)
                .then(a.trained_at.cmp(&b.trained_at))
                .then(a.model_id.cmp(&b.model_id))
        });
        Ok(out)
    }

    /// Accuracy and health of the active model for (building, algorithm).
    pub fn performance_report(&self, building_id: &BuildingId, algorithm: Algorithm) -> DomainResult<PerformanceReport> {
        let key = ModelKey {
            building_id: building_id.clone(),
            algorithm,
        };
        let unavailable = || DomainError::model_unavailable(format!("no active {algorithm} model for building {building_id}"));

        let slot = self.slot(&key)?.ok_or_else(unavailable)?;
        let guard = slot.lock().map_err(poisoned)?;
        let entry = guard
            .active
            .and_then(|id| guard.models.get(&id))
            .ok_or_else(unavailable)?;

        let performance = entry.effective();
        Ok(PerformanceReport {
            model_id: entry.metadata.model_id,
            building_id: building_id.clone(),
            algorithm,
            version: entry.metadata.version.clone(),
            trained_at: entry.metadata.trained_at,
            mae: performance.mae,
            rmse: performance.rmse,
            samples: entry.window.len(),
            health: self.config.health_of(&entry.metadata, &performance),
        })
    }

    pub fn counts(&self) -> DomainResult<RegistryCounts> {
        let slots: Vec<Arc<Mutex<KeySlot>>> = self.slots.read().map_err(poisoned)?.values().cloned().collect();
        let mut counts = RegistryCounts::default();
        for slot in slots {
            let guard = slot.lock().map_err(poisoned)?;
            counts.registered += guard.models.len();
            counts.active += usize::from(guard.active.is_some());
        }
        Ok(counts)
    }

    /// Write every changed model to the registry store. Returns the number saved.
    ///
    /// Changed models are snapshotted slot by slot and written in one batch
    /// with no slot locked. A model changed again while the batch is written
    /// stays pending for the next flush.
    pub fn flush(&self) -> DomainResult<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let slots: Vec<Arc<Mutex<KeySlot>>> = self.slots.read().map_err(poisoned)?.values().cloned().collect();

        let mut batch = Vec::new();
        let mut written = Vec::new();
        for slot in &slots {
            let guard = slot.lock().map_err(poisoned)?;
            for entry in guard.models.values().filter(|e| e.is_dirty()) {
                batch.push(entry.persisted());
                written.push((Arc::clone(slot), entry.metadata.model_id, entry.revision));
            }
        }
        if batch.is_empty() {
            return Ok(0);
        }

        store
            .save_batch(&batch)
            .map_err(|e| DomainError::upstream(format!("saving {} models: {e}", batch.len())))?;

        for (slot, id, revision) in written {
            let mut guard = slot.lock().map_err(poisoned)?;
            if let Some(entry) = guard.models.get_mut(&id) {
                entry.saved = entry.saved.max(revision);
            }
        }
        debug!(saved = batch.len(), "model registry flushed");
        Ok(batch.len())
    }

    /// Flush pending changes before the process exits.
    pub fn shutdown(&self) -> DomainResult<()> {
        let saved = self.flush()?;
        info!(saved, "model registry shut down");
        Ok(())
    }
}
