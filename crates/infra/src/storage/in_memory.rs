use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use chrono::Utc;

use wattcast_core::{
    Building, BuildingId, ForecastId, ForecastResult, ForecastType, Granularity, Horizon, MeasurementPoint,
    MeasurementSeries, TimeRange,
};

use super::r#trait::{EnergyDataStore, ForecastAck, StorageError};

#[derive(Debug)]
struct History {
    granularity: Granularity,
    points: Vec<MeasurementPoint>,
}

/// In-memory storage collaborator.
///
/// Intended for tests/dev. Supports injected latency and transient failures
/// so retry and deadline behavior can be exercised.
#[derive(Debug, Default)]
pub struct InMemoryEnergyStore {
    buildings: RwLock<HashMap<BuildingId, Building>>,
    history: RwLock<HashMap<BuildingId, History>>,
    forecasts: RwLock<HashMap<ForecastId, ForecastResult>>,
    transient_failures: AtomicU32,
    latency: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> StorageError {
    StorageError::Permanent("lock poisoned".to_string())
}

impl InMemoryEnergyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_building(&self, building: Building) {
        if let Ok(mut b) = self.buildings.write() {
            b.insert(building.id.clone(), building);
        }
    }

    /// Append readings for a building, replacing its granularity.
    pub fn insert_measurements(&self, series: MeasurementSeries) {
        if let Ok(mut h) = self.history.write() {
            let entry = h.entry(series.building_id.clone()).or_insert(History {
                granularity: series.granularity,
                points: Vec::new(),
            });
            entry.granularity = series.granularity;
            entry.points.extend(series.points);
        }
    }

    /// Make the next `n` calls fail with a transient error.
    pub fn fail_transiently(&self, n: u32) {
        self.transient_failures.store(n, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut l) = self.latency.lock() {
            *l = latency;
        }
    }

    /// Number of calls made so far, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn forecast_count(&self) -> usize {
        self.forecasts.read().map(|f| f.len()).unwrap_or_default()
    }

    async fn before_call(&self, op: &str) -> Result<(), StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock().map_err(poisoned)?;
        if let Some(d) = latency {
            tokio::time::sleep(d).await;
        }
        let failed = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(StorageError::Transient(format!("{op}: injected failure")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl EnergyDataStore for InMemoryEnergyStore {
    async fn get_measurements(
        &self,
        building_id: &BuildingId,
        range: TimeRange,
    ) -> Result<MeasurementSeries, StorageError> {
        self.before_call("get_measurements").await?;
        if !self.buildings.read().map_err(poisoned)?.contains_key(building_id) {
            return Err(StorageError::NotFound(format!("building {building_id}")));
        }
        let history = self.history.read().map_err(poisoned)?;
        let series = match history.get(building_id) {
            Some(h) => MeasurementSeries::new(
                building_id.clone(),
                h.granularity,
                h.points.iter().filter(|p| range.contains(p.timestamp)).copied().collect(),
            ),
            None => MeasurementSeries::new(building_id.clone(), Granularity::default(), Vec::new()),
        };
        Ok(series)
    }

    async fn get_building(&self, building_id: &BuildingId) -> Result<Building, StorageError> {
        self.before_call("get_building").await?;
        self.buildings
            .read()
            .map_err(poisoned)?
            .get(building_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("building {building_id}")))
    }

    async fn create_forecast(&self, result: &ForecastResult) -> Result<ForecastAck, StorageError> {
        self.before_call("create_forecast").await?;
        let mut forecasts = self.forecasts.write().map_err(poisoned)?;
        if forecasts.contains_key(&result.id) {
            return Err(StorageError::Permanent(format!("forecast {} already stored", result.id)));
        }
        forecasts.insert(result.id, result.clone());
        Ok(ForecastAck {
            id: result.id,
            stored_at: Utc::now(),
        })
    }

    async fn get_forecast(&self, id: ForecastId) -> Result<ForecastResult, StorageError> {
        self.before_call("get_forecast").await?;
        self.forecasts
            .read()
            .map_err(poisoned)?
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("forecast {id}")))
    }

    async fn get_latest_forecast(
        &self,
        building_id: &BuildingId,
        horizon: Horizon,
        forecast_type: ForecastType,
    ) -> Result<Option<ForecastResult>, StorageError> {
        self.before_call("get_latest_forecast").await?;
        let forecasts = self.forecasts.read().map_err(poisoned)?;
        Ok(forecasts
            .values()
            .filter(|f| &f.building_id == building_id && f.horizon == horizon && f.forecast_type == forecast_type)
            .max_by_key(|f| (f.generated_at, f.id))
            .cloned())
    }
}
