use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use wattcast_core::{
    Building, BuildingId, ForecastId, ForecastResult, ForecastType, Horizon, MeasurementSeries, TimeRange,
};

/// Acknowledgement returned once a forecast is durably stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastAck {
    pub id: ForecastId,
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Worth retrying (timeouts, dropped connections, throttling).
    #[error("transient storage failure: {0}")]
    Transient(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Retrying will not help (bad data, rejected write).
    #[error("storage failure: {0}")]
    Permanent(String),
}

impl StorageError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Transient(_))
    }
}

/// Async capability used by the forecast service.
#[async_trait::async_trait]
pub trait EnergyDataStore: Send + Sync {
    /// Readings for `building_id` whose timestamps fall inside `range`.
    async fn get_measurements(
        &self,
        building_id: &BuildingId,
        range: TimeRange,
    ) -> Result<MeasurementSeries, StorageError>;

    async fn get_building(&self, building_id: &BuildingId) -> Result<Building, StorageError>;

    /// Persist a generated forecast.
    async fn create_forecast(&self, result: &ForecastResult) -> Result<ForecastAck, StorageError>;

    async fn get_forecast(&self, id: ForecastId) -> Result<ForecastResult, StorageError>;

    /// Most recently generated forecast matching the filter, if any.
    async fn get_latest_forecast(
        &self,
        building_id: &BuildingId,
        horizon: Horizon,
        forecast_type: ForecastType,
    ) -> Result<Option<ForecastResult>, StorageError>;
}

#[async_trait::async_trait]
impl<S: EnergyDataStore + ?Sized> EnergyDataStore for Arc<S> {
    async fn get_measurements(
        &self,
        building_id: &BuildingId,
        range: TimeRange,
    ) -> Result<MeasurementSeries, StorageError> {
        (**self).get_measurements(building_id, range).await
    }

    async fn get_building(&self, building_id: &BuildingId) -> Result<Building, StorageError> {
        (**self).get_building(building_id).await
    }

    async fn create_forecast(&self, result: &ForecastResult) -> Result<ForecastAck, StorageError> {
        (**self).create_forecast(result).await
    }

    async fn get_forecast(&self, id: ForecastId) -> Result<ForecastResult, StorageError> {
        (**self).get_forecast(id).await
    }

    async fn get_latest_forecast(
        &self,
        building_id: &BuildingId,
        horizon: Horizon,
        forecast_type: ForecastType,
    ) -> Result<Option<ForecastResult>, StorageError> {
        (**self).get_latest_forecast(building_id, horizon, forecast_type).await
    }
}
