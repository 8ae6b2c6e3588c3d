use serde::Deserialize;

use wattcast_core::{Algorithm, BuildingId, ForecastType, Horizon, ModelMetadata};
use wattcast_models::ModelArtifact;

fn default_horizon() -> Horizon {
    Horizon::Day
}

#[derive(Debug, Deserialize)]
pub struct LatestForecastQuery {
    #[serde(default = "default_horizon")]
    pub horizon: Horizon,
    #[serde(default)]
    pub forecast_type: ForecastType,
}

#[derive(Debug, Deserialize)]
pub struct PerformanceQuery {
    pub building_id: BuildingId,
    pub algorithm: Algorithm,
}

#[derive(Debug, Deserialize)]
pub struct ModelsQuery {
    pub building_id: BuildingId,
}

#[derive(Debug, Deserialize)]
pub struct RegisterModelRequest {
    pub metadata: ModelMetadata,
    pub artifact: ModelArtifact,
}

#[derive(Debug, Deserialize)]
pub struct RecordPerformanceRequest {
    pub mae: f64,
    pub rmse: f64,
}
