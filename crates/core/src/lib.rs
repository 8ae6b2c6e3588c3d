//! `wattcast-core`: domain foundation for the forecasting engines.
//!
//! This crate contains **pure domain** types (no infrastructure concerns):
//! identifiers, the error taxonomy, measurement series, forecasts, tariffs,
//! recommendations and model metadata.

pub mod building;
pub mod error;
pub mod forecast;
pub mod id;
pub mod model;
pub mod recommendation;
pub mod series;
pub mod tariff;
pub mod value_object;

pub use building::Building;
pub use error::{DomainError, DomainResult};
pub use forecast::{
    ForecastRequest, ForecastResult, ForecastType, Horizon, ImputationReport, PredictedPoint,
    validity_window,
};
pub use id::{BuildingId, ForecastId, ModelId};
pub use model::{Algorithm, ModelMetadata, ModelStatus, NormalizationStats, PerformanceMetrics};
pub use recommendation::{
    MAX_TIME_RANGE_HOURS, OptimizationRequest, OptimizationResult, Recommendation,
    RecommendationAction, SavingsSummary, TimeWindow,
};
pub use series::{Granularity, MeasurementPoint, MeasurementSeries, TimeRange};
pub use tariff::{TariffBand, TariffSchedule};
pub use value_object::ValueObject;
