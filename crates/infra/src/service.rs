//! Forecast orchestration.
//!
//! ```text
//!  ForecastRequest
//!        │ validate
//!        ▼
//!  ┌───────────── deadline ─────────────────────────────────────────┐
//!  │ authorize ─► get_building ─► get_measurements ─► predict       │
//!  │                  (retry)          (retry)           │          │
//!  │                                                     ▼          │
//!  │            create_forecast ◄── recommend ◄── price (cost only) │
//!  │                (retry)         (cost / optimize)               │
//!  └────────────────────────────────────────────────────────────────┘
//!        ▼
//!  ForecastResponse
//! ```
//!
//! Requests are stateless and never deduplicated. The first failure is
//! returned as-is; nothing is persisted for a failed request. When the
//! deadline elapses the in-flight work is dropped and `Timeout` is returned.
//! Storage calls may block, so the deadline is also checked between stages
//! and immediately before every write; a late request never persists.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use wattcast_auth::{Authorizer, Permission};
use wattcast_core::{
    Algorithm, BuildingId, DomainError, DomainResult, ForecastId, ForecastRequest, ForecastResult, ForecastType,
    Horizon, ModelId, ModelMetadata, OptimizationRequest, OptimizationResult, PerformanceMetrics, TimeRange,
};
use wattcast_forecast::ForecastEngine;
use wattcast_models::{ModelArtifact, ModelManager, PerformanceReport};
use wattcast_optimization::OptimizationEngine;

use crate::config::ServiceConfig;
use crate::deadline::Deadline;
use crate::retry::with_retry;
use crate::storage::EnergyDataStore;

/// Source of "now" for request timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock(RwLock<DateTime<Utc>>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(RwLock::new(at))
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut t) = self.0.write() {
            *t += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0.read().map(|t| *t).unwrap_or_else(|p| *p.into_inner())
    }
}

/// A forecast on the wire, with recommendations attached when they were computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResponse {
    #[serde(flatten)]
    pub forecast: ForecastResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimization: Option<OptimizationResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthDetails {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub models_registered: usize,
    pub models_active: usize,
}

pub struct ForecastService<S: EnergyDataStore + ?Sized> {
    store: Arc<S>,
    authorizer: Arc<dyn Authorizer>,
    models: Arc<ModelManager>,
    forecasts: Arc<ForecastEngine>,
    optimizer: OptimizationEngine,
    config: ServiceConfig,
    clock: Arc<dyn Clock>,
    started: Instant,
}

impl<S: EnergyDataStore + ?Sized> core::fmt::Debug for ForecastService<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ForecastService")
            .field("models", &self.models)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn floor_to_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    t.duration_trunc(Duration::hours(1)).unwrap_or(t)
}

impl<S: EnergyDataStore + ?Sized> ForecastService<S> {
    /// Wire a service from validated configuration.
    ///
    /// Access control comes from `config.access`; the clock is the system clock.
    pub fn new(store: Arc<S>, models: Arc<ModelManager>, config: ServiceConfig) -> DomainResult<Self> {
        config.validate()?;
        let forecasts = Arc::new(
            ForecastEngine::new(Arc::clone(&models), config.engine.clone()).with_tariff(config.tariff.clone()),
        );
        Ok(Self {
            store,
            authorizer: config.access.authorizer(),
            models,
            forecasts,
            optimizer: OptimizationEngine::new(config.optimizer),
            config,
            clock: Arc::new(SystemClock),
            started: Instant::now(),
        })
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn models(&self) -> &Arc<ModelManager> {
        &self.models
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn authorize(&self, requested_by: &str, building_id: &BuildingId, required: &Permission) -> DomainResult<()> {
        self.authorizer.check(requested_by, building_id, required)?;
        Ok(())
    }

    /// Forecast one building, optionally with load-shifting recommendations.
    pub async fn request_forecast(&self, request: ForecastRequest) -> DomainResult<ForecastResponse> {
        request.validate()?;
        let deadline = Deadline::start(self.config.request_deadline());
        info!(
            building_id = %request.building_id,
            horizon = %request.horizon,
            forecast_type = %request.forecast_type,
            requested_by = %request.requested_by,
            "forecast requested"
        );

        let result = deadline.run(self.forecast_inner(&request, &deadline)).await;
        if let Err(e) = &result {
            warn!(building_id = %request.building_id, error = %e, code = e.code(), "forecast request failed");
        }
        result
    }

    async fn forecast_inner(&self, request: &ForecastRequest, deadline: &Deadline) -> DomainResult<ForecastResponse> {
        self.authorize(&request.requested_by, &request.building_id, &Permission::FORECAST_REQUEST)?;

        let energy = self
            .produce_energy_forecast(&request.building_id, request.horizon, deadline)
            .await?;
        let forecast = match request.forecast_type {
            ForecastType::EnergyDemand => energy.clone(),
            ForecastType::Cost => energy.priced(&self.config.tariff)?,
        };

        let optimization = if request.optimize || request.forecast_type == ForecastType::Cost {
            Some(self.optimize(&energy, energy.covered_hours())?)
        } else {
            None
        };

        self.persist(&forecast, deadline).await?;
        info!(
            building_id = %forecast.building_id,
            forecast_id = %forecast.id,
            horizon = %forecast.horizon,
            model_version = %forecast.model_version,
            points = forecast.len(),
            "forecast completed"
        );
        Ok(ForecastResponse { forecast, optimization })
    }

    /// Ranked recommendations for the next `time_range_hours` of a building.
    ///
    /// A stored energy forecast is reused when it is younger than the
    /// configured reuse age and covers the whole window; otherwise a fresh
    /// one is produced and persisted.
    pub async fn request_optimization(&self, request: OptimizationRequest) -> DomainResult<OptimizationResult> {
        request.validate()?;
        let deadline = Deadline::start(self.config.request_deadline());
        info!(
            building_id = %request.building_id,
            time_range_hours = request.time_range_hours,
            requested_by = %request.requested_by,
            "optimization requested"
        );

        let result = deadline.run(self.optimization_inner(&request, &deadline)).await;
        if let Err(e) = &result {
            warn!(building_id = %request.building_id, error = %e, code = e.code(), "optimization request failed");
        }
        result
    }

    async fn optimization_inner(
        &self,
        request: &OptimizationRequest,
        deadline: &Deadline,
    ) -> DomainResult<OptimizationResult> {
        self.authorize(&request.requested_by, &request.building_id, &Permission::OPTIMIZATION_REQUEST)?;

        let hours = i64::from(request.time_range_hours);
        let horizon = if hours <= Horizon::Day.hours() { Horizon::Day } else { Horizon::Week };
        let now = self.clock.now();
        let reuse_age = self.config.forecast_reuse_age();

        let store = &self.store;
        let building_id = &request.building_id;
        let latest = with_retry(&self.config.retry, "get_latest_forecast", move || {
            store.get_latest_forecast(building_id, horizon, ForecastType::EnergyDemand)
        })
        .await?;
        deadline.check()?;

        let reusable = latest.filter(|f| {
            let age = now - f.generated_at;
            age >= Duration::zero() && age <= reuse_age && f.covered_hours() >= hours
        });
        let forecast = match reusable {
            Some(f) => {
                info!(building_id = %f.building_id, forecast_id = %f.id, "reusing stored forecast");
                f
            }
            None => {
                let fresh = self
                    .produce_energy_forecast(&request.building_id, horizon, deadline)
                    .await?;
                self.persist(&fresh, deadline).await?;
                fresh
            }
        };

        self.optimize(&forecast, hours)
    }

    /// Recommendations over the first `hours` of an energy forecast.
    fn optimize(&self, forecast: &ForecastResult, hours: i64) -> DomainResult<OptimizationResult> {
        let scoped = forecast.truncated(hours);
        let recommendations = self.optimizer.recommend(&scoped, &self.config.tariff)?;
        let savings = self.optimizer.summarize(&recommendations, scoped.covered_hours() as f64);
        info!(
            building_id = %scoped.building_id,
            forecast_id = %scoped.id,
            recommendations = recommendations.len(),
            total_savings = savings.total,
            "optimization completed"
        );
        Ok(OptimizationResult {
            building_id: scoped.building_id.clone(),
            forecast_id: scoped.id,
            currency: self.config.tariff.currency.clone(),
            recommendations,
            savings,
            generated_at: self.clock.now(),
        })
    }

    /// Fetch history for the trailing window and run the forecast engine.
    async fn produce_energy_forecast(
        &self,
        building_id: &BuildingId,
        horizon: Horizon,
        deadline: &Deadline,
    ) -> DomainResult<ForecastResult> {
        let retry = &self.config.retry;
        let store = &self.store;

        let building = with_retry(retry, "get_building", move || store.get_building(building_id)).await?;

        let now = self.clock.now();
        let range = TimeRange::trailing_days(floor_to_hour(now), self.config.history_days)?;
        let history = with_retry(retry, "get_measurements", move || store.get_measurements(building_id, range)).await?;
        deadline.check()?;
        info!(
            building_id = %building.id,
            observations = history.observation_count(),
            from = %range.start,
            to = %range.end,
            "history fetched"
        );

        // CPU-bound; the deadline timer must stay live while it runs.
        let engine = Arc::clone(&self.forecasts);
        let mut forecast = tokio::task::spawn_blocking(move || {
            engine.predict_until(&history, horizon, ForecastType::EnergyDemand, range)
        })
        .await
        .map_err(|e| DomainError::model_unavailable(format!("inference task failed: {e}")))??;
        deadline.check()?;
        forecast.generated_at = now;
        Ok(forecast)
    }

    async fn persist(&self, forecast: &ForecastResult, deadline: &Deadline) -> DomainResult<()> {
        deadline.check()?;
        let store = &self.store;
        let ack = with_retry(&self.config.retry, "create_forecast", move || store.create_forecast(forecast)).await?;
        info!(forecast_id = %ack.id, stored_at = %ack.stored_at, "forecast persisted");
        Ok(())
    }

    /// Stored forecast by id.
    pub async fn get_forecast(&self, requested_by: &str, id: ForecastId) -> DomainResult<ForecastResult> {
        let store = &self.store;
        let forecast = with_retry(&self.config.retry, "get_forecast", move || store.get_forecast(id)).await?;
        self.authorize(requested_by, &forecast.building_id, &Permission::FORECAST_READ)?;
        Ok(forecast)
    }

    /// Most recent stored forecast for a building, horizon and type.
    pub async fn get_latest_forecast(
        &self,
        requested_by: &str,
        building_id: &BuildingId,
        horizon: Horizon,
        forecast_type: ForecastType,
    ) -> DomainResult<ForecastResult> {
        self.authorize(requested_by, building_id, &Permission::FORECAST_READ)?;
        let store = &self.store;
        with_retry(&self.config.retry, "get_latest_forecast", move || {
            store.get_latest_forecast(building_id, horizon, forecast_type)
        })
        .await?
        .ok_or_else(|| DomainError::not_found(format!("no {horizon} {forecast_type} forecast for building {building_id}")))
    }

    pub fn register_model(
        &self,
        requested_by: &str,
        metadata: ModelMetadata,
        artifact: ModelArtifact,
    ) -> DomainResult<ModelMetadata> {
        self.authorize(requested_by, &metadata.building_id, &Permission::MODELS_MANAGE)?;
        let id = self.models.register_model(metadata, artifact)?;
        self.models.metadata(id)
    }

    pub fn promote_model(&self, requested_by: &str, id: ModelId) -> DomainResult<ModelMetadata> {
        let metadata = self.models.metadata(id)?;
        self.authorize(requested_by, &metadata.building_id, &Permission::MODELS_MANAGE)?;
        self.models.promote(id)
    }

    pub fn retire_model(&self, requested_by: &str, id: ModelId) -> DomainResult<ModelMetadata> {
        let metadata = self.models.metadata(id)?;
        self.authorize(requested_by, &metadata.building_id, &Permission::MODELS_MANAGE)?;
        self.models.retire(id)
    }

    /// Record fresh accuracy figures; returns the model's effective performance.
    pub fn record_performance(
        &self,
        requested_by: &str,
        id: ModelId,
        metrics: PerformanceMetrics,
    ) -> DomainResult<PerformanceMetrics> {
        let metadata = self.models.metadata(id)?;
        self.authorize(requested_by, &metadata.building_id, &Permission::MODELS_MANAGE)?;
        self.models.record_performance(id, metrics)
    }

    pub fn list_models(&self, requested_by: &str, building_id: &BuildingId) -> DomainResult<Vec<ModelMetadata>> {
        self.authorize(requested_by, building_id, &Permission::MODELS_READ)?;
        self.models.list_models(building_id)
    }

    pub fn performance_report(
        &self,
        requested_by: &str,
        building_id: &BuildingId,
        algorithm: Algorithm,
    ) -> DomainResult<PerformanceReport> {
        self.authorize(requested_by, building_id, &Permission::MODELS_READ)?;
        self.models.performance_report(building_id, algorithm)
    }

    pub fn health_details(&self) -> HealthDetails {
        let uptime_secs = self.started.elapsed().as_secs();
        let version = env!("CARGO_PKG_VERSION").to_string();
        match self.models.counts() {
            Ok(counts) => HealthDetails {
                status: "ok".to_string(),
                version,
                uptime_secs,
                models_registered: counts.registered,
                models_active: counts.active,
            },
            Err(e) => {
                warn!(error = %e, "model registry unavailable for health check");
                HealthDetails {
                    status: "degraded".to_string(),
                    version,
                    uptime_secs,
                    models_registered: 0,
                    models_active: 0,
                }
            }
        }
    }
}
