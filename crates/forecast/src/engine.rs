//! Forecast engine: history → predicted series with uncertainty.
//!
//! ## Pipeline
//!
//! ```text
//! MeasurementSeries
//!   → minimum-observation check (per horizon)
//!   → impute onto the grid (bounded imputed share)
//!   → AlgorithmPolicy::select(horizon)
//!   → ModelManager::get_active_model(building, algorithm)
//!   → normalize → ModelArtifact::predict → denormalize, clamp at 0
//!   → bounds: value ± z · rmse · sqrt(1 + growth · k)
//!   → quality warnings
//!   → ForecastResult
//! ```
//!
//! The engine is synchronous and holds no mutable state; concurrent calls
//! share the registry and the `Arc`ed artifacts.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use wattcast_core::{
    DomainError, DomainResult, ForecastId, ForecastResult, ForecastType, Horizon, MeasurementSeries, PredictedPoint,
    TariffSchedule, TimeRange, validity_window,
};
use wattcast_models::{InferenceInput, ModelHandle, ModelHealth, ModelManager};

use crate::policy::{AlgorithmPolicy, HorizonPolicy};
use crate::preprocess::{RegularSeries, impute};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Finite readings required before a 24H forecast.
    pub min_observations_day: usize,
    /// Finite readings required before a 7D forecast.
    pub min_observations_week: usize,
    /// Largest share of grid slots that may be imputed.
    pub max_imputed_fraction: f64,
    pub policy: HorizonPolicy,
    /// Confidence multiplier for the uncertainty band.
    pub z: f64,
    /// Per-step widening of the uncertainty band.
    pub growth: f64,
    /// Predicted values above `outlier_factor` × series mean are flagged.
    pub outlier_factor: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_observations_day: 168,
            min_observations_week: 336,
            max_imputed_fraction: 0.25,
            policy: HorizonPolicy::default(),
            z: 1.96,
            growth: 0.05,
            outlier_factor: 5.0,
        }
    }
}

impl EngineConfig {
    pub fn min_observations(&self, horizon: Horizon) -> usize {
        match horizon {
            Horizon::Day => self.min_observations_day,
            Horizon::Week => self.min_observations_week,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if !(0.0..=1.0).contains(&self.max_imputed_fraction) {
            return Err(DomainError::validation("max_imputed_fraction must be within 0..=1"));
        }
        if !(self.z.is_finite() && self.z >= 0.0) || !(self.growth.is_finite() && self.growth >= 0.0) {
            return Err(DomainError::validation("z and growth must be finite and >= 0"));
        }
        if !(self.outlier_factor.is_finite() && self.outlier_factor > 0.0) {
            return Err(DomainError::validation("outlier_factor must be > 0"));
        }
        Ok(())
    }
}

pub struct ForecastEngine {
    models: Arc<ModelManager>,
    config: EngineConfig,
    policy: Arc<dyn AlgorithmPolicy>,
    tariff: TariffSchedule,
}

impl core::fmt::Debug for ForecastEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ForecastEngine").field("config", &self.config).finish_non_exhaustive()
    }
}

impl ForecastEngine {
    pub fn new(models: Arc<ModelManager>, config: EngineConfig) -> Self {
        let policy: Arc<dyn AlgorithmPolicy> = Arc::new(config.policy);
        Self {
            models,
            config,
            policy,
            tariff: TariffSchedule::reference(),
        }
    }

    /// Replace the configured horizon table with a custom policy.
    pub fn with_policy(mut self, policy: Arc<dyn AlgorithmPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Tariff used for `ForecastType::Cost` forecasts.
    pub fn with_tariff(mut self, tariff: TariffSchedule) -> Self {
        self.tariff = tariff;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn models(&self) -> &Arc<ModelManager> {
        &self.models
    }

    /// Forecast `horizon` steps following the last reading of `series`.
    pub fn predict(
        &self,
        series: &MeasurementSeries,
        horizon: Horizon,
        forecast_type: ForecastType,
    ) -> DomainResult<ForecastResult> {
        self.run(series, horizon, forecast_type, None)
    }

    /// Forecast `horizon` steps starting at `range.end`.
    ///
    /// Readings are placed on the grid from the first reading up to
    /// `range.end`; a feed that stopped early is forward-filled.
    pub fn predict_until(
        &self,
        series: &MeasurementSeries,
        horizon: Horizon,
        forecast_type: ForecastType,
        range: TimeRange,
    ) -> DomainResult<ForecastResult> {
        self.run(series, horizon, forecast_type, Some(range))
    }

    fn run(
        &self,
        series: &MeasurementSeries,
        horizon: Horizon,
        forecast_type: ForecastType,
        range: Option<TimeRange>,
    ) -> DomainResult<ForecastResult> {
        let required = self.config.min_observations(horizon);
        let observed = series.observation_count();
        if observed < required {
            return Err(DomainError::insufficient_history(format!(
                "{horizon} forecast for building {} needs {required} observations, got {observed}",
                series.building_id
            )));
        }

        let bounds = match range {
            Some(r) => {
                let first = series
                    .points
                    .iter()
                    .filter(|p| p.value.is_finite() && r.contains(p.timestamp))
                    .map(|p| p.timestamp)
                    .min()
                    .unwrap_or(r.start);
                Some(TimeRange::new(first, r.end)?)
            }
            None => None,
        };
        let grid = impute(series, bounds)?;
        if grid.report.fraction() > self.config.max_imputed_fraction {
            return Err(DomainError::insufficient_history(format!(
                "{} of {} slots would be imputed for building {} (limit {:.0}%)",
                grid.report.imputed_points,
                grid.report.total_points,
                series.building_id,
                self.config.max_imputed_fraction * 100.0
            )));
        }

        let algorithm = self.policy.select(horizon);
        let handle = self.models.get_active_model(&series.building_id, algorithm)?;
        debug!(
            building_id = %series.building_id,
            horizon = %horizon,
            algorithm = %algorithm,
            model_version = %handle.version(),
            grid_points = grid.values.len(),
            imputed = grid.report.imputed_points,
            "running inference"
        );

        let forecast = self.infer(series, horizon, &grid, &handle)?;
        match forecast_type {
            ForecastType::EnergyDemand => Ok(forecast),
            ForecastType::Cost => forecast.priced(&self.tariff),
        }
    }

    fn infer(
        &self,
        series: &MeasurementSeries,
        horizon: Horizon,
        grid: &RegularSeries,
        handle: &ModelHandle,
    ) -> DomainResult<ForecastResult> {
        let stats = handle.metadata.normalization;
        let normalized: Vec<f64> = grid.values.iter().map(|v| stats.normalize(*v)).collect();
        let steps = horizon.steps(grid.granularity);
        let first_step = grid.end();

        let raw = handle.artifact.predict(&InferenceInput {
            history: &normalized,
            first_step,
            granularity: grid.granularity,
            steps,
        })?;
        if raw.len() != steps {
            return Err(DomainError::model_unavailable(format!(
                "model {} returned {} steps, expected {steps}",
                handle.model_id(),
                raw.len()
            )));
        }

        let rmse = handle.metadata.performance.rmse;
        let mut clamped = 0usize;
        let predicted_series: Vec<PredictedPoint> = raw
            .iter()
            .enumerate()
            .map(|(k, z)| {
                let denorm = stats.denormalize(*z);
                if denorm < 0.0 {
                    clamped += 1;
                }
                let value = denorm.max(0.0);
                let half = self.config.z * rmse * (1.0 + self.config.growth * k as f64).sqrt();
                PredictedPoint {
                    timestamp: first_step + grid.granularity.step() * k as i32,
                    value,
                    lower_bound: (value - half).max(0.0),
                    upper_bound: value + half,
                }
            })
            .collect();

        let quality_warnings = self.quality_warnings(&predicted_series, clamped, handle);
        for w in &quality_warnings {
            warn!(building_id = %series.building_id, model_version = %handle.version(), warning = %w, "forecast quality warning");
        }

        let generated_at = Utc::now();
        let (valid_from, valid_to) = validity_window(&predicted_series, grid.granularity, first_step);
        Ok(ForecastResult {
            id: ForecastId::new(),
            building_id: series.building_id.clone(),
            horizon,
            forecast_type: ForecastType::EnergyDemand,
            granularity: grid.granularity,
            generated_at,
            valid_from,
            valid_to,
            predicted_series,
            model_id: handle.model_id(),
            model_version: handle.version().to_string(),
            algorithm: handle.algorithm(),
            imputation: grid.report,
            quality_warnings,
        })
    }

    /// Findings that never alter the result.
    fn quality_warnings(&self, series: &[PredictedPoint], clamped: usize, handle: &ModelHandle) -> Vec<String> {
        let mut out = Vec::new();
        if clamped > 0 {
            out.push(format!("{clamped} negative predicted value(s) clamped to zero"));
        }

        let mean = series.iter().map(|p| p.value).sum::<f64>() / series.len().max(1) as f64;
        let limit = self.config.outlier_factor * mean;
        let outliers = series.iter().filter(|p| mean > 0.0 && p.value > limit).count();
        if outliers > 0 {
            out.push(format!(
                "{outliers} predicted value(s) exceed {}x the forecast mean ({mean:.2})",
                self.config.outlier_factor
            ));
        }

        let health = self.models.config().health_of(&handle.metadata, &handle.metadata.performance);
        if health == ModelHealth::NeedsRetraining {
            out.push(format!(
                "model {} RMSE {:.2} exceeds the health threshold; retraining advised",
                handle.version(),
                handle.metadata.performance.rmse
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone};
    use proptest::prelude::*;

    use super::*;
    use wattcast_core::{
        Algorithm, BuildingId, Granularity, MeasurementPoint, ModelId, ModelMetadata, ModelStatus,
        NormalizationStats, PerformanceMetrics,
    };
    use wattcast_models::{ManagerConfig, ModelArtifact};

    fn b001() -> BuildingId {
        BuildingId::parse("B001").unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    /// Office-like profile: 60 kWh at night, 140 kWh during working hours.
    fn history(days: i64, granularity: Granularity) -> MeasurementSeries {
        let per_day = granularity.steps_per_day() as i64;
        let points = (0..days * per_day)
            .map(|i| {
                let ts = t0() + Duration::minutes(i * granularity.minutes());
                let hour = (i % per_day) * 24 / per_day;
                let v = if (8..18).contains(&hour) { 140.0 } else { 60.0 };
                MeasurementPoint::new(ts, v)
            })
            .collect();
        MeasurementSeries::new(b001(), granularity, points)
    }

    fn manager_with_active(rmse: f64) -> Arc<ModelManager> {
        let m = Arc::new(ModelManager::new(ManagerConfig::default()));
        for algorithm in Algorithm::ALL {
            let id = m
                .register_model(
                    ModelMetadata {
                        model_id: ModelId::new(),
                        building_id: b001(),
                        algorithm,
                        version: format!("{algorithm}-v3"),
                        trained_at: t0(),
                        training_samples: 720,
                        normalization: NormalizationStats {
                            mean: 93.0,
                            std_dev: 39.0,
                        },
                        performance: PerformanceMetrics { mae: rmse * 0.8, rmse },
                        status: ModelStatus::Retired,
                    },
                    ModelArtifact::baseline(algorithm),
                )
                .unwrap();
            m.promote(id).unwrap();
        }
        m
    }

    fn engine() -> ForecastEngine {
        ForecastEngine::new(manager_with_active(6.0), EngineConfig::default())
    }

    #[test]
    fn day_ahead_uses_the_sequence_model() {
        let r = engine()
            .predict(&history(30, Granularity::Hourly), Horizon::Day, ForecastType::EnergyDemand)
            .unwrap();
        assert_eq!(r.len(), 24);
        assert_eq!(r.algorithm, Algorithm::Lstm);
        assert_eq!(r.model_version, "LSTM-v3");
        assert_eq!(r.valid_from, t0() + Duration::days(30));
        assert_eq!(r.valid_to, t0() + Duration::days(31));
        assert!(r.quality_warnings.is_empty(), "{:?}", r.quality_warnings);
        // Working hours stay busier than the night.
        assert!(r.predicted_series[12].value > r.predicted_series[3].value);
    }

    #[test]
    fn week_ahead_uses_gradient_boosting() {
        let r = engine()
            .predict(&history(30, Granularity::Hourly), Horizon::Week, ForecastType::EnergyDemand)
            .unwrap();
        assert_eq!(r.len(), 168);
        assert_eq!(r.algorithm, Algorithm::GradientBoosted);
    }

    #[test]
    fn fifteen_minute_series_yield_96_steps_per_day() {
        let r = engine()
            .predict(&history(8, Granularity::FifteenMinutes), Horizon::Day, ForecastType::EnergyDemand)
            .unwrap();
        assert_eq!(r.len(), 96);
        assert_eq!(r.granularity, Granularity::FifteenMinutes);
    }

    #[test]
    fn short_history_is_rejected() {
        let err = engine()
            .predict(&history(3, Granularity::Hourly), Horizon::Day, ForecastType::EnergyDemand)
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientHistory(_)));

        // 10 days satisfies 24H (168) but not 7D (336).
        let ten_days = history(10, Granularity::Hourly);
        assert!(engine().predict(&ten_days, Horizon::Day, ForecastType::EnergyDemand).is_ok());
        assert!(matches!(
            engine().predict(&ten_days, Horizon::Week, ForecastType::EnergyDemand),
            Err(DomainError::InsufficientHistory(_))
        ));
    }

    #[test]
    fn sparse_history_exceeding_the_imputation_cap_is_rejected() {
        let mut s = history(30, Granularity::Hourly);
        // Keep every other reading: half of the grid would be imputed.
        s.points = s.points.into_iter().step_by(2).collect();
        let err = engine().predict(&s, Horizon::Day, ForecastType::EnergyDemand).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientHistory(ref m) if m.contains("imputed")));
    }

    #[test]
    fn trailing_gap_is_forward_filled_up_to_the_range_end() {
        let s = history(30, Granularity::Hourly);
        let end = t0() + Duration::days(30) + Duration::hours(3);
        let range = TimeRange::trailing_days(end, 30).unwrap();
        let r = engine()
            .predict_until(&s, Horizon::Day, ForecastType::EnergyDemand, range)
            .unwrap();
        assert_eq!(r.imputation.imputed_points, 3);
        assert_eq!(r.valid_from, end);
    }

    #[test]
    fn missing_model_is_model_unavailable() {
        let e = ForecastEngine::new(Arc::new(ModelManager::new(ManagerConfig::default())), EngineConfig::default());
        let err = e
            .predict(&history(30, Granularity::Hourly), Horizon::Day, ForecastType::EnergyDemand)
            .unwrap_err();
        assert!(matches!(err, DomainError::ModelUnavailable(_)));
    }

    #[test]
    fn bounds_widen_with_the_horizon() {
        let r = engine()
            .predict(&history(30, Granularity::Hourly), Horizon::Week, ForecastType::EnergyDemand)
            .unwrap();
        let width = |p: &PredictedPoint| p.upper_bound - p.value;
        assert!((width(&r.predicted_series[0]) - 1.96 * 6.0).abs() < 1e-9);
        assert!(width(&r.predicted_series[167]) > width(&r.predicted_series[0]));
        assert!(r.predicted_series.iter().all(|p| p.lower_bound >= 0.0 && p.lower_bound <= p.value));
    }

    #[test]
    fn degraded_model_is_flagged_without_changing_values() {
        let healthy = engine()
            .predict(&history(30, Granularity::Hourly), Horizon::Day, ForecastType::EnergyDemand)
            .unwrap();
        let degraded = ForecastEngine::new(manager_with_active(40.0), EngineConfig::default())
            .predict(&history(30, Granularity::Hourly), Horizon::Day, ForecastType::EnergyDemand)
            .unwrap();
        assert!(degraded.quality_warnings.iter().any(|w| w.contains("retraining")));
        let values = |r: &ForecastResult| r.predicted_series.iter().map(|p| p.value).collect::<Vec<_>>();
        assert_eq!(values(&healthy), values(&degraded));
    }

    #[test]
    fn cost_forecast_is_priced_with_the_tariff() {
        let e = engine();
        let s = history(30, Granularity::Hourly);
        let energy = e.predict(&s, Horizon::Day, ForecastType::EnergyDemand).unwrap();
        let cost = e.predict(&s, Horizon::Day, ForecastType::Cost).unwrap();
        assert_eq!(cost.forecast_type, ForecastType::Cost);
        let tariff = TariffSchedule::reference();
        for (c, en) in cost.predicted_series.iter().zip(&energy.predicted_series) {
            let price = tariff.price_at(en.hour()).unwrap();
            assert!((c.value - en.value * price).abs() < 1e-9);
        }
    }

    #[test]
    fn custom_policy_overrides_the_table() {
        struct AlwaysBoosted;
        impl AlgorithmPolicy for AlwaysBoosted {
            fn select(&self, _: Horizon) -> Algorithm {
                Algorithm::GradientBoosted
            }
        }
        let r = engine()
            .with_policy(Arc::new(AlwaysBoosted))
            .predict(&history(30, Granularity::Hourly), Horizon::Day, ForecastType::EnergyDemand)
            .unwrap();
        assert_eq!(r.algorithm, Algorithm::GradientBoosted);
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]

        #[test]
        fn predictions_are_deterministic_and_sized(days in 14i64..40, hourly in any::<bool>(), week in any::<bool>()) {
            let granularity = if hourly { Granularity::Hourly } else { Granularity::FifteenMinutes };
            let horizon = if week { Horizon::Week } else { Horizon::Day };
            let s = history(days, granularity);
            let e = engine();
            let a = e.predict(&s, horizon, ForecastType::EnergyDemand).unwrap();
            let b = e.predict(&s, horizon, ForecastType::EnergyDemand).unwrap();
            prop_assert_eq!(a.len(), horizon.steps(granularity));
            prop_assert_eq!(&a.predicted_series, &b.predicted_series);
            prop_assert!(a.predicted_series.iter().all(|p| p.value >= 0.0));
        }
    }
}
