//! Forecast requests and results.

use core::str::FromStr;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{BuildingId, ForecastId, ModelId};
use crate::model::Algorithm;
use crate::series::Granularity;
use crate::tariff::TariffSchedule;
use crate::value_object::ValueObject;

/// Requested forecast length. Closed set.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Horizon {
    #[serde(rename = "24H")]
    Day,
    #[serde(rename = "7D")]
    Week,
}

impl Horizon {
    pub const ALL: [Horizon; 2] = [Horizon::Day, Horizon::Week];

    pub fn hours(self) -> i64 {
        match self {
            Horizon::Day => 24,
            Horizon::Week => 24 * 7,
        }
    }

    /// Number of predicted steps implied by this horizon at `granularity`.
    pub fn steps(self, granularity: Granularity) -> usize {
        (self.hours() * 60 / granularity.minutes()) as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Horizon::Day => "24H",
            Horizon::Week => "7D",
        }
    }
}

impl core::fmt::Display for Horizon {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Horizon {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "24H" => Ok(Horizon::Day),
            "7D" => Ok(Horizon::Week),
            other => Err(DomainError::validation(format!(
                "horizon must be one of: 24H, 7D (got '{other}')"
            ))),
        }
    }
}

/// What the predicted series measures. Closed set.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastType {
    /// Energy consumption per step (kWh).
    #[default]
    EnergyDemand,
    /// Energy cost per step, priced against the tariff schedule.
    Cost,
}

impl ForecastType {
    pub fn as_str(self) -> &'static str {
        match self {
            ForecastType::EnergyDemand => "energy_demand",
            ForecastType::Cost => "cost",
        }
    }
}

impl core::fmt::Display for ForecastType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForecastType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "energy_demand" => Ok(ForecastType::EnergyDemand),
            "cost" => Ok(ForecastType::Cost),
            other => Err(DomainError::validation(format!(
                "forecast_type must be one of: energy_demand, cost (got '{other}')"
            ))),
        }
    }
}

/// Request to forecast one building. Trusted once it reaches the engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub building_id: BuildingId,
    pub horizon: Horizon,
    #[serde(default)]
    pub forecast_type: ForecastType,
    pub requested_by: String,
    /// Also compute load-shifting recommendations for the forecast.
    #[serde(default)]
    pub optimize: bool,
}

impl ForecastRequest {
    pub fn new(building_id: BuildingId, horizon: Horizon, requested_by: impl Into<String>) -> Self {
        Self {
            building_id,
            horizon,
            forecast_type: ForecastType::default(),
            requested_by: requested_by.into(),
            optimize: false,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.requested_by.trim().is_empty() {
            return Err(DomainError::validation("requested_by must not be empty"));
        }
        Ok(())
    }
}

/// One predicted step with its uncertainty band.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl ValueObject for PredictedPoint {}

impl PredictedPoint {
    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }
}

/// How much of the input series had to be imputed before inference.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImputationReport {
    /// Grid slots filled by interpolation or edge filling.
    pub imputed_points: usize,
    /// Grid slots in the normalized series.
    pub total_points: usize,
}

impl ImputationReport {
    pub fn was_imputed(&self) -> bool {
        self.imputed_points > 0
    }

    pub fn fraction(&self) -> f64 {
        if self.total_points == 0 {
            return 0.0;
        }
        self.imputed_points as f64 / self.total_points as f64
    }
}

/// Immutable forecast produced for a single request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub id: ForecastId,
    pub building_id: BuildingId,
    pub horizon: Horizon,
    pub forecast_type: ForecastType,
    pub granularity: Granularity,
    pub generated_at: DateTime<Utc>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub predicted_series: Vec<PredictedPoint>,
    pub model_id: ModelId,
    pub model_version: String,
    pub algorithm: Algorithm,
    pub imputation: ImputationReport,
    /// Non-fatal quality findings (outliers, degraded model accuracy).
    #[serde(default)]
    pub quality_warnings: Vec<String>,
}

impl ForecastResult {
    pub fn len(&self) -> usize {
        self.predicted_series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicted_series.is_empty()
    }

    /// Hours covered by the predicted series.
    pub fn covered_hours(&self) -> i64 {
        self.predicted_series.len() as i64 * self.granularity.minutes() / 60
    }

    /// Copy of this forecast restricted to its first `hours` hours.
    ///
    /// Used to scope optimization to a requested window; the id and model
    /// provenance are preserved because the values are unchanged.
    pub fn truncated(&self, hours: i64) -> ForecastResult {
        let keep = (hours.max(0) * 60 / self.granularity.minutes()) as usize;
        let mut out = self.clone();
        out.predicted_series.truncate(keep);
        if let Some(last) = out.predicted_series.last() {
            out.valid_to = last.timestamp + self.granularity.step();
        }
        out
    }

    /// Price every step (value and bounds) against `tariff`.
    pub fn priced(&self, tariff: &TariffSchedule) -> DomainResult<ForecastResult> {
        tariff.validate()?;
        let mut out = self.clone();
        out.forecast_type = ForecastType::Cost;
        for p in &mut out.predicted_series {
            let price = tariff.price_at(p.hour())?;
            p.value *= price;
            p.lower_bound *= price;
            p.upper_bound *= price;
        }
        Ok(out)
    }
}

/// Validity window for a predicted series: first step through one step past the last.
pub fn validity_window(
    series: &[PredictedPoint],
    granularity: Granularity,
    fallback: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    match (series.first(), series.last()) {
        (Some(first), Some(last)) => (first.timestamp, last.timestamp + granularity.step()),
        _ => (fallback, fallback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizon_step_counts_follow_granularity() {
        assert_eq!(Horizon::Day.steps(Granularity::Hourly), 24);
        assert_eq!(Horizon::Week.steps(Granularity::Hourly), 168);
        assert_eq!(Horizon::Day.steps(Granularity::FifteenMinutes), 96);
    }

    #[test]
    fn horizon_and_type_parse_only_closed_values() {
        assert_eq!("24H".parse::<Horizon>().unwrap(), Horizon::Day);
        assert_eq!("7D".parse::<Horizon>().unwrap(), Horizon::Week);
        assert!(matches!("1H".parse::<Horizon>(), Err(DomainError::Validation(_))));
        assert_eq!("cost".parse::<ForecastType>().unwrap(), ForecastType::Cost);
        assert!("price".parse::<ForecastType>().is_err());
    }

    #[test]
    fn horizon_serializes_to_wire_names() {
        assert_eq!(serde_json::to_string(&Horizon::Day).unwrap(), "\"24H\"");
        let h: Horizon = serde_json::from_str("\"7D\"").unwrap();
        assert_eq!(h, Horizon::Week);
        assert!(serde_json::from_str::<Horizon>("\"2D\"").is_err());
    }

    #[test]
    fn imputation_fraction_handles_empty_series() {
        assert_eq!(ImputationReport::default().fraction(), 0.0);
        let r = ImputationReport {
            imputed_points: 6,
            total_points: 24,
        };
        assert!(r.was_imputed());
        assert!((r.fraction() - 0.25).abs() < 1e-12);
    }
}
