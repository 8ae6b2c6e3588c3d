//! Optimization requests, recommendations and savings summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{BuildingId, ForecastId};
use crate::value_object::ValueObject;

/// Largest optimization window accepted (one week of hourly steps).
pub const MAX_TIME_RANGE_HOURS: u32 = 168;

fn default_time_range_hours() -> u32 {
    24
}

/// Half-open wall-clock window `[start, end)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ValueObject for TimeWindow {}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

/// What a recommendation asks the building operator to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecommendationAction {
    /// Move `shift_kwh` of consumption from one tariff block into a cheaper one.
    LoadShift {
        shift_kwh: f64,
        source_band: String,
        target_band: String,
        source_window: TimeWindow,
        target_window: TimeWindow,
        source_price: f64,
        target_price: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: RecommendationAction,
    pub description: String,
    /// Currency units saved against the baseline cost; always >= 0.
    pub estimated_savings: f64,
    /// Savings as a percentage of the baseline cost of the whole window.
    pub estimated_savings_pct: f64,
    pub applicable_window: TimeWindow,
}

impl Recommendation {
    pub fn shift_kwh(&self) -> f64 {
        match &self.action {
            RecommendationAction::LoadShift { shift_kwh, .. } => *shift_kwh,
        }
    }
}

/// Request for load-shifting recommendations over the next `time_range_hours`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationRequest {
    pub building_id: BuildingId,
    pub requested_by: String,
    #[serde(default = "default_time_range_hours")]
    pub time_range_hours: u32,
}

impl OptimizationRequest {
    pub fn new(building_id: BuildingId, requested_by: impl Into<String>) -> Self {
        Self {
            building_id,
            requested_by: requested_by.into(),
            time_range_hours: default_time_range_hours(),
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.requested_by.trim().is_empty() {
            return Err(DomainError::validation("requested_by must not be empty"));
        }
        if self.time_range_hours == 0 || self.time_range_hours > MAX_TIME_RANGE_HOURS {
            return Err(DomainError::validation(format!(
                "time_range_hours must be within 1..={MAX_TIME_RANGE_HOURS} (got {})",
                self.time_range_hours
            )));
        }
        Ok(())
    }
}

/// Aggregated savings across a set of recommendations.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SavingsSummary {
    /// Sum over the optimized window.
    pub total: f64,
    /// `total` scaled to a 24-hour day.
    pub daily: f64,
    pub monthly: f64,
    pub annual: f64,
}

impl ValueObject for SavingsSummary {}

impl SavingsSummary {
    /// Project `total`, observed over `window_hours`, to day/month/year figures.
    pub fn project(total: f64, window_hours: f64) -> Self {
        let daily = if window_hours > 0.0 {
            total * 24.0 / window_hours
        } else {
            0.0
        };
        Self {
            total,
            daily,
            monthly: daily * 30.0,
            annual: daily * 365.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub building_id: BuildingId,
    pub forecast_id: ForecastId,
    pub currency: String,
    pub recommendations: Vec<Recommendation>,
    pub savings: SavingsSummary,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_range_defaults_to_a_day_and_is_bounded() {
        let req: OptimizationRequest =
            serde_json::from_str(r#"{"building_id":"B001","requested_by":"ops"}"#).unwrap();
        assert_eq!(req.time_range_hours, 24);
        req.validate().unwrap();

        let mut too_long = req.clone();
        too_long.time_range_hours = 169;
        assert!(matches!(too_long.validate(), Err(DomainError::Validation(_))));

        let mut zero = req;
        zero.time_range_hours = 0;
        assert!(zero.validate().is_err());
    }

    #[test]
    fn savings_projection_scales_from_window() {
        let s = SavingsSummary::project(6.0, 12.0);
        assert!((s.daily - 12.0).abs() < 1e-12);
        assert!((s.monthly - 360.0).abs() < 1e-9);
        assert!((s.annual - 4380.0).abs() < 1e-9);
        assert_eq!(SavingsSummary::project(5.0, 0.0).daily, 0.0);
    }

    #[test]
    fn load_shift_action_is_tagged() {
        let w = TimeWindow::new(Utc::now(), Utc::now());
        let action = RecommendationAction::LoadShift {
            shift_kwh: 10.0,
            source_band: "peak".into(),
            target_band: "off_peak".into(),
            source_window: w,
            target_window: w,
            source_price: 1.05,
            target_price: 0.45,
        };
        let v = serde_json::to_value(&action).unwrap();
        assert_eq!(v["type"], "load_shift");
        assert_eq!(v["shift_kwh"], 10.0);
    }
}
