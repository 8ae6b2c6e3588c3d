//! Model metadata tracked by the model manager.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{BuildingId, ModelId};
use crate::value_object::ValueObject;

/// Forecasting algorithm family. Closed set; each variant has one artifact shape.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Algorithm {
    /// Sequence model; captures intraday cycles, preferred for short horizons.
    #[serde(rename = "LSTM")]
    Lstm,
    /// Regression-tree ensemble; steadier over long, noisy ranges.
    #[serde(rename = "GradientBoosted")]
    GradientBoosted,
}

impl Algorithm {
    pub const ALL: [Algorithm; 2] = [Algorithm::Lstm, Algorithm::GradientBoosted];

    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Lstm => "LSTM",
            Algorithm::GradientBoosted => "GradientBoosted",
        }
    }
}

impl core::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LSTM" | "lstm" => Ok(Algorithm::Lstm),
            "GradientBoosted" | "gradient_boosted" => Ok(Algorithm::GradientBoosted),
            other => Err(DomainError::validation(format!(
                "algorithm must be one of: LSTM, GradientBoosted (got '{other}')"
            ))),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Active,
    Retired,
}

/// Accuracy of a model on held-out data, in the series' units (kWh per step).
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub mae: f64,
    pub rmse: f64,
}

impl ValueObject for PerformanceMetrics {}

impl PerformanceMetrics {
    pub fn new(mae: f64, rmse: f64) -> DomainResult<Self> {
        let m = Self { mae, rmse };
        m.validate()?;
        Ok(m)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if !(self.mae.is_finite() && self.mae >= 0.0) {
            return Err(DomainError::validation(format!("MAE must be finite and >= 0 (got {})", self.mae)));
        }
        if !(self.rmse.is_finite() && self.rmse >= 0.0) {
            return Err(DomainError::validation(format!("RMSE must be finite and >= 0 (got {})", self.rmse)));
        }
        Ok(())
    }
}

/// Input statistics captured at training time, used to (de)normalize during inference.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    pub mean: f64,
    pub std_dev: f64,
}

impl ValueObject for NormalizationStats {}

impl NormalizationStats {
    pub fn validate(&self) -> DomainResult<()> {
        if !self.mean.is_finite() {
            return Err(DomainError::validation("normalization mean must be finite"));
        }
        if !(self.std_dev.is_finite() && self.std_dev > 0.0) {
            return Err(DomainError::validation("normalization std_dev must be finite and > 0"));
        }
        Ok(())
    }

    pub fn normalize(&self, x: f64) -> f64 {
        (x - self.mean) / self.std_dev
    }

    pub fn denormalize(&self, z: f64) -> f64 {
        z * self.std_dev + self.mean
    }
}

/// Metadata of a trained model, produced by the external training process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_id: ModelId,
    pub building_id: BuildingId,
    pub algorithm: Algorithm,
    pub version: String,
    pub trained_at: DateTime<Utc>,
    #[serde(default)]
    pub training_samples: u64,
    pub normalization: NormalizationStats,
    pub performance: PerformanceMetrics,
    pub status: ModelStatus,
}

impl ModelMetadata {
    pub fn is_active(&self) -> bool {
        self.status == ModelStatus::Active
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.version.trim().is_empty() {
            return Err(DomainError::validation("model version must not be empty"));
        }
        self.normalization.validate()?;
        self.performance.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_wire_names() {
        assert_eq!(serde_json::to_string(&Algorithm::Lstm).unwrap(), "\"LSTM\"");
        assert_eq!("GradientBoosted".parse::<Algorithm>().unwrap(), Algorithm::GradientBoosted);
        assert!("XGBoost".parse::<Algorithm>().is_err());
    }

    #[test]
    fn metrics_reject_negative_and_non_finite_values() {
        assert!(PerformanceMetrics::new(1.0, 2.0).is_ok());
        assert!(PerformanceMetrics::new(-1.0, 2.0).is_err());
        assert!(PerformanceMetrics::new(1.0, f64::INFINITY).is_err());
    }

    #[test]
    fn normalization_round_trip_and_zero_std_rejected() {
        let s = NormalizationStats { mean: 50.0, std_dev: 10.0 };
        assert!((s.denormalize(s.normalize(73.0)) - 73.0).abs() < 1e-9);
        assert!(NormalizationStats { mean: 1.0, std_dev: 0.0 }.validate().is_err());
    }
}
