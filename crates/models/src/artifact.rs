//! Model artifacts and deterministic inference.
//!
//! Every artifact works in normalized space: the caller normalizes the
//! history with the model's training statistics, calls [`ModelArtifact::predict`]
//! and denormalizes the output. Artifacts never see raw kWh values.
//!
//! ```text
//! history (z-scores, oldest first) ──► ModelArtifact::predict ──► steps × z-score
//!                                           │
//!                      ┌────────────────────┴─────────────────────┐
//!                      ▼                                          ▼
//!             Sequence (LSTM family)                GradientBoosted (tree ensemble)
//!   level + daily profile + decaying residual     rolling mean + Σ tree(features)
//! ```

use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use wattcast_core::{Algorithm, DomainError, DomainResult, Granularity};

use crate::stats;

/// Inputs for a single inference call.
#[derive(Debug, Clone, Copy)]
pub struct InferenceInput<'a> {
    /// Normalized history on the regular grid, oldest first, ending one step
    /// before `first_step`.
    pub history: &'a [f64],
    /// Timestamp of the first predicted step.
    pub first_step: DateTime<Utc>,
    pub granularity: Granularity,
    pub steps: usize,
}

impl InferenceInput<'_> {
    fn step_at(&self, k: usize) -> DateTime<Utc> {
        self.first_step + self.granularity.step() * k as i32
    }

    /// Timestamp of `history[i]`.
    fn history_at(&self, i: usize) -> DateTime<Utc> {
        let back = (self.history.len() - i) as i64;
        self.first_step - Duration::minutes(back * self.granularity.minutes())
    }
}

fn slot_of(ts: DateTime<Utc>, granularity: Granularity) -> usize {
    ((ts.hour() as i64 * 60 + ts.minute() as i64) / granularity.minutes()) as usize
}

/// Trained artifact, tagged by algorithm family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Sequence(SequenceModel),
    GradientBoosted(GradientBoostedModel),
}

impl ModelArtifact {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            ModelArtifact::Sequence(_) => Algorithm::Lstm,
            ModelArtifact::GradientBoosted(_) => Algorithm::GradientBoosted,
        }
    }

    /// Structural checks run once at registration.
    pub fn validate(&self) -> DomainResult<()> {
        match self {
            ModelArtifact::Sequence(m) => m.validate(),
            ModelArtifact::GradientBoosted(m) => m.validate(),
        }
    }

    /// Predict `input.steps` normalized values.
    pub fn predict(&self, input: &InferenceInput<'_>) -> DomainResult<Vec<f64>> {
        if input.history.is_empty() {
            return Err(DomainError::insufficient_history("inference needs at least one observation"));
        }
        let out = match self {
            ModelArtifact::Sequence(m) => m.predict(input),
            ModelArtifact::GradientBoosted(m) => m.predict(input)?,
        };
        if let Some(k) = out.iter().position(|v| !v.is_finite()) {
            return Err(DomainError::model_unavailable(format!(
                "{} artifact produced a non-finite value at step {k}",
                self.algorithm()
            )));
        }
        Ok(out)
    }

    /// Untrained reference artifact for an algorithm family.
    ///
    /// Encodes the generic office-building shape (busier 08:00–18:00,
    /// quieter weekends). Used for development wiring and tests.
    pub fn baseline(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Lstm => ModelArtifact::Sequence(SequenceModel {
                lookback_days: 7,
                seasonal_weight: 1.0,
                residual_decay: 0.5,
            }),
            Algorithm::GradientBoosted => ModelArtifact::GradientBoosted(GradientBoostedModel {
                base_score: 0.0,
                learning_rate: 1.0,
                trees: vec![
                    RegressionTree {
                        nodes: vec![
                            TreeNode::Split {
                                feature: Feature::HourOfDay,
                                threshold: 8.0,
                                left: 1,
                                right: 2,
                            },
                            TreeNode::Leaf { value: -0.3 },
                            TreeNode::Split {
                                feature: Feature::HourOfDay,
                                threshold: 18.0,
                                left: 3,
                                right: 4,
                            },
                            TreeNode::Leaf { value: 0.3 },
                            TreeNode::Leaf { value: -0.3 },
                        ],
                    },
                    RegressionTree {
                        nodes: vec![
                            TreeNode::Split {
                                feature: Feature::IsWeekend,
                                threshold: 0.5,
                                left: 1,
                                right: 2,
                            },
                            TreeNode::Leaf { value: 0.05 },
                            TreeNode::Leaf { value: -0.15 },
                        ],
                    },
                ],
            }),
        }
    }
}

/// Recurrent sequence model distilled to its inference path.
///
/// Prediction for step k: `level + seasonal_weight · profile[slot] + residual · decay^(k+1)`
/// where `level` is the mean of the last day, `profile` the per-slot deviation
/// over the lookback window and `residual` the miss on the last observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceModel {
    pub lookback_days: usize,
    pub seasonal_weight: f64,
    pub residual_decay: f64,
}

impl SequenceModel {
    fn validate(&self) -> DomainResult<()> {
        if self.lookback_days == 0 {
            return Err(DomainError::validation("sequence model lookback_days must be >= 1"));
        }
        if !(self.seasonal_weight.is_finite() && (0.0..=2.0).contains(&self.seasonal_weight)) {
            return Err(DomainError::validation("sequence model seasonal_weight must be within 0..=2"));
        }
        if !(self.residual_decay.is_finite() && (0.0..1.0).contains(&self.residual_decay)) {
            return Err(DomainError::validation("sequence model residual_decay must be within 0..1"));
        }
        Ok(())
    }

    fn predict(&self, input: &InferenceInput<'_>) -> Vec<f64> {
        let history = input.history;
        let n = history.len();
        let spd = input.granularity.steps_per_day();

        let lookback = (self.lookback_days * spd).min(n);
        let window_start = n - lookback;
        let window = &history[window_start..];

        let mut sums = vec![0.0; spd];
        let mut counts = vec![0usize; spd];
        for (offset, v) in window.iter().enumerate() {
            let slot = slot_of(input.history_at(window_start + offset), input.granularity);
            sums[slot] += v;
            counts[slot] += 1;
        }
        let overall = stats::mean(window);
        let profile: Vec<f64> = sums
            .iter()
            .zip(&counts)
            .map(|(s, c)| if *c > 0 { s / *c as f64 - overall } else { 0.0 })
            .collect();

        let level = stats::mean(&history[n - spd.min(n)..]);
        let last_slot = slot_of(input.history_at(n - 1), input.granularity);
        let residual = history[n - 1] - (level + self.seasonal_weight * profile[last_slot]);

        let mut carry = residual;
        (0..input.steps)
            .map(|k| {
                carry *= self.residual_decay;
                let slot = slot_of(input.step_at(k), input.granularity);
                level + self.seasonal_weight * profile[slot] + carry
            })
            .collect()
    }
}

/// Input features available to regression trees.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Fractional hour of day (0.0..24.0).
    HourOfDay,
    /// Monday = 0 .. Sunday = 6.
    DayOfWeek,
    /// 1.0 on Saturday/Sunday, else 0.0.
    IsWeekend,
    /// Mean of the trailing day (observed or already predicted).
    RollingMean24h,
    /// Value one day before the step.
    Lag24h,
}

#[derive(Debug, Clone, Copy)]
struct FeatureRow {
    hour: f64,
    day_of_week: f64,
    weekend: f64,
    rolling_mean: f64,
    lag_day: f64,
}

impl FeatureRow {
    fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::HourOfDay => self.hour,
            Feature::DayOfWeek => self.day_of_week,
            Feature::IsWeekend => self.weekend,
            Feature::RollingMean24h => self.rolling_mean,
            Feature::Lag24h => self.lag_day,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum TreeNode {
    /// Go `left` when `feature < threshold`, else `right`.
    Split {
        feature: Feature,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// A single regression tree stored as a flat node array rooted at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Children must point forward; this makes every tree acyclic.
    fn validate(&self, tree: usize) -> DomainResult<()> {
        if self.nodes.is_empty() {
            return Err(DomainError::validation(format!("tree #{tree} has no nodes")));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    threshold, left, right, ..
                } => {
                    if !threshold.is_finite() {
                        return Err(DomainError::validation(format!(
                            "tree #{tree} node {i} has a non-finite threshold"
                        )));
                    }
                    for child in [*left, *right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(DomainError::validation(format!(
                                "tree #{tree} node {i} points to invalid child {child}"
                            )));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(DomainError::validation(format!(
                            "tree #{tree} leaf {i} has a non-finite value"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn eval(&self, row: &FeatureRow) -> DomainResult<f64> {
        let mut idx = 0;
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { value }) => return Ok(*value),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    idx = if row.get(*feature) < *threshold { *left } else { *right };
                }
                None => break,
            }
        }
        Err(DomainError::model_unavailable("regression tree is malformed"))
    }
}

/// Gradient-boosted regression trees fitted to the residual against the
/// trailing 24h mean. Multi-step forecasts are produced recursively: each
/// prediction feeds the rolling features of the next step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedModel {
    pub base_score: f64,
    pub learning_rate: f64,
    pub trees: Vec<RegressionTree>,
}

impl GradientBoostedModel {
    fn validate(&self) -> DomainResult<()> {
        if !self.base_score.is_finite() {
            return Err(DomainError::validation("gradient-boosted base_score must be finite"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(DomainError::validation("gradient-boosted learning_rate must be > 0"));
        }
        self.trees.iter().enumerate().try_for_each(|(i, t)| t.validate(i))
    }

    fn predict(&self, input: &InferenceInput<'_>) -> DomainResult<Vec<f64>> {
        let spd = input.granularity.steps_per_day();
        let mut buffer = input.history.to_vec();
        let mut out = Vec::with_capacity(input.steps);

        for k in 0..input.steps {
            let ts = input.step_at(k);
            let n = buffer.len();
            let rolling_mean = stats::mean(&buffer[n - spd.min(n)..]);
            let lag_day = if n >= spd { buffer[n - spd] } else { buffer[0] };
            let weekday = ts.weekday();
            let row = FeatureRow {
                hour: ts.hour() as f64 + ts.minute() as f64 / 60.0,
                day_of_week: weekday.num_days_from_monday() as f64,
                weekend: if matches!(weekday, Weekday::Sat | Weekday::Sun) { 1.0 } else { 0.0 },
                rolling_mean,
                lag_day,
            };

            let mut boost = 0.0;
            for tree in &self.trees {
                boost += tree.eval(&row)?;
            }
            let value = rolling_mean + self.base_score + self.learning_rate * boost;
            buffer.push(value);
            out.push(value);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn daily_cycle(days: usize) -> Vec<f64> {
        (0..days * 24)
            .map(|i| ((i % 24) as f64 / 24.0 * std::f64::consts::TAU).sin())
            .collect()
    }

    fn input(history: &[f64], steps: usize) -> InferenceInput<'_> {
        InferenceInput {
            history,
            // History starts at midnight, so the next step is midnight too.
            first_step: Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap(),
            granularity: Granularity::Hourly,
            steps,
        }
    }

    #[test]
    fn sequence_model_reproduces_a_clean_daily_cycle() {
        let history = daily_cycle(7);
        let out = ModelArtifact::baseline(Algorithm::Lstm)
            .predict(&input(&history, 24))
            .unwrap();
        assert_eq!(out.len(), 24);
        for (k, v) in out.iter().enumerate() {
            assert!((v - history[k]).abs() < 1e-6, "step {k}: {v} vs {}", history[k]);
        }
    }

    #[test]
    fn gradient_boosted_is_busier_during_working_hours() {
        let history = vec![0.0; 14 * 24];
        let out = ModelArtifact::baseline(Algorithm::GradientBoosted)
            .predict(&input(&history, 24))
            .unwrap();
        // 2024-03-11 is a Monday.
        assert!(out[12] > out[3]);
        assert!(out[12] > out[20]);
    }

    #[test]
    fn predictions_are_deterministic() {
        let history = daily_cycle(14);
        for algorithm in Algorithm::ALL {
            let a = ModelArtifact::baseline(algorithm);
            let first = a.predict(&input(&history, 168)).unwrap();
            let second = a.predict(&input(&history, 168)).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn backward_pointing_tree_is_rejected() {
        let artifact = ModelArtifact::GradientBoosted(GradientBoostedModel {
            base_score: 0.0,
            learning_rate: 0.1,
            trees: vec![RegressionTree {
                nodes: vec![
                    TreeNode::Leaf { value: 1.0 },
                    TreeNode::Split {
                        feature: Feature::HourOfDay,
                        threshold: 8.0,
                        left: 0,
                        right: 0,
                    },
                ],
            }],
        });
        assert!(matches!(artifact.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn baseline_artifacts_are_valid_and_tagged() {
        for algorithm in Algorithm::ALL {
            let a = ModelArtifact::baseline(algorithm);
            a.validate().unwrap();
            assert_eq!(a.algorithm(), algorithm);
        }
        let json = serde_json::to_value(ModelArtifact::baseline(Algorithm::Lstm)).unwrap();
        assert_eq!(json["kind"], "sequence");
    }

    #[test]
    fn empty_history_is_rejected() {
        let err = ModelArtifact::baseline(Algorithm::Lstm)
            .predict(&input(&[], 24))
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientHistory(_)));
    }
}
