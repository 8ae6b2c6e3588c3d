//! Algorithm selection by horizon.

use serde::{Deserialize, Serialize};

use wattcast_core::{Algorithm, Horizon};

/// Chooses which algorithm family serves a horizon.
pub trait AlgorithmPolicy: Send + Sync {
    fn select(&self, horizon: Horizon) -> Algorithm;
}

/// Table policy: one algorithm per horizon.
///
/// Defaults to the sequence model for the day-ahead horizon (strong on
/// intraday cycles) and the tree ensemble for the week (steadier over long,
/// noisy ranges).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizonPolicy {
    pub day: Algorithm,
    pub week: Algorithm,
}

impl Default for HorizonPolicy {
    fn default() -> Self {
        Self {
            day: Algorithm::Lstm,
            week: Algorithm::GradientBoosted,
        }
    }
}

impl AlgorithmPolicy for HorizonPolicy {
    fn select(&self, horizon: Horizon) -> Algorithm {
        match horizon {
            Horizon::Day => self.day,
            Horizon::Week => self.week,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_maps_horizons() {
        let p = HorizonPolicy::default();
        assert_eq!(p.select(Horizon::Day), Algorithm::Lstm);
        assert_eq!(p.select(Horizon::Week), Algorithm::GradientBoosted);
    }

    #[test]
    fn policy_is_overridable_from_config() {
        let p: HorizonPolicy = serde_json::from_str(r#"{"week":"LSTM"}"#).unwrap();
        assert_eq!(p.select(Horizon::Week), Algorithm::Lstm);
        assert_eq!(p.select(Horizon::Day), Algorithm::Lstm);
    }
}
