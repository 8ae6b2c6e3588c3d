//! Service configuration.
//!
//! Every knob has a documented default; a TOML file named by
//! `WATTCAST_CONFIG` overrides any subset of them:
//!
//! ```toml
//! request_deadline_ms = 5000
//!
//! [retry]
//! max_attempts = 5
//!
//! [engine.policy]
//! week = "LSTM"
//!
//! [[access.principals]]
//! name = "facility-team"
//! buildings = { only = ["B001", "B002"] }
//! permissions = ["forecast.request", "optimization.request"]
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use wattcast_auth::{AllowAll, Authorizer, Principal, StaticPolicy};
use wattcast_core::{DomainError, TariffSchedule};
use wattcast_forecast::EngineConfig;
use wattcast_models::ManagerConfig;
use wattcast_optimization::OptimizerConfig;

use crate::retry::RetryPolicy;

/// Environment variable naming the TOML config file.
pub const CONFIG_ENV: &str = "WATTCAST_CONFIG";

/// Upper bound on the history window fetched before a forecast.
pub const MAX_HISTORY_DAYS: i64 = 3650;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(#[from] DomainError),
}

/// Principals allowed to use the service. Empty means unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub principals: Vec<Principal>,
}

impl AccessConfig {
    pub fn authorizer(&self) -> Arc<dyn Authorizer> {
        if self.principals.is_empty() {
            Arc::new(AllowAll)
        } else {
            Arc::new(StaticPolicy::new(self.principals.clone()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub engine: EngineConfig,
    pub optimizer: OptimizerConfig,
    pub registry: ManagerConfig,
    pub retry: RetryPolicy,
    /// Budget for one forecast or optimization request.
    pub request_deadline_ms: u64,
    /// Stored forecasts younger than this are reused for optimization.
    pub forecast_reuse_secs: u64,
    /// Days of history fetched before a forecast.
    pub history_days: i64,
    pub tariff: TariffSchedule,
    pub access: AccessConfig,
    /// JSON file backing the model registry. In-memory when unset.
    pub registry_path: Option<PathBuf>,
    /// Load synthetic buildings and baseline models at startup.
    pub seed_demo_data: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            optimizer: OptimizerConfig::default(),
            registry: ManagerConfig::default(),
            retry: RetryPolicy::default(),
            request_deadline_ms: 10_000,
            forecast_reuse_secs: 3_600,
            history_days: 30,
            tariff: TariffSchedule::reference(),
            access: AccessConfig::default(),
            registry_path: None,
            seed_demo_data: true,
        }
    }
}

impl ServiceConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: ServiceConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Load the file named by `WATTCAST_CONFIG`, or the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(PathBuf::from(path)),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        self.engine.validate()?;
        self.optimizer.validate()?;
        self.retry.validate()?;
        self.tariff.validate()?;
        if self.request_deadline_ms == 0 {
            return Err(DomainError::validation("request_deadline_ms must be > 0"));
        }
        if !(1..=MAX_HISTORY_DAYS).contains(&self.history_days) {
            return Err(DomainError::validation(format!(
                "history_days must be within 1..={MAX_HISTORY_DAYS}"
            )));
        }
        if self.registry.performance_window == 0 {
            return Err(DomainError::validation("registry.performance_window must be > 0"));
        }
        if !(self.registry.health_rmse_ratio.is_finite() && self.registry.health_rmse_ratio > 0.0) {
            return Err(DomainError::validation("registry.health_rmse_ratio must be > 0"));
        }
        Ok(())
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }

    pub fn forecast_reuse_age(&self) -> chrono::Duration {
        i64::try_from(self.forecast_reuse_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wattcast_core::Algorithm;

    #[test]
    fn history_window_is_bounded() {
        for days in [0, -1, MAX_HISTORY_DAYS + 1, i64::MAX] {
            let c = ServiceConfig {
                history_days: days,
                ..ServiceConfig::default()
            };
            assert!(matches!(c.validate(), Err(DomainError::Validation(_))), "{days}");
        }
        let c = ServiceConfig {
            history_days: MAX_HISTORY_DAYS,
            ..ServiceConfig::default()
        };
        c.validate().unwrap();
    }

    #[test]
    fn huge_reuse_age_saturates() {
        let c = ServiceConfig {
            forecast_reuse_secs: u64::MAX,
            ..ServiceConfig::default()
        };
        assert_eq!(c.forecast_reuse_age(), chrono::Duration::MAX);
    }

    #[test]
    fn defaults_are_valid() {
        let c = ServiceConfig::default();
        c.validate().unwrap();
        assert_eq!(c.retry.max_attempts, 3);
        assert_eq!(c.request_deadline(), Duration::from_secs(10));
        assert_eq!(c.forecast_reuse_age(), chrono::Duration::hours(1));
        assert_eq!(c.registry.performance_window, 30);
    }

    #[test]
    fn partial_toml_overrides_defaults() {
        let c = ServiceConfig::from_toml_str(
            r#"
            request_deadline_ms = 2500

            [retry]
            max_attempts = 5

            [engine.policy]
            week = "LSTM"

            [[access.principals]]
            name = "ops"
            buildings = "all"
            permissions = ["*"]
            "#,
        )
        .unwrap();
        assert_eq!(c.request_deadline_ms, 2500);
        assert_eq!(c.retry.max_attempts, 5);
        assert_eq!(c.retry.base_delay_ms, 100);
        assert_eq!(c.engine.policy.week, Algorithm::Lstm);
        assert_eq!(c.access.principals.len(), 1);
        assert_eq!(c.tariff, TariffSchedule::reference());
    }

    #[test]
    fn gapped_tariff_is_rejected_at_load() {
        let err = ServiceConfig::from_toml_str(
            r#"
            [tariff]
            currency = "PLN"
            bands = [
              { name = "day", start_hour = 6, end_hour = 22, price_per_kwh = 1.0 },
              { name = "night", start_hour = 23, end_hour = 6, price_per_kwh = 0.5 },
            ]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(DomainError::InvalidTariffSchedule(_))));
    }

    #[test]
    fn zero_deadline_is_rejected() {
        let err = ServiceConfig::from_toml_str("request_deadline_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(DomainError::Validation(_))));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            ServiceConfig::from_toml_str("request_deadline_ms = \"soon\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
