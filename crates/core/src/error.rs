//! Error taxonomy shared by the engines and the orchestrator.

use thiserror::Error;

/// Result type used across the engine layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Engine/service-level error.
///
/// Every variant is terminal for the request that produced it. Callers map
/// these to transport-level responses; they are never replaced by a guessed
/// value or an empty "successful" result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed horizon/type/schedule shape or other rejected input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The requester may not act on the building.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// Not enough (or too sparse) history to forecast the requested horizon.
    #[error("insufficient history: {0}")]
    InsufficientHistory(String),

    /// No active model exists for the (building, algorithm) pair.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// The forecast handed to the optimizer has no predicted steps.
    #[error("no forecast available: {0}")]
    NoForecastAvailable(String),

    /// Tariff bands do not partition the day or carry unusable prices.
    #[error("invalid tariff schedule: {0}")]
    InvalidTariffSchedule(String),

    /// The storage collaborator stayed unavailable after bounded retries.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The per-request deadline elapsed; partial work was discarded.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// Unknown model id, building or forecast.
    #[error("not found: {0}")]
    NotFound(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_authorized(msg: impl Into<String>) -> Self {
        Self::NotAuthorized(msg.into())
    }

    pub fn insufficient_history(msg: impl Into<String>) -> Self {
        Self::InsufficientHistory(msg.into())
    }

    pub fn model_unavailable(msg: impl Into<String>) -> Self {
        Self::ModelUnavailable(msg.into())
    }

    pub fn no_forecast(msg: impl Into<String>) -> Self {
        Self::NoForecastAvailable(msg.into())
    }

    pub fn invalid_tariff(msg: impl Into<String>) -> Self {
        Self::InvalidTariffSchedule(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Stable machine-readable code (used in JSON error bodies and logs).
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_error",
            DomainError::NotAuthorized(_) => "not_authorized",
            DomainError::InsufficientHistory(_) => "insufficient_history",
            DomainError::ModelUnavailable(_) => "model_unavailable",
            DomainError::NoForecastAvailable(_) => "no_forecast_available",
            DomainError::InvalidTariffSchedule(_) => "invalid_tariff_schedule",
            DomainError::UpstreamUnavailable(_) => "upstream_unavailable",
            DomainError::Timeout(_) => "timeout",
            DomainError::NotFound(_) => "not_found",
        }
    }
}
