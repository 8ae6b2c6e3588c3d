//! Infrastructure layer: storage collaborator, registry persistence,
//! configuration and the forecast service that ties the engines together.

pub mod config;
pub mod deadline;
pub mod demo;
pub mod registry_store;
pub mod retry;
pub mod service;
pub mod storage;


pub use config::{AccessConfig, ConfigError, MAX_HISTORY_DAYS, ServiceConfig};
pub use deadline::Deadline;
pub use registry_store::{JsonFileRegistryStore, open_registry};
pub use retry::{BackoffStrategy, RetryPolicy, with_retry};
pub use service::{Clock, FixedClock, ForecastResponse, ForecastService, HealthDetails, SystemClock};
pub use storage::{EnergyDataStore, ForecastAck, InMemoryEnergyStore, StorageError};
