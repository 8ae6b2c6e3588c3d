//! Storage collaborator boundary.
//!
//! Measurements, buildings and forecasts live outside the engines. The
//! orchestrator reaches them only through [`EnergyDataStore`], wrapped in
//! bounded retry (see [`crate::retry`]).

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEnergyStore;
pub use r#trait::{EnergyDataStore, ForecastAck, StorageError};
