//! `wattcast-optimization`
//!
//! **Responsibility:** turn an energy forecast and a tariff schedule into
//! ranked load-shifting recommendations.
//!
//! This crate is pure: no IO, no clocks, no shared state. Savings are derived
//! only from the forecast and the tariff.

pub mod blocks;
pub mod engine;

pub use blocks::{LoadBlock, load_blocks};
pub use engine::{OptimizationEngine, OptimizerConfig, baseline_cost};
