//! `wattcast-forecast`
//!
//! **Responsibility:** turn a measurement history into a predicted series
//! with uncertainty bounds.
//!
//! - `preprocess`: place raw readings on the regular grid and impute gaps.
//! - `policy`: choose the algorithm family for a horizon.
//! - `engine`: resolve the active model and run inference.

pub mod engine;
pub mod policy;
pub mod preprocess;

pub use engine::{EngineConfig, ForecastEngine};
pub use policy::{AlgorithmPolicy, HorizonPolicy};
pub use preprocess::{RegularSeries, impute};
