//! `wattcast-models`
//!
//! **Responsibility:** trained model artifacts and their lifecycle.
//!
//! - Artifacts are read-only once registered and shared through `Arc`.
//! - Training happens elsewhere; this crate only registers, selects and
//!   promotes models and tracks their rolling accuracy.
//! - Inference is deterministic: no sampling, no hidden state.

pub mod artifact;
pub mod manager;
pub mod stats;
pub mod store;

pub use artifact::{
    Feature, GradientBoostedModel, InferenceInput, ModelArtifact, RegressionTree, SequenceModel, TreeNode,
};
pub use manager::{ManagerConfig, ModelHandle, ModelHealth, ModelManager, PerformanceReport, RegistryCounts};
pub use store::{InMemoryRegistryStore, ModelRegistryStore, PersistedModel, RegistryStoreError};
