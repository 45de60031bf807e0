//! The ratchet learning core.
//!
//! Generic over any [`ratchet_core::store::LearningStore`]:
//!
//! - [`miner`] and [`promoter`] turn successful executions into learned
//!   patterns, and [`generator`] turns strong patterns into artifacts;
//! - [`rulebook`] and [`tracker`] author rules and record their
//!   applications;
//! - [`propagation`] promotes, refines and retires rules from that
//!   evidence.
//!
//! [`LearningEngine`] bundles a store with both configurations.

pub mod engine;
pub mod error;
pub mod generator;
pub mod miner;
pub mod normalize;
pub mod promoter;
pub mod propagation;
pub mod rulebook;
pub mod runner;
pub mod tracker;

pub use engine::{LearningEngine, MiningReport};
pub use error::{Error, Result};
pub use propagation::CycleReport;
pub use runner::{ArtifactOutcome, ToolInvoker};

/// Slack allowed when comparing accumulated floats against thresholds.
pub(crate) const EPSILON: f64 = 1e-9;

#[cfg(test)]
mod tests;
