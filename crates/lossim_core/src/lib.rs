//! Monte Carlo aggregate-loss simulation engine
//!
//! Given a set of independent risk scenarios (an annual occurrence probability
//! plus a triangular impact distribution each), this crate simulates many
//! periods, sums the losses of the scenarios that occur in each, and
//! summarizes the resulting distribution:
//! - Mean, median, spread and shape (skewness, excess kurtosis)
//! - Percentiles p5 through p99
//! - Tail risk: VaR at 95/99%, expected shortfall, probability of ruin
//! - Confidence intervals on the loss distribution
//!
//! # Running a simulation
//!
//! A blocking call for batch use:
//!
//! ```ignore
//! use lossim_core::{RiskScenario, RunConfig, ScenarioSet, TriangularImpact, run_to_completion};
//!
//! let scenarios = ScenarioSet::new(vec![
//!     RiskScenario::new("ransomware", 0.15, TriangularImpact::new(50_000.0, 200_000.0, 2_000_000.0)),
//! ])?;
//! let report = run_to_completion(&scenarios, &RunConfig::new(100_000).with_seed(42))?;
//! ```
//!
//! Or a controllable background run with streamed progress, see [`controller`].

#![warn(clippy::all)]

// ============================================================================
// Engine modules
// ============================================================================

pub mod aggregator;
pub mod controller;
pub mod error;
pub mod preview;
pub mod report;
pub mod sampler;
pub mod simulation;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod model;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use controller::{
    ControlAction, ProgressSnapshot, ReportStatus, RunEvent, RunHandle, RunSnapshot, RunStatus,
    start_run,
};
pub use error::{ConfigError, EngineError, Result, ScenarioError};
pub use model::{
    BatchSize, ConfidenceInterval, Percentiles, ProgressCadence, QuantileMethod, ReportKind,
    RiskMetrics, RiskScenario, RunConfig, RunId, ScenarioId, ScenarioSet, SimulationReport,
    Statistics, TriangularImpact,
};
pub use simulation::run_to_completion;
