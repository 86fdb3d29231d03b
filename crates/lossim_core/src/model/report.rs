//! Simulation report types
//!
//! A [`SimulationReport`] is immutable once produced. Reports built from a
//! paused, stopped or failed run carry [`ReportKind::Partial`].

use serde::{Deserialize, Serialize};

/// Whether a report covers every requested iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Final,
    Partial,
}

/// How percentile and tail metrics were derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantileMethod {
    /// Every sample was retained and sorted
    Exact,
    /// Uniform reservoir of `capacity` samples (Algorithm R)
    Reservoir { capacity: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub skewness: f64,
    /// Excess kurtosis
    pub kurtosis: f64,
    pub min: f64,
    pub max: f64,
    /// Standard error of the mean
    pub standard_error: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p5: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl Percentiles {
    /// `(percent, value)` pairs in ascending order
    pub fn as_pairs(&self) -> [(u8, f64); 8] {
        [
            (5, self.p5),
            (10, self.p10),
            (25, self.p25),
            (50, self.p50),
            (75, self.p75),
            (90, self.p90),
            (95, self.p95),
            (99, self.p99),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Loss exceeded with 5% probability
    pub var_95: f64,
    /// Loss exceeded with 1% probability
    pub var_99: f64,
    /// Mean of the losses at or above `var_95` (CVaR)
    pub expected_shortfall: f64,
    /// Fraction of iterations whose loss exceeds `ruin_threshold`
    pub probability_of_ruin: f64,
    pub ruin_threshold: f64,
    /// Fraction of iterations with any loss at all
    pub probability_of_loss: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub level: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub kind: ReportKind,
    pub statistics: Statistics,
    pub percentiles: Percentiles,
    pub risk_metrics: RiskMetrics,
    pub confidence_intervals: Vec<ConfidenceInterval>,
    pub iterations_completed: u64,
    pub iterations_requested: u64,
    /// Active (non-paused) wall time spent sampling
    pub execution_time_ms: u64,
    pub seed_used: u64,
    pub quantile_method: QuantileMethod,
    /// Analytic `Σ p · mean(impact)` for comparison with the simulated mean
    pub expected_annual_loss: f64,
    pub converged: bool,
}

impl SimulationReport {
    pub fn is_partial(&self) -> bool {
        self.kind == ReportKind::Partial
    }

    /// True when two reports agree on everything but timing
    pub fn same_outcome(&self, other: &SimulationReport) -> bool {
        self.kind == other.kind
            && self.statistics == other.statistics
            && self.percentiles == other.percentiles
            && self.risk_metrics == other.risk_metrics
            && self.confidence_intervals == other.confidence_intervals
            && self.iterations_completed == other.iterations_completed
            && self.iterations_requested == other.iterations_requested
            && self.seed_used == other.seed_used
            && self.quantile_method == other.quantile_method
            && self.expected_annual_loss == other.expected_annual_loss
            && self.converged == other.converged
    }
}
