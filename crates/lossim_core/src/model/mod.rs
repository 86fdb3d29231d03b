mod config;
mod ids;
mod report;
mod scenario;

pub use config::{
    BatchSize, DEFAULT_EXACT_SAMPLE_LIMIT, DEFAULT_ITERATIONS, DEFAULT_PREVIEW_CAPACITY,
    DEFAULT_RUIN_MULTIPLIER, MAX_EXACT_SAMPLE_LIMIT, MAX_PREVIEW_CAPACITY, ProgressCadence,
    RunConfig,
};
pub use ids::{RunId, ScenarioId};
pub use report::{
    ConfidenceInterval, Percentiles, QuantileMethod, ReportKind, RiskMetrics, SimulationReport,
    Statistics,
};
pub use scenario::{RiskScenario, ScenarioSet, TriangularImpact};
