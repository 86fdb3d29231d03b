//! Integration tests for the lossim simulation engine
//!
//! Tests are organized by topic:
//! - `properties` - Statistical properties of completed reports
//! - `determinism` - Seeded reproducibility across entry points
//! - `controller` - Run lifecycle: start, pause, resume, stop, failure

mod determinism;

use crate::model::{RiskScenario, ScenarioSet, TriangularImpact};

/// A small portfolio with a heavy-tailed scenario and a frequent cheap one
pub(crate) fn mixed_portfolio() -> ScenarioSet {
    ScenarioSet::new(vec![
        RiskScenario::new(
            "ransomware",
            0.15,
            TriangularImpact::new(50_000.0, 200_000.0, 2_000_000.0),
        ),
        RiskScenario::new(
            "phishing",
            0.6,
            TriangularImpact::new(1_000.0, 5_000.0, 20_000.0),
        ),
        RiskScenario::new(
            "outage",
            0.3,
            TriangularImpact::new(10_000.0, 25_000.0, 100_000.0),
        ),
    ])
    .unwrap()
}
