//! Risk scenarios and validated scenario sets
//!
//! A [`RiskScenario`] pairs an annual occurrence probability with a triangular
//! loss-severity distribution. Scenarios are only ever consumed through a
//! [`ScenarioSet`], which validates every member once at construction and is
//! immutable afterwards.

use std::ops::Deref;
use std::sync::Arc;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::ids::ScenarioId;
use crate::error::ScenarioError;

/// Triangular loss-severity parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriangularImpact {
    pub min: f64,
    pub likely: f64,
    pub max: f64,
}

impl TriangularImpact {
    pub fn new(min: f64, likely: f64, max: f64) -> Self {
        Self { min, likely, max }
    }

    /// Point distribution at `value`
    pub fn point(value: f64) -> Self {
        Self::new(value, value, value)
    }

    /// Analytic mean `(min + likely + max) / 3`
    pub fn mean(&self) -> f64 {
        (self.min + self.likely + self.max) / 3.0
    }

    /// Map `r ∈ [0, 1)` through the inverse CDF.
    #[inline]
    pub fn inverse_cdf(&self, r: f64) -> f64 {
        let range = self.max - self.min;
        if range == 0.0 {
            // min == likely == max; both branches below would divide by zero
            return self.min;
        }

        let mode_fraction = (self.likely - self.min) / range;
        if r <= mode_fraction {
            self.min + (r * range * (self.likely - self.min)).sqrt()
        } else {
            self.max - ((1.0 - r) * range * (self.max - self.likely)).sqrt()
        }
    }
}

/// A single independent risk event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScenario {
    pub id: ScenarioId,
    /// Probability that the event occurs at least once in the modeled period
    pub annual_probability: f64,
    pub impact: TriangularImpact,
}

impl RiskScenario {
    pub fn new(id: impl Into<String>, annual_probability: f64, impact: TriangularImpact) -> Self {
        Self {
            id: ScenarioId::new(id),
            annual_probability,
            impact,
        }
    }

    /// Expected loss contributed by this scenario per period
    pub fn expected_loss(&self) -> f64 {
        self.annual_probability * self.impact.mean()
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        let id = || self.id.clone();

        if !self.annual_probability.is_finite() {
            return Err(ScenarioError::NonFiniteParameter {
                id: id(),
                field: "annual_probability",
            });
        }
        for (field, value) in [
            ("impact.min", self.impact.min),
            ("impact.likely", self.impact.likely),
            ("impact.max", self.impact.max),
        ] {
            if !value.is_finite() {
                return Err(ScenarioError::NonFiniteParameter { id: id(), field });
            }
        }

        if !(0.0..=1.0).contains(&self.annual_probability) {
            return Err(ScenarioError::ProbabilityOutOfRange {
                id: id(),
                probability: self.annual_probability,
            });
        }

        let TriangularImpact { min, likely, max } = self.impact;
        if min > likely || likely > max {
            return Err(ScenarioError::InvertedImpact {
                id: id(),
                min,
                likely,
                max,
            });
        }
        if min < 0.0 {
            return Err(ScenarioError::NegativeImpact { id: id(), min });
        }

        Ok(())
    }
}

/// Validated, immutable, cheaply clonable collection of scenarios.
///
/// Order is preserved for reporting but carries no meaning for sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RiskScenario>", into = "Vec<RiskScenario>")]
pub struct ScenarioSet {
    scenarios: Arc<[RiskScenario]>,
}

impl ScenarioSet {
    pub fn new(scenarios: Vec<RiskScenario>) -> Result<Self, ScenarioError> {
        if scenarios.is_empty() {
            return Err(ScenarioError::Empty);
        }

        {
            let mut seen = FxHashSet::default();
            for scenario in &scenarios {
                scenario.validate()?;
                if !seen.insert(scenario.id.as_str()) {
                    return Err(ScenarioError::DuplicateId(scenario.id.clone()));
                }
            }
        }

        Ok(Self {
            scenarios: scenarios.into(),
        })
    }

    /// Analytic expected loss per period: `Σ p · (min + likely + max) / 3`
    pub fn expected_annual_loss(&self) -> f64 {
        self.scenarios.iter().map(RiskScenario::expected_loss).sum()
    }
}

impl Deref for ScenarioSet {
    type Target = [RiskScenario];

    fn deref(&self) -> &Self::Target {
        &self.scenarios
    }
}

impl TryFrom<Vec<RiskScenario>> for ScenarioSet {
    type Error = ScenarioError;

    fn try_from(scenarios: Vec<RiskScenario>) -> Result<Self, Self::Error> {
        Self::new(scenarios)
    }
}

impl From<ScenarioSet> for Vec<RiskScenario> {
    fn from(set: ScenarioSet) -> Self {
        set.scenarios.to_vec()
    }
}
