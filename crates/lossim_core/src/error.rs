use std::fmt;

use crate::controller::{ControlAction, RunStatus};
use crate::model::ScenarioId;

/// Errors found while validating a scenario set
#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioError {
    Empty,
    DuplicateId(ScenarioId),
    ProbabilityOutOfRange {
        id: ScenarioId,
        probability: f64,
    },
    InvertedImpact {
        id: ScenarioId,
        min: f64,
        likely: f64,
        max: f64,
    },
    NonFiniteParameter {
        id: ScenarioId,
        field: &'static str,
    },
    NegativeImpact {
        id: ScenarioId,
        min: f64,
    },
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioError::Empty => write!(f, "scenario set is empty"),
            ScenarioError::DuplicateId(id) => write!(f, "duplicate scenario id {id}"),
            ScenarioError::ProbabilityOutOfRange { id, probability } => write!(
                f,
                "scenario {id}: annual probability {probability} is outside [0, 1]"
            ),
            ScenarioError::InvertedImpact {
                id,
                min,
                likely,
                max,
            } => write!(
                f,
                "scenario {id}: impact must satisfy min <= likely <= max (got {min}, {likely}, {max})"
            ),
            ScenarioError::NonFiniteParameter { id, field } => {
                write!(f, "scenario {id}: {field} is not a finite number")
            }
            ScenarioError::NegativeImpact { id, min } => {
                write!(f, "scenario {id}: impact minimum {min} is negative")
            }
        }
    }
}

impl std::error::Error for ScenarioError {}

/// Errors found while validating a run configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    ZeroIterations,
    ZeroPreviewCapacity,
    PreviewCapacityTooLarge { capacity: usize, max: usize },
    ZeroProgressCadence,
    InvalidBatchSize { min: u32, max: u32 },
    InvalidRuinMultiplier(f64),
    InvalidConfidenceLevel(f64),
    ZeroSampleLimit,
    SampleLimitTooLarge { limit: usize, max: usize },
    InvalidConvergenceThreshold(f64),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroIterations => write!(f, "iterations must be positive"),
            ConfigError::ZeroPreviewCapacity => {
                write!(f, "live preview capacity must be positive")
            }
            ConfigError::PreviewCapacityTooLarge { capacity, max } => {
                write!(f, "live preview capacity {capacity} exceeds the maximum of {max}")
            }
            ConfigError::ZeroProgressCadence => write!(f, "progress cadence must be positive"),
            ConfigError::InvalidBatchSize { min, max } => {
                write!(f, "batch size range {min}..={max} is invalid")
            }
            ConfigError::InvalidRuinMultiplier(m) => {
                write!(f, "ruin multiplier {m} must be finite and positive")
            }
            ConfigError::InvalidConfidenceLevel(level) => {
                write!(f, "confidence level {level} must lie strictly between 0 and 1")
            }
            ConfigError::ZeroSampleLimit => write!(f, "exact sample limit must be positive"),
            ConfigError::SampleLimitTooLarge { limit, max } => {
                write!(f, "exact sample limit {limit} exceeds the maximum of {max}")
            }
            ConfigError::InvalidConvergenceThreshold(t) => {
                write!(f, "convergence threshold {t} must be finite and positive")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Top-level engine error returned by the submission and control interfaces
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    InvalidScenarioSet(ScenarioError),
    InvalidConfig(ConfigError),
    InvalidStateTransition {
        from: RunStatus,
        action: ControlAction,
    },
    /// A sampled loss was not a finite number
    SamplingFailure {
        iteration: u64,
        value: f64,
    },
    /// The background worker thread could not be started
    WorkerSpawn(String),
    /// A final report was requested before any iteration was folded
    NoSamples,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidScenarioSet(e) => write!(f, "invalid scenario set: {e}"),
            EngineError::InvalidConfig(e) => write!(f, "invalid run configuration: {e}"),
            EngineError::InvalidStateTransition { from, action } => {
                write!(f, "cannot {action} a run that is {from}")
            }
            EngineError::SamplingFailure { iteration, value } => {
                write!(f, "sampling produced {value} at iteration {iteration}")
            }
            EngineError::WorkerSpawn(msg) => write!(f, "failed to start run worker: {msg}"),
            EngineError::NoSamples => write!(f, "no iterations were folded, nothing to report"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::InvalidScenarioSet(e) => Some(e),
            EngineError::InvalidConfig(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ScenarioError> for EngineError {
    fn from(e: ScenarioError) -> Self {
        EngineError::InvalidScenarioSet(e)
    }
}

impl From<ConfigError> for EngineError {
    fn from(e: ConfigError) -> Self {
        EngineError::InvalidConfig(e)
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
