//! Run configuration
//!
//! `RunConfig` carries everything a run needs besides the scenarios. Missing
//! fields deserialize to the defaults below, and the `with_*` helpers
//! support building variants in code:
//!
//! ```ignore
//! let config = RunConfig::new(100_000)
//!     .with_seed(42)
//!     .with_progress(ProgressCadence::EveryIterations { count: 5_000 });
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_ITERATIONS: u64 = 10_000;
pub const DEFAULT_PREVIEW_CAPACITY: usize = 1_000;
pub const DEFAULT_RUIN_MULTIPLIER: f64 = 10.0;
pub const DEFAULT_EXACT_SAMPLE_LIMIT: usize = 1_000_000;
/// Largest live preview window a run accepts
pub const MAX_PREVIEW_CAPACITY: usize = 1_000_000;
/// Largest exact or reservoir sample store a run accepts (80 MB of `f64`)
pub const MAX_EXACT_SAMPLE_LIMIT: usize = 10_000_000;

fn default_iterations() -> u64 {
    DEFAULT_ITERATIONS
}

fn default_preview_capacity() -> usize {
    DEFAULT_PREVIEW_CAPACITY
}

fn default_ruin_multiplier() -> f64 {
    DEFAULT_RUIN_MULTIPLIER
}

fn default_confidence_levels() -> Vec<f64> {
    vec![0.95, 0.99]
}

fn default_exact_sample_limit() -> usize {
    DEFAULT_EXACT_SAMPLE_LIMIT
}

fn default_convergence_threshold() -> f64 {
    0.01
}

/// How often the controller publishes progress snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressCadence {
    /// At the first batch boundary after `millis` of active time
    Interval { millis: u64 },
    /// At the first batch boundary after `count` more iterations
    EveryIterations { count: u64 },
}

impl Default for ProgressCadence {
    fn default() -> Self {
        ProgressCadence::Interval { millis: 100 }
    }
}

/// Bounds on the number of iterations sampled between two batch boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSize {
    pub min: u32,
    pub max: u32,
}

impl Default for BatchSize {
    fn default() -> Self {
        Self { min: 10, max: 60 }
    }
}

impl BatchSize {
    pub fn fixed(size: u32) -> Self {
        Self {
            min: size,
            max: size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Total Monte Carlo draws
    #[serde(default = "default_iterations")]
    pub iterations: u64,

    #[serde(default)]
    pub progress: ProgressCadence,

    /// Most-recent per-iteration losses kept for live charting
    #[serde(default = "default_preview_capacity")]
    pub live_preview_capacity: usize,

    /// Fixed seed for a reproducible run; chosen at random and reported when absent
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub batch_size: BatchSize,

    /// Pause between batches, for pacing a run that is being watched live
    #[serde(default)]
    pub tick_delay_ms: Option<u64>,

    /// Ruin threshold as a multiple of the mean loss
    #[serde(default = "default_ruin_multiplier")]
    pub ruin_multiplier: f64,

    #[serde(default = "default_confidence_levels")]
    pub confidence_levels: Vec<f64>,

    /// Runs up to this many iterations keep every sample for exact percentiles.
    /// Larger runs keep a uniform reservoir of this size instead.
    #[serde(default = "default_exact_sample_limit")]
    pub exact_sample_limit: usize,

    /// Relative standard error at or below which a run counts as converged
    #[serde(default = "default_convergence_threshold")]
    pub convergence_threshold: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            progress: ProgressCadence::default(),
            live_preview_capacity: default_preview_capacity(),
            seed: None,
            batch_size: BatchSize::default(),
            tick_delay_ms: None,
            ruin_multiplier: default_ruin_multiplier(),
            confidence_levels: default_confidence_levels(),
            exact_sample_limit: default_exact_sample_limit(),
            convergence_threshold: default_convergence_threshold(),
        }
    }
}

impl RunConfig {
    #[must_use]
    pub fn new(iterations: u64) -> Self {
        Self {
            iterations,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressCadence) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn with_live_preview_capacity(mut self, capacity: usize) -> Self {
        self.live_preview_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: BatchSize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_tick_delay(mut self, delay: Duration) -> Self {
        self.tick_delay_ms = Some(delay.as_millis() as u64);
        self
    }

    #[must_use]
    pub fn with_ruin_multiplier(mut self, multiplier: f64) -> Self {
        self.ruin_multiplier = multiplier;
        self
    }

    #[must_use]
    pub fn with_exact_sample_limit(mut self, limit: usize) -> Self {
        self.exact_sample_limit = limit;
        self
    }

    pub fn tick_delay(&self) -> Option<Duration> {
        self.tick_delay_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        if self.live_preview_capacity == 0 {
            return Err(ConfigError::ZeroPreviewCapacity);
        }
        if self.live_preview_capacity > MAX_PREVIEW_CAPACITY {
            return Err(ConfigError::PreviewCapacityTooLarge {
                capacity: self.live_preview_capacity,
                max: MAX_PREVIEW_CAPACITY,
            });
        }
        match self.progress {
            ProgressCadence::Interval { millis: 0 }
            | ProgressCadence::EveryIterations { count: 0 } => {
                return Err(ConfigError::ZeroProgressCadence);
            }
            _ => {}
        }
        let BatchSize { min, max } = self.batch_size;
        if min == 0 || min > max {
            return Err(ConfigError::InvalidBatchSize { min, max });
        }
        if !self.ruin_multiplier.is_finite() || self.ruin_multiplier <= 0.0 {
            return Err(ConfigError::InvalidRuinMultiplier(self.ruin_multiplier));
        }
        if let Some(level) = self
            .confidence_levels
            .iter()
            .find(|level| !(**level > 0.0 && **level < 1.0))
        {
            return Err(ConfigError::InvalidConfidenceLevel(*level));
        }
        if self.exact_sample_limit == 0 {
            return Err(ConfigError::ZeroSampleLimit);
        }
        if self.exact_sample_limit > MAX_EXACT_SAMPLE_LIMIT {
            return Err(ConfigError::SampleLimitTooLarge {
                limit: self.exact_sample_limit,
                max: MAX_EXACT_SAMPLE_LIMIT,
            });
        }
        if !self.convergence_threshold.is_finite() || self.convergence_threshold <= 0.0 {
            return Err(ConfigError::InvalidConvergenceThreshold(
                self.convergence_threshold,
            ));
        }
        Ok(())
    }
}
