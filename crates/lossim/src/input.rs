//! Scenario files
//!
//! A scenario file is YAML with a `scenarios` list and an optional `run`
//! section. Field names are flat so files stay easy to write by hand:
//!
//! ```yaml
//! scenarios:
//!   - id: ransomware
//!     annual_probability: 0.15
//!     min: 50000
//!     likely: 200000
//!     max: 2000000
//! run:
//!   iterations: 100000
//!   seed: 42
//!   progress_every_iterations: 5000
//! ```

use std::path::Path;

use color_eyre::eyre::{WrapErr, bail};
use lossim_core::{BatchSize, ProgressCadence, RiskScenario, RunConfig, TriangularImpact};
use serde::{Deserialize, Serialize};

/// YAML-friendly representation of one risk scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioData {
    pub id: String,
    #[serde(alias = "probability")]
    pub annual_probability: f64,
    pub min: f64,
    #[serde(alias = "most_likely")]
    pub likely: f64,
    pub max: f64,
}

impl ScenarioData {
    pub fn to_scenario(&self) -> RiskScenario {
        RiskScenario::new(
            self.id.as_str(),
            self.annual_probability,
            TriangularImpact::new(self.min, self.likely, self.max),
        )
    }
}

/// Optional run settings; anything left out keeps the engine default
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunData {
    pub iterations: Option<u64>,
    pub seed: Option<u64>,
    pub progress_interval_ms: Option<u64>,
    pub progress_every_iterations: Option<u64>,
    pub live_preview_capacity: Option<usize>,
    pub batch_min: Option<u32>,
    pub batch_max: Option<u32>,
    pub tick_delay_ms: Option<u64>,
    pub ruin_multiplier: Option<f64>,
    pub confidence_levels: Option<Vec<f64>>,
    pub exact_sample_limit: Option<usize>,
    pub convergence_threshold: Option<f64>,
}

impl RunData {
    /// Merge onto the engine defaults. Validation is left to the engine.
    pub fn to_run_config(&self) -> color_eyre::Result<RunConfig> {
        let mut config = RunConfig::default();

        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        config.seed = self.seed;

        config.progress = match (self.progress_interval_ms, self.progress_every_iterations) {
            (Some(_), Some(_)) => bail!(
                "run: set only one of progress_interval_ms and progress_every_iterations"
            ),
            (Some(millis), None) => ProgressCadence::Interval { millis },
            (None, Some(count)) => ProgressCadence::EveryIterations { count },
            (None, None) => config.progress,
        };

        if let Some(capacity) = self.live_preview_capacity {
            config.live_preview_capacity = capacity;
        }

        let defaults = config.batch_size;
        config.batch_size = match (self.batch_min, self.batch_max) {
            (None, None) => defaults,
            (Some(min), None) => BatchSize {
                min,
                max: defaults.max.max(min),
            },
            (None, Some(max)) => BatchSize {
                min: defaults.min.min(max),
                max,
            },
            (Some(min), Some(max)) => BatchSize { min, max },
        };

        config.tick_delay_ms = self.tick_delay_ms;
        if let Some(multiplier) = self.ruin_multiplier {
            config.ruin_multiplier = multiplier;
        }
        if let Some(levels) = &self.confidence_levels {
            config.confidence_levels = levels.clone();
        }
        if let Some(limit) = self.exact_sample_limit {
            config.exact_sample_limit = limit;
        }
        if let Some(threshold) = self.convergence_threshold {
            config.convergence_threshold = threshold;
        }

        Ok(config)
    }
}

/// Parsed contents of a scenario file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioFile {
    pub scenarios: Vec<ScenarioData>,
    #[serde(default)]
    pub run: RunData,
}

impl ScenarioFile {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_saphyr::Error> {
        serde_saphyr::from_str(yaml)
    }

    pub fn load(path: &Path) -> color_eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read scenario file {}", path.display()))?;
        let file = Self::from_yaml(&content)
            .wrap_err_with(|| format!("Failed to parse scenario file {}", path.display()))?;
        tracing::debug!(
            path = %path.display(),
            scenarios = file.scenarios.len(),
            "Loaded scenario file"
        );
        Ok(file)
    }

    pub fn to_scenarios(&self) -> Vec<RiskScenario> {
        self.scenarios.iter().map(ScenarioData::to_scenario).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SAMPLE: &str = r#"
scenarios:
  - id: ransomware
    annual_probability: 0.15
    min: 50000
    likely: 200000
    max: 2000000
  - id: phishing
    probability: 0.6
    min: 1000
    most_likely: 5000
    max: 20000
run:
  iterations: 25000
  seed: 7
  progress_every_iterations: 1000
  batch_min: 100
"#;

    #[test]
    fn test_parse_scenarios_and_run() {
        let file = ScenarioFile::from_yaml(SAMPLE).unwrap();
        assert_eq!(file.scenarios.len(), 2);
        assert_eq!(file.scenarios[1].annual_probability, 0.6);
        assert_eq!(file.scenarios[1].likely, 5000.0);

        let scenarios = file.to_scenarios();
        assert_eq!(scenarios[0].id.as_str(), "ransomware");
        assert_eq!(scenarios[0].impact, TriangularImpact::new(50_000.0, 200_000.0, 2_000_000.0));

        let config = file.run.to_run_config().unwrap();
        assert_eq!(config.iterations, 25_000);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.progress, ProgressCadence::EveryIterations { count: 1000 });
        assert_eq!(config.batch_size, BatchSize { min: 100, max: 100 });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_run_section_optional() {
        let yaml = "scenarios:\n  - {id: a, annual_probability: 0.5, min: 1, likely: 2, max: 3}\n";
        let file = ScenarioFile::from_yaml(yaml).unwrap();
        assert_eq!(file.run, RunData::default());
        assert_eq!(file.run.to_run_config().unwrap(), RunConfig::default());
    }

    #[test]
    fn test_conflicting_progress_rejected() {
        let run = RunData {
            progress_interval_ms: Some(50),
            progress_every_iterations: Some(10),
            ..Default::default()
        };
        assert!(run.to_run_config().is_err());
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let loaded = ScenarioFile::load(file.path()).unwrap();
        assert_eq!(loaded.scenarios[0].id, "ransomware");
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.yaml");
        let err = ScenarioFile::load(&path).unwrap_err();
        assert!(err.to_string().contains("nope.yaml"));
    }
}
