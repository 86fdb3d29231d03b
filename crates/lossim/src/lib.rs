//! Command-line driver for the lossim simulation engine
//!
//! Loads a YAML scenario file, runs it on a background [`lossim_core::RunHandle`]
//! while drawing live progress, and prints the report as text, JSON or YAML.

// ============================================================================
// Driver modules
// ============================================================================

pub mod driver;
pub mod input;
pub mod logging;
pub mod render;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use driver::{DriveOptions, Outcome, drive};
pub use input::{RunData, ScenarioData, ScenarioFile};
pub use logging::init_logging;
pub use render::{OutputFormat, render_report};
