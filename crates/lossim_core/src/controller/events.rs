//! Events pushed to run subscribers

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::model::{RunId, SimulationReport};

/// Periodic progress of a running simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub run_id: RunId,
    pub current_iteration: u64,
    pub total_iterations: u64,
    pub progress_pct: f64,
    pub elapsed: Duration,
    /// Most recent per-iteration losses, oldest first; for display only
    pub preview: Vec<f64>,
}

/// One entry in a run's event feed.
///
/// `Progress` events of a run have strictly increasing `current_iteration`.
/// `Completed`, `Stopped` and `Failed` are terminal and always last.
#[derive(Debug, Clone)]
pub enum RunEvent {
    Started {
        run_id: RunId,
        seed: u64,
        iterations: u64,
    },
    Progress(ProgressSnapshot),
    Paused {
        run_id: RunId,
        iteration: u64,
    },
    Resumed {
        run_id: RunId,
        iteration: u64,
    },
    Completed {
        run_id: RunId,
        report: Arc<SimulationReport>,
    },
    /// Stopped by request; `report` is absent if no iteration was folded
    Stopped {
        run_id: RunId,
        report: Option<Arc<SimulationReport>>,
    },
    /// Sampling fault; `report` covers the iterations folded before it
    Failed {
        run_id: RunId,
        error: EngineError,
        report: Option<Arc<SimulationReport>>,
    },
}

impl RunEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            RunEvent::Started { run_id, .. }
            | RunEvent::Paused { run_id, .. }
            | RunEvent::Resumed { run_id, .. }
            | RunEvent::Completed { run_id, .. }
            | RunEvent::Stopped { run_id, .. }
            | RunEvent::Failed { run_id, .. } => *run_id,
            RunEvent::Progress(snapshot) => snapshot.run_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunEvent::Completed { .. } | RunEvent::Stopped { .. } | RunEvent::Failed { .. }
        )
    }
}
