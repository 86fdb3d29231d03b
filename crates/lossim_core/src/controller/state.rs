//! Run lifecycle states and the legal transitions between them
//!
//! ```text
//! Idle ──start──▶ Running ◀──resume── Paused
//!                    │ └────pause────▶  │
//!                    ├──(last batch)──▶ Completed
//!                    ├──(bad sample)──▶ Failed
//!                    └──stop──▶ Stopped ◀──stop──┘
//! ```
//!
//! `start` is also accepted from any terminal state and resets the run.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::model::RunId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
    Stopped,
    Failed,
}

impl RunStatus {
    /// Running or paused: a worker owns the run
    pub fn is_active(self) -> bool {
        matches!(self, RunStatus::Running | RunStatus::Paused)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Stopped | RunStatus::Failed
        )
    }

    /// Status after applying a caller's control action
    pub fn apply(self, action: ControlAction) -> Result<RunStatus, EngineError> {
        use ControlAction::*;
        use RunStatus::*;

        match (self, action) {
            (Idle | Completed | Stopped | Failed, Start) => Ok(Running),
            (Running, Pause) => Ok(Paused),
            (Paused, Resume) => Ok(Running),
            (Running | Paused, Stop) => Ok(Stopped),
            (from, action) => Err(EngineError::InvalidStateTransition { from, action }),
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Paused => "paused",
            RunStatus::Completed => "completed",
            RunStatus::Stopped => "stopped",
            RunStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Control calls a caller can make on a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    Start,
    Pause,
    Resume,
    Stop,
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlAction::Start => "start",
            ControlAction::Pause => "pause",
            ControlAction::Resume => "resume",
            ControlAction::Stop => "stop",
        };
        f.write_str(name)
    }
}

/// Copy of a run's published state
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: RunId,
    pub status: RunStatus,
    pub current_iteration: u64,
    pub total_iterations: u64,
    pub started_at: Option<jiff::Timestamp>,
    /// Active (non-paused) time since start
    pub elapsed: Duration,
    pub seed: Option<u64>,
}

impl RunSnapshot {
    pub fn progress_pct(&self) -> f64 {
        if self.total_iterations == 0 {
            0.0
        } else {
            self.current_iteration as f64 / self.total_iterations as f64 * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        assert_eq!(RunStatus::Idle.apply(ControlAction::Start), Ok(RunStatus::Running));
        assert_eq!(RunStatus::Running.apply(ControlAction::Pause), Ok(RunStatus::Paused));
        assert_eq!(RunStatus::Paused.apply(ControlAction::Resume), Ok(RunStatus::Running));
        assert_eq!(RunStatus::Running.apply(ControlAction::Stop), Ok(RunStatus::Stopped));
        assert_eq!(RunStatus::Paused.apply(ControlAction::Stop), Ok(RunStatus::Stopped));
        for terminal in [RunStatus::Completed, RunStatus::Stopped, RunStatus::Failed] {
            assert_eq!(terminal.apply(ControlAction::Start), Ok(RunStatus::Running));
        }
    }

    #[test]
    fn test_illegal_transitions() {
        let cases = [
            (RunStatus::Idle, ControlAction::Resume),
            (RunStatus::Idle, ControlAction::Pause),
            (RunStatus::Idle, ControlAction::Stop),
            (RunStatus::Running, ControlAction::Start),
            (RunStatus::Running, ControlAction::Resume),
            (RunStatus::Paused, ControlAction::Pause),
            (RunStatus::Paused, ControlAction::Start),
            (RunStatus::Completed, ControlAction::Stop),
            (RunStatus::Stopped, ControlAction::Resume),
        ];
        for (from, action) in cases {
            assert_eq!(
                from.apply(action),
                Err(EngineError::InvalidStateTransition { from, action }),
                "{action} from {from} should be rejected"
            );
        }
    }

    #[test]
    fn test_error_message() {
        let err = RunStatus::Idle.apply(ControlAction::Resume).unwrap_err();
        assert_eq!(err.to_string(), "cannot resume a run that is idle");
    }
}
