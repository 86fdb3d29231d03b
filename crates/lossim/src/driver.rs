//! Follows a run's event feed until it ends, drawing progress as it goes.

use std::io::Write;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use lossim_core::{EngineError, ReportStatus, RunEvent, RunHandle, RunStatus, SimulationReport};

use crate::render::progress_line;

/// How often the time budget is checked while no events arrive
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Default)]
pub struct DriveOptions {
    /// Suppress the live progress line
    pub quiet: bool,
    /// Stop the run once this much active time has passed
    pub time_budget: Option<Duration>,
}

/// How a driven run ended
#[derive(Debug)]
pub enum Outcome {
    Completed(Arc<SimulationReport>),
    Stopped(Option<Arc<SimulationReport>>),
    Failed {
        error: EngineError,
        report: Option<Arc<SimulationReport>>,
    },
}

impl Outcome {
    pub fn report(&self) -> Option<&Arc<SimulationReport>> {
        match self {
            Outcome::Completed(report) => Some(report),
            Outcome::Stopped(report) | Outcome::Failed { report, .. } => report.as_ref(),
        }
    }
}

struct ProgressLine<'w, W: Write> {
    out: &'w mut W,
    drawn: bool,
}

impl<W: Write> ProgressLine<'_, W> {
    fn draw(&mut self, line: &str) {
        // The terminal may be gone; progress is best effort
        let _ = write!(self.out, "\r{line}\x1b[K");
        let _ = self.out.flush();
        self.drawn = true;
    }

    fn finish(&mut self) {
        if self.drawn {
            let _ = writeln!(self.out);
            self.drawn = false;
        }
    }
}

fn budget_exceeded(handle: &RunHandle, budget: Option<Duration>) -> bool {
    let Some(budget) = budget else {
        return false;
    };
    let snapshot = handle.snapshot();
    snapshot.status == RunStatus::Running && snapshot.elapsed >= budget
}

/// Outcome for a feed that closed without a terminal event
fn outcome_from_handle(handle: &RunHandle) -> Outcome {
    let report = match handle.wait() {
        ReportStatus::Final(report) => return Outcome::Completed(report),
        ReportStatus::Partial(report) => Some(report),
        ReportStatus::NotAvailable => None,
    };
    Outcome::Stopped(report)
}

/// Consume `events` until the run ends. Progress lines go to `progress_out`
/// unless `options.quiet` is set.
pub fn drive<W: Write>(
    handle: &RunHandle,
    events: &Receiver<RunEvent>,
    options: &DriveOptions,
    progress_out: &mut W,
) -> Outcome {
    let mut line = ProgressLine {
        out: progress_out,
        drawn: false,
    };
    let mut stop_requested = false;

    loop {
        match events.recv_timeout(POLL_INTERVAL) {
            Ok(RunEvent::Started {
                run_id,
                seed,
                iterations,
            }) => {
                tracing::debug!(%run_id, seed, iterations, "Following run");
            }
            Ok(RunEvent::Progress(progress)) => {
                if !options.quiet {
                    line.draw(&progress_line(&progress));
                }
            }
            Ok(RunEvent::Paused { .. } | RunEvent::Resumed { .. }) => {}
            Ok(RunEvent::Completed { report, .. }) => {
                line.finish();
                return Outcome::Completed(report);
            }
            Ok(RunEvent::Stopped { report, .. }) => {
                line.finish();
                return Outcome::Stopped(report);
            }
            Ok(RunEvent::Failed { error, report, .. }) => {
                line.finish();
                return Outcome::Failed { error, report };
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                line.finish();
                return outcome_from_handle(handle);
            }
        }

        if !stop_requested && budget_exceeded(handle, options.time_budget) {
            stop_requested = true;
            tracing::warn!(
                budget_ms = options.time_budget.map(|b| b.as_millis() as u64),
                "Time budget exceeded, stopping run"
            );
            if let Err(e) = handle.stop() {
                // The run finished on its own in the meantime
                tracing::debug!(error = %e, "Stop after time budget was not needed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use lossim_core::{
        BatchSize, ProgressCadence, ReportKind, RiskScenario, RunConfig, TriangularImpact,
        start_run,
    };

    use super::*;

    fn scenarios() -> Vec<RiskScenario> {
        vec![
            RiskScenario::new("storm", 0.3, TriangularImpact::new(5_000.0, 20_000.0, 90_000.0)),
            RiskScenario::new("fraud", 0.1, TriangularImpact::new(1_000.0, 1_500.0, 9_000.0)),
        ]
    }

    #[test]
    fn test_drive_to_completion_draws_progress() {
        let config = RunConfig::new(20_000)
            .with_seed(4)
            .with_progress(ProgressCadence::EveryIterations { count: 1_000 });
        let (handle, events) = start_run(scenarios(), config).unwrap();

        let mut out = Vec::new();
        let outcome = drive(&handle, &events, &DriveOptions::default(), &mut out);

        let Outcome::Completed(report) = outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        assert_eq!(report.iterations_completed, 20_000);
        let drawn = String::from_utf8(out).unwrap();
        assert!(drawn.contains("100.0% | 20,000/20,000 iterations"));
        assert!(drawn.ends_with('\n'));
    }

    #[test]
    fn test_quiet_draws_nothing() {
        let (handle, events) = start_run(scenarios(), RunConfig::new(5_000)).unwrap();
        let options = DriveOptions {
            quiet: true,
            ..Default::default()
        };

        let mut out = Vec::new();
        let outcome = drive(&handle, &events, &options, &mut out);
        assert!(matches!(outcome, Outcome::Completed(_)));
        assert!(out.is_empty());
    }

    #[test]
    fn test_time_budget_stops_run() {
        let config = RunConfig::new(100_000_000)
            .with_seed(8)
            .with_batch_size(BatchSize::fixed(50))
            .with_tick_delay(Duration::from_millis(1));
        let (handle, events) = start_run(scenarios(), config).unwrap();
        let options = DriveOptions {
            quiet: true,
            time_budget: Some(Duration::from_millis(100)),
        };

        let outcome = drive(&handle, &events, &options, &mut Vec::new());
        let Outcome::Stopped(Some(report)) = outcome else {
            panic!("expected a stopped run with a partial report, got {outcome:?}");
        };
        assert_eq!(report.kind, ReportKind::Partial);
        assert!(report.iterations_completed < 100_000_000);
        assert_eq!(handle.status(), RunStatus::Stopped);
    }

    #[test]
    fn test_failure_surfaces_error() {
        let huge = f64::MAX * 0.75;
        let scenarios = vec![
            RiskScenario::new("a", 1.0, TriangularImpact::point(huge)),
            RiskScenario::new("b", 1.0, TriangularImpact::point(huge)),
        ];
        let (handle, events) = start_run(scenarios, RunConfig::new(10)).unwrap();

        let outcome = drive(&handle, &events, &DriveOptions::default(), &mut Vec::new());
        assert!(matches!(
            outcome,
            Outcome::Failed {
                error: EngineError::SamplingFailure { .. },
                report: None,
            }
        ));
    }
}
