//! Run controller: drives a simulation on a background thread.
//!
//! A [`RunHandle`] owns one run slot. `start` validates its inputs, spawns a
//! worker thread and returns immediately. The worker is the only writer of the
//! run's aggregator and iteration counter; callers observe the run through
//! copies it publishes (snapshots, reports, and events on subscribed
//! channels).
//!
//! Control calls take effect at the next batch boundary. A batch in flight is
//! always folded completely before a pause or stop is honored.
//!
//! ```ignore
//! let (handle, events) = start_run(scenarios, RunConfig::new(100_000).with_seed(7))?;
//! for event in events.iter() {
//!     if let RunEvent::Progress(p) = &event {
//!         println!("{:.1}%", p.progress_pct);
//!     }
//!     if event.is_terminal() {
//!         break;
//!     }
//! }
//! let report = handle.report();
//! ```

mod events;
mod state;
mod worker;

use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub use events::{ProgressSnapshot, RunEvent};
pub use state::{ControlAction, RunSnapshot, RunStatus};

use crate::error::{EngineError, Result};
use crate::model::{RiskScenario, RunConfig, RunId, ScenarioSet, SimulationReport};
use crate::sampler::draw_seed;
use worker::RunWorker;

/// What `RunHandle::report` can hand back
#[derive(Debug, Clone, PartialEq)]
pub enum ReportStatus {
    Final(Arc<SimulationReport>),
    Partial(Arc<SimulationReport>),
    NotAvailable,
}

impl ReportStatus {
    pub fn report(&self) -> Option<&Arc<SimulationReport>> {
        match self {
            ReportStatus::Final(report) | ReportStatus::Partial(report) => Some(report),
            ReportStatus::NotAvailable => None,
        }
    }
}

/// State shared between a handle and its worker
pub(crate) struct RunShared {
    pub(crate) inner: Mutex<RunInner>,
    pub(crate) wake: Condvar,
}

pub(crate) struct RunInner {
    pub(crate) snapshot: RunSnapshot,
    pub(crate) report: Option<Arc<SimulationReport>>,
    /// Set by the worker once it has published its terminal event
    pub(crate) finished: bool,
    subscribers: Vec<Sender<RunEvent>>,
}

impl RunInner {
    pub(crate) fn status(&self) -> RunStatus {
        self.snapshot.status
    }

    /// Push `event` to every live subscriber, dropping closed channels
    pub(crate) fn publish(&mut self, event: RunEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

impl RunShared {
    fn new() -> Self {
        Self {
            inner: Mutex::new(RunInner {
                snapshot: RunSnapshot::default(),
                report: None,
                finished: true,
                subscribers: Vec::new(),
            }),
            wake: Condvar::new(),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, RunInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn wait<'a>(&self, guard: MutexGuard<'a, RunInner>) -> MutexGuard<'a, RunInner> {
        self.wake.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owner of the run slot; stops and joins the worker when the last handle goes away
struct RunController {
    shared: Arc<RunShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RunController {
    fn worker_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn join(handle: JoinHandle<()>) {
        if handle.join().is_err() {
            tracing::error!("Run worker panicked");
        }
    }
}

impl Drop for RunController {
    fn drop(&mut self) {
        {
            let mut inner = self.shared.lock();
            if inner.status().is_active() {
                inner.snapshot.status = RunStatus::Stopped;
                self.shared.wake.notify_all();
            }
        }
        if let Some(handle) = self.worker_slot().take() {
            Self::join(handle);
        }
    }
}

/// Clonable handle to a run slot
#[derive(Clone)]
pub struct RunHandle {
    controller: Arc<RunController>,
}

impl Default for RunHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl RunHandle {
    /// A handle in the `Idle` state
    pub fn new() -> Self {
        Self {
            controller: Arc::new(RunController {
                shared: Arc::new(RunShared::new()),
                worker: Mutex::new(None),
            }),
        }
    }

    fn shared(&self) -> &RunShared {
        &self.controller.shared
    }

    /// Register a new event feed. Events published before the call are not replayed.
    pub fn subscribe(&self) -> Receiver<RunEvent> {
        let (tx, rx) = channel();
        self.shared().lock().subscribers.push(tx);
        rx
    }

    /// Start a run. Valid from `Idle` and from any terminal state, in which case
    /// the previous run's state and report are discarded.
    pub fn start(&self, scenarios: ScenarioSet, config: RunConfig) -> Result<RunId> {
        config.validate()?;

        // Held for the whole call so concurrent starts and stops serialize
        let mut worker_slot = self.controller.worker_slot();

        self.shared().lock().status().apply(ControlAction::Start)?;

        // The previous worker, if any, has already published its terminal event
        if let Some(previous) = worker_slot.take() {
            RunController::join(previous);
        }

        let seed = config.seed.unwrap_or_else(draw_seed);
        let run_id = RunId(self.shared().lock().snapshot.run_id.0 + 1);
        let total_iterations = config.iterations;

        // Allocates the run's buffers; the published snapshot is untouched until it returns
        let worker = RunWorker::new(
            Arc::clone(&self.controller.shared),
            run_id,
            scenarios,
            config,
            seed,
        );

        let previous_status = {
            let mut inner = self.shared().lock();
            let previous_status = inner.status();
            let status = previous_status.apply(ControlAction::Start)?;
            inner.snapshot = RunSnapshot {
                run_id,
                status,
                current_iteration: 0,
                total_iterations,
                started_at: Some(jiff::Timestamp::now()),
                elapsed: Duration::ZERO,
                seed: Some(seed),
            };
            inner.report = None;
            inner.finished = false;
            previous_status
        };

        let spawned = thread::Builder::new()
            .name(format!("lossim-{run_id}"))
            .spawn(move || worker.run());

        match spawned {
            Ok(handle) => {
                *worker_slot = Some(handle);
                Ok(run_id)
            }
            Err(e) => {
                let mut inner = self.shared().lock();
                inner.snapshot.status = previous_status;
                inner.finished = true;
                tracing::error!(run_id = %run_id, error = %e, "Failed to spawn run worker");
                Err(EngineError::WorkerSpawn(e.to_string()))
            }
        }
    }

    /// Validate raw scenarios and start a run with them
    pub fn start_scenarios(&self, scenarios: Vec<RiskScenario>, config: RunConfig) -> Result<RunId> {
        let scenarios = ScenarioSet::new(scenarios)?;
        self.start(scenarios, config)
    }

    /// Freeze the run at the next batch boundary. Pausing a paused run is rejected.
    pub fn pause(&self) -> Result<()> {
        let mut inner = self.shared().lock();
        inner.snapshot.status = inner.status().apply(ControlAction::Pause)?;
        tracing::info!(run_id = %inner.snapshot.run_id, "Pause requested");
        Ok(())
    }

    pub fn resume(&self) -> Result<()> {
        let mut inner = self.shared().lock();
        inner.snapshot.status = inner.status().apply(ControlAction::Resume)?;
        self.shared().wake.notify_all();
        tracing::info!(run_id = %inner.snapshot.run_id, "Resume requested");
        Ok(())
    }

    /// Stop the run. Blocks until the worker reaches its next batch boundary and
    /// publishes the partial report, which stays available afterwards.
    pub fn stop(&self) -> Result<()> {
        let mut worker_slot = self.controller.worker_slot();
        {
            let mut inner = self.shared().lock();
            inner.snapshot.status = inner.status().apply(ControlAction::Stop)?;
            self.shared().wake.notify_all();
            tracing::info!(run_id = %inner.snapshot.run_id, "Stop requested");
        }
        if let Some(handle) = worker_slot.take() {
            RunController::join(handle);
        }
        Ok(())
    }

    pub fn status(&self) -> RunStatus {
        self.shared().lock().status()
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.shared().lock().snapshot.clone()
    }

    /// Latest report: final after completion, partial while paused or after a
    /// stop or failure, otherwise not available.
    pub fn report(&self) -> ReportStatus {
        match &self.shared().lock().report {
            Some(report) if report.is_partial() => ReportStatus::Partial(Arc::clone(report)),
            Some(report) => ReportStatus::Final(Arc::clone(report)),
            None => ReportStatus::NotAvailable,
        }
    }

    /// Block until the current run has published its terminal event.
    /// Returns immediately for an idle handle; waits indefinitely while paused.
    pub fn wait(&self) -> ReportStatus {
        {
            let mut inner = self.shared().lock();
            while !inner.finished {
                inner = self.shared().wait(inner);
            }
        }
        self.report()
    }
}

/// Validate `scenarios` and `config`, then start a run on a fresh handle.
///
/// The returned receiver is subscribed before the run starts, so it sees every
/// event of the run.
pub fn start_run(
    scenarios: Vec<RiskScenario>,
    config: RunConfig,
) -> Result<(RunHandle, Receiver<RunEvent>)> {
    let scenarios = ScenarioSet::new(scenarios)?;
    config.validate()?;

    let handle = RunHandle::new();
    let events = handle.subscribe();
    handle.start(scenarios, config)?;
    Ok((handle, events))
}
