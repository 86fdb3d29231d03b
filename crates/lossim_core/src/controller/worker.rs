//! The batch loop executed on a run's background thread

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::{ProgressSnapshot, RunEvent, RunInner, RunShared, RunStatus};
use crate::aggregator::OnlineAggregator;
use crate::error::EngineError;
use crate::model::{ProgressCadence, ReportKind, RunConfig, RunId, ScenarioSet, SimulationReport};
use crate::preview::LivePreview;
use crate::report::{ReportContext, build_report};
use crate::sampler::SampleStream;

const PACING_SEED_MIX: u64 = 0x2545_F491_4F6C_DD1D;

/// What the worker should do after a batch boundary
enum Boundary {
    Continue,
    Exit,
}

/// Single writer of one run's sampling state
pub(super) struct RunWorker {
    shared: Arc<RunShared>,
    run_id: RunId,
    scenarios: ScenarioSet,
    config: RunConfig,
    seed: u64,
    stream: SampleStream,
    /// Drives batch sizes only; never touches the sample stream
    pacing: SmallRng,
    aggregator: OnlineAggregator,
    preview: LivePreview,
    current: u64,
    /// Active time accumulated before the current running segment
    active: Duration,
    segment_start: Instant,
    last_progress_iteration: u64,
    last_progress_at: Duration,
}

impl RunWorker {
    pub(super) fn new(
        shared: Arc<RunShared>,
        run_id: RunId,
        scenarios: ScenarioSet,
        config: RunConfig,
        seed: u64,
    ) -> Self {
        let aggregator =
            OnlineAggregator::for_run(config.iterations, config.exact_sample_limit, seed);
        let preview = LivePreview::new(config.live_preview_capacity);
        Self {
            shared,
            run_id,
            scenarios,
            seed,
            stream: SampleStream::new(seed),
            pacing: SmallRng::seed_from_u64(seed ^ PACING_SEED_MIX),
            aggregator,
            preview,
            current: 0,
            active: Duration::ZERO,
            segment_start: Instant::now(),
            last_progress_iteration: 0,
            last_progress_at: Duration::ZERO,
            config,
        }
    }

    pub(super) fn run(mut self) {
        tracing::info!(
            run_id = %self.run_id,
            seed = self.seed,
            iterations = self.config.iterations,
            scenarios = self.scenarios.len(),
            "Run started"
        );
        self.shared.lock().publish(RunEvent::Started {
            run_id: self.run_id,
            seed: self.seed,
            iterations: self.config.iterations,
        });

        self.segment_start = Instant::now();
        loop {
            if let Boundary::Exit = self.await_boundary() {
                return;
            }

            let batch = self.next_batch_size();
            if let Err(error) = self.run_batch(batch) {
                self.finish_failed(error);
                return;
            }
            tracing::trace!(run_id = %self.run_id, iteration = self.current, batch, "Batch folded");

            if self.current >= self.config.iterations {
                self.finish_completed();
                return;
            }

            self.maybe_emit_progress();

            if let Some(delay) = self.config.tick_delay() {
                thread::sleep(delay);
            }
        }
    }

    fn elapsed(&self) -> Duration {
        self.active + self.segment_start.elapsed()
    }

    fn next_batch_size(&mut self) -> u64 {
        let bounds = self.config.batch_size;
        let size = self.pacing.random_range(bounds.min..=bounds.max) as u64;
        size.min(self.config.iterations - self.current)
    }

    /// Sample and fold `batch` iterations. A non-finite loss stops the batch
    /// before it is folded.
    fn run_batch(&mut self, batch: u64) -> Result<(), EngineError> {
        for _ in 0..batch {
            let loss = self.stream.next_loss(&self.scenarios);
            if !loss.is_finite() {
                return Err(EngineError::SamplingFailure {
                    iteration: self.current,
                    value: loss,
                });
            }
            self.aggregator.fold(loss);
            self.preview.push(loss);
            self.current += 1;
        }
        Ok(())
    }

    fn report(&self, kind: ReportKind, elapsed: Duration) -> Option<Arc<SimulationReport>> {
        let ctx = ReportContext::new(&self.config, &self.scenarios, self.seed, kind, elapsed);
        build_report(&self.aggregator, &ctx).map(Arc::new)
    }

    /// Publish progress into the snapshot and honor pause and stop requests.
    fn await_boundary(&mut self) -> Boundary {
        let shared = Arc::clone(&self.shared);
        let mut inner = shared.lock();
        let mut parked = false;

        loop {
            match inner.status() {
                RunStatus::Running => {
                    if parked {
                        self.segment_start = Instant::now();
                        inner.publish(RunEvent::Resumed {
                            run_id: self.run_id,
                            iteration: self.current,
                        });
                        tracing::info!(run_id = %self.run_id, iteration = self.current, "Run resumed");
                    }
                    inner.snapshot.current_iteration = self.current;
                    inner.snapshot.elapsed = self.elapsed();
                    return Boundary::Continue;
                }
                RunStatus::Paused => {
                    if !parked {
                        parked = true;
                        self.active += self.segment_start.elapsed();
                        inner.snapshot.current_iteration = self.current;
                        inner.snapshot.elapsed = self.active;
                        inner.report = self.report(ReportKind::Partial, self.active);
                        inner.publish(RunEvent::Paused {
                            run_id: self.run_id,
                            iteration: self.current,
                        });
                        tracing::info!(run_id = %self.run_id, iteration = self.current, "Run paused");
                    }
                    inner = shared.wait(inner);
                }
                RunStatus::Stopped => {
                    if !parked {
                        self.active += self.segment_start.elapsed();
                    }
                    self.finish_stopped(&mut inner);
                    return Boundary::Exit;
                }
                status => {
                    // Only this worker moves a run out of Running/Paused other than
                    // by a stop, so anything else means the run was torn down.
                    tracing::warn!(run_id = %self.run_id, %status, "Worker found run in unexpected state");
                    inner.finished = true;
                    shared.wake.notify_all();
                    return Boundary::Exit;
                }
            }
        }
    }

    fn maybe_emit_progress(&mut self) {
        let elapsed = self.elapsed();
        let due = match self.config.progress {
            ProgressCadence::EveryIterations { count } => {
                self.current - self.last_progress_iteration >= count
            }
            ProgressCadence::Interval { millis } => {
                elapsed.saturating_sub(self.last_progress_at) >= Duration::from_millis(millis)
            }
        };
        if due {
            let shared = Arc::clone(&self.shared);
            let mut inner = shared.lock();
            self.emit_progress(&mut inner, elapsed);
        }
    }

    fn emit_progress(&mut self, inner: &mut RunInner, elapsed: Duration) {
        if self.current <= self.last_progress_iteration {
            return;
        }
        self.last_progress_iteration = self.current;
        self.last_progress_at = elapsed;

        let total = self.config.iterations;
        inner.snapshot.current_iteration = self.current;
        inner.snapshot.elapsed = elapsed;
        inner.publish(RunEvent::Progress(ProgressSnapshot {
            run_id: self.run_id,
            current_iteration: self.current,
            total_iterations: total,
            progress_pct: self.current as f64 / total as f64 * 100.0,
            elapsed,
            preview: self.preview.snapshot(),
        }));
    }

    fn finish_completed(&mut self) {
        let elapsed = self.elapsed();
        let shared = Arc::clone(&self.shared);
        let mut inner = shared.lock();

        // A stop that raced the last batch still wins; a pending pause is moot.
        if inner.status() == RunStatus::Stopped {
            self.active = elapsed;
            self.finish_stopped(&mut inner);
            return;
        }

        self.emit_progress(&mut inner, elapsed);
        let report = self.report(ReportKind::Final, elapsed);
        inner.snapshot.status = RunStatus::Completed;
        inner.snapshot.current_iteration = self.current;
        inner.snapshot.elapsed = elapsed;
        inner.report = report.clone();
        if let Some(report) = report {
            tracing::info!(
                run_id = %self.run_id,
                iterations = self.current,
                elapsed_ms = elapsed.as_millis() as u64,
                mean = report.statistics.mean,
                var_95 = report.risk_metrics.var_95,
                "Run completed"
            );
            inner.publish(RunEvent::Completed {
                run_id: self.run_id,
                report,
            });
        }
        inner.finished = true;
        shared.wake.notify_all();
    }

    fn finish_stopped(&mut self, inner: &mut RunInner) {
        let report = self.report(ReportKind::Partial, self.active);
        inner.snapshot.current_iteration = self.current;
        inner.snapshot.elapsed = self.active;
        inner.report = report.clone();
        inner.publish(RunEvent::Stopped {
            run_id: self.run_id,
            report,
        });
        inner.finished = true;
        self.shared.wake.notify_all();
        tracing::info!(run_id = %self.run_id, iteration = self.current, "Run stopped");
    }

    fn finish_failed(&mut self, error: EngineError) {
        let elapsed = self.elapsed();
        let shared = Arc::clone(&self.shared);
        let mut inner = shared.lock();

        tracing::error!(run_id = %self.run_id, error = %error, "Run failed");
        let report = self.report(ReportKind::Partial, elapsed);
        inner.snapshot.status = RunStatus::Failed;
        inner.snapshot.current_iteration = self.current;
        inner.snapshot.elapsed = elapsed;
        inner.report = report.clone();
        inner.publish(RunEvent::Failed {
            run_id: self.run_id,
            error,
            report,
        });
        inner.finished = true;
        shared.wake.notify_all();
    }
}
