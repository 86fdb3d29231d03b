//! Blocking simulation entry point
//!
//! [`run_to_completion`] samples the same per-seed stream as the run controller
//! and folds it in iteration order, so for a given seed both produce the same
//! report (timing aside). With the `parallel` feature, chunks of the stream
//! are sampled on the rayon pool.

use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::aggregator::OnlineAggregator;
use crate::error::{EngineError, Result};
use crate::model::{ReportKind, RunConfig, ScenarioSet, SimulationReport};
use crate::report::{ReportContext, build_report};
use crate::sampler::{STREAM_CHUNK_LEN, draw_seed, sample_chunk};

/// Chunks sampled per parallel window; bounds memory held before folding
const CHUNKS_PER_WINDOW: u64 = 64;

fn sample_window(scenarios: &ScenarioSet, seed: u64, first: u64, last: u64, total: u64) -> Vec<Vec<f64>> {
    let len_of = |chunk: u64| {
        let start = chunk * STREAM_CHUNK_LEN;
        (total - start).min(STREAM_CHUNK_LEN) as usize
    };

    #[cfg(feature = "parallel")]
    let chunks = (first..last)
        .into_par_iter()
        .map(|chunk| sample_chunk(scenarios, seed, chunk, len_of(chunk)))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let chunks = (first..last)
        .map(|chunk| sample_chunk(scenarios, seed, chunk, len_of(chunk)))
        .collect();

    chunks
}

/// Run `config.iterations` iterations on the calling thread (and the rayon
/// pool) and return the final report.
///
/// Fails on an invalid config or when a sampled loss is not finite.
pub fn run_to_completion(scenarios: &ScenarioSet, config: &RunConfig) -> Result<SimulationReport> {
    config.validate()?;

    let seed = config.seed.unwrap_or_else(draw_seed);
    let total = config.iterations;
    let chunk_count = total.div_ceil(STREAM_CHUNK_LEN);
    let start = Instant::now();

    tracing::debug!(seed, iterations = total, chunks = chunk_count, "Running simulation to completion");

    let mut aggregator = OnlineAggregator::for_run(total, config.exact_sample_limit, seed);
    let mut first = 0;
    while first < chunk_count {
        let last = (first + CHUNKS_PER_WINDOW).min(chunk_count);
        for loss in sample_window(scenarios, seed, first, last, total).into_iter().flatten() {
            if !loss.is_finite() {
                tracing::error!(iteration = aggregator.count(), value = loss, "Non-finite loss sampled");
                return Err(EngineError::SamplingFailure {
                    iteration: aggregator.count(),
                    value: loss,
                });
            }
            aggregator.fold(loss);
        }
        first = last;
    }

    let ctx = ReportContext::new(config, scenarios, seed, ReportKind::Final, start.elapsed());
    final_report(&aggregator, &ctx)
}

/// Validated configs run at least one iteration, so `NoSamples` signals a bug
fn final_report(aggregator: &OnlineAggregator, ctx: &ReportContext<'_>) -> Result<SimulationReport> {
    build_report(aggregator, ctx).ok_or(EngineError::NoSamples)
}
