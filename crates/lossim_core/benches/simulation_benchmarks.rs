//! Criterion benchmarks for lossim_core sampling and aggregation
//!
//! Run with: cargo bench -p lossim_core

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use lossim_core::aggregator::OnlineAggregator;
use lossim_core::sampler::{STREAM_CHUNK_LEN, SampleStream, sample_chunk};
use lossim_core::{RiskScenario, RunConfig, ScenarioSet, TriangularImpact, run_to_completion};

fn portfolio(size: usize) -> ScenarioSet {
    let scenarios = (0..size)
        .map(|i| {
            let scale = 1_000.0 * (i + 1) as f64;
            RiskScenario::new(
                format!("scenario-{i}"),
                0.05 + 0.9 * (i as f64 / size as f64),
                TriangularImpact::new(scale, scale * 3.0, scale * 20.0),
            )
        })
        .collect();
    ScenarioSet::new(scenarios).unwrap()
}

fn bench_sample_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_stream");

    for size in [1, 10, 100].iter() {
        let scenarios = portfolio(*size);
        group.bench_with_input(BenchmarkId::new("scenarios", size), size, |b, _| {
            let mut stream = SampleStream::new(42);
            b.iter(|| stream.next_loss(black_box(&scenarios)))
        });
    }

    group.finish();
}

fn bench_fold(c: &mut Criterion) {
    let losses = sample_chunk(&portfolio(10), 7, 0, STREAM_CHUNK_LEN as usize);

    c.bench_function("fold_chunk_exact", |b| {
        b.iter(|| {
            let mut agg = OnlineAggregator::for_run(STREAM_CHUNK_LEN, usize::MAX, 7);
            for loss in &losses {
                agg.fold(black_box(*loss));
            }
            agg
        })
    });

    c.bench_function("fold_chunk_reservoir", |b| {
        b.iter(|| {
            let mut agg = OnlineAggregator::for_run(STREAM_CHUNK_LEN, 256, 7);
            for loss in &losses {
                agg.fold(black_box(*loss));
            }
            agg
        })
    });
}

fn bench_run_to_completion(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_to_completion");
    group.sample_size(10);
    let scenarios = portfolio(10);

    for iterations in [10_000u64, 100_000, 1_000_000].iter() {
        let config = RunConfig::new(*iterations).with_seed(42);
        group.bench_with_input(
            BenchmarkId::new("iterations", iterations),
            iterations,
            |b, _| b.iter(|| run_to_completion(black_box(&scenarios), black_box(&config))),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_sample_stream, bench_fold, bench_run_to_completion);
criterion_main!(benches);
