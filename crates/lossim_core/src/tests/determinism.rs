//! Tests for seeded reproducibility
//!
//! These tests verify:
//! - Two controller runs with the same seed produce the same report
//! - The controller and the blocking entry point agree for a seed
//! - Batch sizes and progress cadence do not affect outcomes

use std::time::Duration;

use super::controller::drain_until_terminal;
use super::mixed_portfolio;
use crate::controller::{RunEvent, start_run};
use crate::model::{BatchSize, ProgressCadence, RunConfig, SimulationReport};
use crate::simulation::run_to_completion;

fn completed_report(config: RunConfig) -> SimulationReport {
    let (_handle, events) = start_run(mixed_portfolio().to_vec(), config).unwrap();
    match drain_until_terminal(&events).pop() {
        Some(RunEvent::Completed { report, .. }) => (*report).clone(),
        other => panic!("expected completion, got {other:?}"),
    }
}

#[test]
fn test_same_seed_same_report() {
    let a = completed_report(RunConfig::new(20_000).with_seed(42));
    let b = completed_report(RunConfig::new(20_000).with_seed(42));
    assert!(a.same_outcome(&b));
    assert_eq!(a.seed_used, 42);
}

#[test]
fn test_different_seeds_differ() {
    let a = completed_report(RunConfig::new(20_000).with_seed(1));
    let b = completed_report(RunConfig::new(20_000).with_seed(2));
    assert_ne!(a.statistics.mean, b.statistics.mean);
}

#[test]
fn test_controller_matches_blocking_run() {
    let config = RunConfig::new(30_000).with_seed(99);
    let streamed = completed_report(config.clone());
    let blocking = run_to_completion(&mixed_portfolio(), &config).unwrap();
    assert!(streamed.same_outcome(&blocking));
}

#[test]
fn test_batching_does_not_change_outcome() {
    let base = RunConfig::new(15_000).with_seed(7);
    let small = completed_report(base.clone().with_batch_size(BatchSize::fixed(1)));
    let large = completed_report(
        base.with_batch_size(BatchSize { min: 500, max: 2_000 })
            .with_progress(ProgressCadence::EveryIterations { count: 3 })
            .with_tick_delay(Duration::ZERO),
    );
    assert!(small.same_outcome(&large));
}

#[test]
fn test_unseeded_run_records_seed() {
    let report = completed_report(RunConfig::new(2_000));
    let replay = run_to_completion(
        &mixed_portfolio(),
        &RunConfig::new(2_000).with_seed(report.seed_used),
    )
    .unwrap();
    assert!(report.same_outcome(&replay));
}
