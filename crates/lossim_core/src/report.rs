//! Turning aggregator state into a [`SimulationReport`]
//!
//! Percentiles use the index convention `min(floor(n · K / 100), n - 1)` into
//! the ascending retained samples, computed in integer basis points so no
//! float rounding moves a rank. VaR figures are the p95 and p99 cuts.

use std::time::Duration;

use crate::aggregator::OnlineAggregator;
use crate::model::{
    ConfidenceInterval, Percentiles, ReportKind, RiskMetrics, RunConfig, ScenarioSet,
    SimulationReport, Statistics,
};

const BASIS_POINTS: u64 = 10_000;

/// Everything besides the aggregator that goes into a report
#[derive(Debug, Clone)]
pub struct ReportContext<'a> {
    pub kind: ReportKind,
    pub iterations_requested: u64,
    pub seed: u64,
    pub execution_time: Duration,
    pub ruin_multiplier: f64,
    pub confidence_levels: &'a [f64],
    pub convergence_threshold: f64,
    pub expected_annual_loss: f64,
}

impl<'a> ReportContext<'a> {
    pub fn new(
        config: &'a RunConfig,
        scenarios: &ScenarioSet,
        seed: u64,
        kind: ReportKind,
        execution_time: Duration,
    ) -> Self {
        Self {
            kind,
            iterations_requested: config.iterations,
            seed,
            execution_time,
            ruin_multiplier: config.ruin_multiplier,
            confidence_levels: &config.confidence_levels,
            convergence_threshold: config.convergence_threshold,
            expected_annual_loss: scenarios.expected_annual_loss(),
        }
    }
}

/// Index into an ascending slice of `len > 0` values for a quantile given in
/// basis points.
#[inline]
pub fn quantile_index(len: usize, basis_points: u64) -> usize {
    debug_assert!(len > 0);
    ((len as u64 * basis_points / BASIS_POINTS) as usize).min(len - 1)
}

/// Percentile `percent` of an ascending, non-empty slice
#[inline]
pub fn percentile(sorted: &[f64], percent: u8) -> f64 {
    sorted[quantile_index(sorted.len(), percent as u64 * 100)]
}

fn median(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Mean of the values at or above `threshold`
fn tail_mean(sorted: &[f64], threshold: f64) -> f64 {
    let start = sorted.partition_point(|v| *v < threshold);
    let tail = &sorted[start..];
    let mean = tail.iter().sum::<f64>() / tail.len() as f64;
    // summation rounding can land a hair under the threshold
    mean.max(threshold)
}

fn fraction_above(sorted: &[f64], threshold: f64) -> f64 {
    let above = sorted.len() - sorted.partition_point(|v| *v <= threshold);
    above as f64 / sorted.len() as f64
}

fn confidence_interval(sorted: &[f64], level: f64) -> ConfidenceInterval {
    let lower_bp = ((1.0 - level) / 2.0 * BASIS_POINTS as f64).round() as u64;
    let upper_bp = BASIS_POINTS - lower_bp;
    ConfidenceInterval {
        level,
        lower: sorted[quantile_index(sorted.len(), lower_bp)],
        upper: sorted[quantile_index(sorted.len(), upper_bp)],
    }
}

/// Build a report from the current aggregator state.
///
/// Returns `None` when nothing has been folded yet.
pub fn build_report(agg: &OnlineAggregator, ctx: &ReportContext<'_>) -> Option<SimulationReport> {
    let (min, max) = (agg.min()?, agg.max()?);
    let sorted = agg.sorted_samples();
    if sorted.is_empty() {
        return None;
    }

    let moments = agg.moments();
    let mean = moments.mean();
    let std_dev = moments.std_dev();
    let standard_error = moments.standard_error();

    let percentiles = Percentiles {
        p5: percentile(&sorted, 5),
        p10: percentile(&sorted, 10),
        p25: percentile(&sorted, 25),
        p50: percentile(&sorted, 50),
        p75: percentile(&sorted, 75),
        p90: percentile(&sorted, 90),
        p95: percentile(&sorted, 95),
        p99: percentile(&sorted, 99),
    };

    let ruin_threshold = ctx.ruin_multiplier * mean;
    let risk_metrics = RiskMetrics {
        var_95: percentiles.p95,
        var_99: percentiles.p99,
        expected_shortfall: tail_mean(&sorted, percentiles.p95),
        probability_of_ruin: fraction_above(&sorted, ruin_threshold),
        ruin_threshold,
        probability_of_loss: agg.probability_of_loss(),
    };

    let converged = if mean == 0.0 {
        std_dev == 0.0
    } else {
        standard_error / mean.abs() <= ctx.convergence_threshold
    };

    Some(SimulationReport {
        kind: ctx.kind,
        statistics: Statistics {
            mean,
            median: median(&sorted),
            std_dev,
            skewness: moments.skewness(),
            kurtosis: moments.kurtosis(),
            min,
            max,
            standard_error,
        },
        percentiles,
        risk_metrics,
        confidence_intervals: ctx
            .confidence_levels
            .iter()
            .map(|level| confidence_interval(&sorted, *level))
            .collect(),
        iterations_completed: agg.count(),
        iterations_requested: ctx.iterations_requested,
        execution_time_ms: ctx.execution_time.as_millis() as u64,
        seed_used: ctx.seed,
        quantile_method: agg.quantile_method(),
        expected_annual_loss: ctx.expected_annual_loss,
        converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuantileMethod, RiskScenario, TriangularImpact};

    fn context(config: &RunConfig) -> ReportContext<'_> {
        let set = ScenarioSet::new(vec![RiskScenario::new(
            "a",
            1.0,
            TriangularImpact::new(1.0, 50.0, 100.0),
        )])
        .unwrap();
        ReportContext::new(config, &set, 7, ReportKind::Final, Duration::from_millis(12))
    }

    fn aggregator(values: impl IntoIterator<Item = f64>) -> OnlineAggregator {
        let values: Vec<f64> = values.into_iter().collect();
        let mut agg = OnlineAggregator::for_run(values.len() as u64, values.len().max(1), 0);
        for v in values {
            agg.fold(v);
        }
        agg
    }

    #[test]
    fn test_quantile_index_convention() {
        // floor(n * K / 100), clamped to the last element
        assert_eq!(quantile_index(100, 9_500), 95);
        assert_eq!(quantile_index(100, 500), 5);
        assert_eq!(quantile_index(10, 10_000), 9);
        assert_eq!(quantile_index(1, 9_900), 0);
        assert_eq!(quantile_index(7, 5_000), 3);
        assert_eq!(quantile_index(20, 250), 0);
    }

    #[test]
    fn test_percentiles_on_one_to_hundred() {
        let config = RunConfig::new(100);
        let agg = aggregator((1..=100).map(f64::from));
        let report = build_report(&agg, &context(&config)).unwrap();

        assert_eq!(report.percentiles.p5, 6.0);
        assert_eq!(report.percentiles.p50, 51.0);
        assert_eq!(report.percentiles.p95, 96.0);
        assert_eq!(report.percentiles.p99, 100.0);
        assert_eq!(report.statistics.median, 50.5);
        assert_eq!(report.risk_metrics.var_95, 96.0);
        // mean of 96..=100
        assert_eq!(report.risk_metrics.expected_shortfall, 98.0);
        assert_eq!(report.statistics.min, 1.0);
        assert_eq!(report.statistics.max, 100.0);
        assert_eq!(report.iterations_completed, 100);
        assert_eq!(report.execution_time_ms, 12);
        assert_eq!(report.seed_used, 7);
        assert_eq!(report.quantile_method, QuantileMethod::Exact);
        assert!((report.expected_annual_loss - 151.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_ruin_uses_multiplier_of_mean() {
        let mut values = vec![0.0; 98];
        values.extend([500.0, 1_000.0]);
        // mean = 15, threshold at 10x = 150
        let config = RunConfig::new(100);
        let report = build_report(&aggregator(values.clone()), &context(&config)).unwrap();
        assert!((report.risk_metrics.ruin_threshold - 150.0).abs() < 1e-9);
        assert_eq!(report.risk_metrics.probability_of_ruin, 0.02);
        assert_eq!(report.risk_metrics.probability_of_loss, 0.02);

        let config = RunConfig::new(100).with_ruin_multiplier(50.0);
        let report = build_report(&aggregator(values), &context(&config)).unwrap();
        assert!((report.risk_metrics.ruin_threshold - 750.0).abs() < 1e-9);
        assert_eq!(report.risk_metrics.probability_of_ruin, 0.01);
    }

    #[test]
    fn test_confidence_intervals() {
        let config = RunConfig::new(1_000);
        let agg = aggregator((0..1_000).map(f64::from));
        let report = build_report(&agg, &context(&config)).unwrap();

        assert_eq!(report.confidence_intervals.len(), 2);
        let ci95 = report.confidence_intervals[0];
        assert_eq!(ci95.level, 0.95);
        assert_eq!(ci95.lower, 25.0);
        assert_eq!(ci95.upper, 975.0);
        let ci99 = report.confidence_intervals[1];
        assert_eq!(ci99.lower, 5.0);
        assert_eq!(ci99.upper, 995.0);
    }

    #[test]
    fn test_all_zero_losses() {
        let config = RunConfig::new(50);
        let report = build_report(&aggregator(vec![0.0; 50]), &context(&config)).unwrap();
        assert_eq!(report.statistics.mean, 0.0);
        assert!(report.percentiles.as_pairs().iter().all(|(_, v)| *v == 0.0));
        assert_eq!(report.risk_metrics.expected_shortfall, 0.0);
        assert_eq!(report.risk_metrics.probability_of_ruin, 0.0);
        assert!(report.converged);
    }

    #[test]
    fn test_empty_aggregator_has_no_report() {
        let config = RunConfig::new(10);
        let agg = OnlineAggregator::for_run(10, 10, 0);
        assert!(build_report(&agg, &context(&config)).is_none());
    }

    #[test]
    fn test_expected_shortfall_with_ties_at_threshold() {
        let mut values = vec![1.0; 90];
        values.extend(vec![5.0; 10]);
        let config = RunConfig::new(100);
        let report = build_report(&aggregator(values), &context(&config)).unwrap();
        assert_eq!(report.risk_metrics.var_95, 5.0);
        assert_eq!(report.risk_metrics.expected_shortfall, 5.0);
    }
}
