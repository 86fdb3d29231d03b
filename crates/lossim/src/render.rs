//! Terminal output for progress and reports

use std::fmt::Write as _;
use std::time::Duration;

use clap::ValueEnum;
use color_eyre::eyre::eyre;
use lossim_core::{ProgressSnapshot, QuantileMethod, ReportKind, SimulationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

fn group_thousands(whole: u64) -> String {
    let digits = whole.to_string();
    let mut result = String::new();
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Format a loss amount with thousands separators and two decimals
pub fn format_amount(value: f64) -> String {
    let abs_value = value.abs();
    let mut whole = abs_value.trunc() as u64;
    let mut cents = ((abs_value - whole as f64) * 100.0).round() as u64;
    if cents == 100 {
        whole += 1;
        cents = 0;
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{}.{cents:02}", group_thousands(whole))
}

/// Format a loss amount in compact form (e.g., 2.1M, 450.0K, 50)
pub fn format_compact_amount(value: f64) -> String {
    let abs_value = value.abs();
    let sign = if value < 0.0 { "-" } else { "" };

    if abs_value >= 1_000_000_000.0 {
        format!("{sign}{:.1}B", abs_value / 1_000_000_000.0)
    } else if abs_value >= 1_000_000.0 {
        format!("{sign}{:.1}M", abs_value / 1_000_000.0)
    } else if abs_value >= 1_000.0 {
        format!("{sign}{:.1}K", abs_value / 1_000.0)
    } else {
        format!("{sign}{abs_value:.0}")
    }
}

/// Format a fraction as a percentage
pub fn format_percentage(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

pub fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else {
        let whole = elapsed.as_secs();
        format!("{}m{:02}s", whole / 60, whole % 60)
    }
}

/// One status line for a progress event
pub fn progress_line(progress: &ProgressSnapshot) -> String {
    let mut line = format!(
        "{:5.1}% | {}/{} iterations | {}",
        progress.progress_pct,
        group_thousands(progress.current_iteration),
        group_thousands(progress.total_iterations),
        format_duration(progress.elapsed),
    );
    if !progress.preview.is_empty() {
        let mean = progress.preview.iter().sum::<f64>() / progress.preview.len() as f64;
        let max = progress.preview.iter().copied().fold(f64::MIN, f64::max);
        let _ = write!(
            line,
            " | recent mean {} max {}",
            format_compact_amount(mean),
            format_compact_amount(max)
        );
    }
    line
}

/// Human-readable report summary
pub fn render_text(report: &SimulationReport) -> String {
    let mut out = String::new();
    let stats = &report.statistics;
    let risk = &report.risk_metrics;

    let heading = match report.kind {
        ReportKind::Final => "Simulation report",
        ReportKind::Partial => "Simulation report (PARTIAL)",
    };
    let _ = writeln!(out, "{heading}");
    let _ = writeln!(
        out,
        "  iterations     {} of {}",
        group_thousands(report.iterations_completed),
        group_thousands(report.iterations_requested)
    );
    let _ = writeln!(out, "  seed           {}", report.seed_used);
    let _ = writeln!(
        out,
        "  time           {}",
        format_duration(Duration::from_millis(report.execution_time_ms))
    );
    let method = match report.quantile_method {
        QuantileMethod::Exact => "exact".to_string(),
        QuantileMethod::Reservoir { capacity } => {
            format!("reservoir of {}", group_thousands(capacity as u64))
        }
    };
    let _ = writeln!(out, "  quantiles      {method}");

    let _ = writeln!(out, "\nStatistics");
    for (label, value) in [
        ("mean", stats.mean),
        ("median", stats.median),
        ("std dev", stats.std_dev),
        ("std error", stats.standard_error),
        ("min", stats.min),
        ("max", stats.max),
    ] {
        let _ = writeln!(out, "  {label:<14} {}", format_amount(value));
    }
    let _ = writeln!(out, "  {:<14} {:.4}", "skewness", stats.skewness);
    let _ = writeln!(out, "  {:<14} {:.4}", "kurtosis", stats.kurtosis);
    let _ = writeln!(
        out,
        "  {:<14} {} ({})",
        "expected (EAL)",
        format_amount(report.expected_annual_loss),
        if report.converged { "converged" } else { "not converged" }
    );

    let _ = writeln!(out, "\nPercentiles");
    for (percent, value) in report.percentiles.as_pairs() {
        let _ = writeln!(out, "  p{percent:<13} {}", format_amount(value));
    }

    let _ = writeln!(out, "\nRisk metrics");
    let _ = writeln!(out, "  {:<14} {}", "VaR 95%", format_amount(risk.var_95));
    let _ = writeln!(out, "  {:<14} {}", "VaR 99%", format_amount(risk.var_99));
    let _ = writeln!(
        out,
        "  {:<14} {}",
        "ES (CVaR) 95%",
        format_amount(risk.expected_shortfall)
    );
    let _ = writeln!(
        out,
        "  {:<14} {} (loss > {})",
        "P(ruin)",
        format_percentage(risk.probability_of_ruin),
        format_amount(risk.ruin_threshold)
    );
    let _ = writeln!(
        out,
        "  {:<14} {}",
        "P(any loss)",
        format_percentage(risk.probability_of_loss)
    );

    if !report.confidence_intervals.is_empty() {
        let _ = writeln!(out, "\nConfidence intervals");
        for ci in &report.confidence_intervals {
            let _ = writeln!(
                out,
                "  {:<14} [{}, {}]",
                format_percentage(ci.level),
                format_amount(ci.lower),
                format_amount(ci.upper)
            );
        }
    }

    out
}

pub fn render_report(report: &SimulationReport, format: OutputFormat) -> color_eyre::Result<String> {
    Ok(match format {
        OutputFormat::Text => render_text(report),
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Yaml => serde_saphyr::to_string(report)
            .map_err(|e| eyre!("Failed to render report as YAML: {e}"))?,
    })
}
