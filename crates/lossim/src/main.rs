use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::WrapErr;
use lossim::{DriveOptions, Outcome, OutputFormat, ScenarioFile, drive, init_logging, render_report};
use lossim_core::start_run;

#[derive(Parser, Debug)]
#[command(name = "lossim")]
#[command(about = "Monte Carlo aggregate-loss simulator")]
struct Args {
    /// YAML file with the risk scenarios and optional run settings
    scenario_file: PathBuf,

    /// Number of iterations (overrides the file)
    #[arg(short = 'n', long)]
    iterations: Option<u64>,

    /// Seed for a reproducible run (overrides the file)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Report output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Do not draw live progress
    #[arg(short, long)]
    quiet: bool,

    /// Stop the run after this many seconds and report what was sampled
    #[arg(long)]
    time_budget_secs: Option<f64>,

    /// Path to the data directory (default: ~/.lossim/)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".lossim")
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let data_dir = args.data_dir.unwrap_or_else(default_data_dir);

    init_logging(&data_dir, &args.log_level)?;

    let file = ScenarioFile::load(&args.scenario_file)?;
    let mut config = file.run.to_run_config()?;
    if let Some(iterations) = args.iterations {
        config.iterations = iterations;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }

    let time_budget = args
        .time_budget_secs
        .map(Duration::try_from_secs_f64)
        .transpose()
        .wrap_err("Invalid --time-budget-secs")?;

    let (handle, events) =
        start_run(file.to_scenarios(), config).wrap_err("Invalid simulation input")?;

    let options = DriveOptions {
        quiet: args.quiet,
        time_budget,
    };
    let outcome = drive(&handle, &events, &options, &mut io::stderr().lock());

    if let Some(report) = outcome.report() {
        let rendered = render_report(report, args.format)?;
        let mut stdout = io::stdout().lock();
        stdout.write_all(rendered.as_bytes())?;
        if !rendered.ends_with('\n') {
            writeln!(stdout)?;
        }
    }

    match outcome {
        Outcome::Completed(_) => {
            tracing::info!("Simulation complete");
            Ok(())
        }
        Outcome::Stopped(report) => {
            if report.is_none() {
                eprintln!("Run stopped before any iteration completed");
            }
            tracing::info!("Simulation stopped early");
            Ok(())
        }
        Outcome::Failed { error, .. } => Err(error).wrap_err("Simulation failed"),
    }
}
