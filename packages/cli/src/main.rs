#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the jam-watch run monitor.
//!
//! Each invocation runs one cycle to completion: `fetch` captures a new run
//! and reports on it, `report` and `lookup` work on the latest run already
//! on disk.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use jam_watch_analytics_models::EventFilter;
use jam_watch_monitor::{Monitor, MonitorConfig, MonitorContext, RunReport};
use jam_watch_source::CsvExportSource;

#[derive(Parser)]
#[command(name = "jam_watch", about = "GPS jamming run monitor")]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding run files (overrides config and `JAM_WATCH_RUNS_DIR`)
    #[arg(long, global = true)]
    runs_dir: Option<PathBuf>,
    /// Number of runs in the trend/persistence window (2-10)
    #[arg(long, global = true)]
    window: Option<usize>,
    /// Entity-count increase (percent) that raises a surge alert
    #[arg(long, global = true)]
    threshold: Option<f64>,
    /// Do not compare the active run with the previous one
    #[arg(long, global = true)]
    no_compare: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a new run from an exported event table and report on it
    Fetch {
        /// CSV export of the upstream event table
        #[arg(long)]
        input: PathBuf,
        /// Identifier to log the source under
        #[arg(long)]
        source_id: Option<String>,
    },
    /// Report on the latest run
    Report,
    /// List run files, oldest first
    Runs,
    /// Look up events of the latest run
    Lookup {
        /// Exact vessel ID
        #[arg(long)]
        vessel: Option<i64>,
        /// Case-insensitive region substring
        #[arg(long)]
        region: Option<String>,
        /// First day to include (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day to include (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
}

impl Cli {
    fn monitor_config(&self) -> Result<MonitorConfig, Box<dyn std::error::Error>> {
        let config = match &self.config {
            Some(path) => MonitorConfig::load(path)?,
            None => MonitorConfig::default(),
        };
        let mut config = config.with_env_overrides();

        if let Some(dir) = &self.runs_dir {
            config.runs_dir.clone_from(dir);
        }
        if let Some(window) = self.window {
            config.trend_window = window;
        }
        if let Some(threshold) = self.threshold {
            config.surge_threshold_pct = threshold;
        }
        if self.no_compare {
            config.compare_previous = false;
        }

        Ok(config)
    }
}

fn print_report(report: &RunReport) -> Result<(), Box<dyn std::error::Error>> {
    if report.is_first_run() {
        log::info!("{}: first run, all vessels are baseline", report.run_name);
    }
    for skipped in &report.skipped_runs {
        log::warn!("Skipped {}: {}", skipped.name, skipped.reason);
    }
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let config = cli.monitor_config()?;
    log::debug!("Using runs directory {}", config.runs_dir.display());
    let monitor = Monitor::new(config);

    match cli.command {
        Commands::Fetch { input, source_id } => {
            let mut source = CsvExportSource::new(input);
            if let Some(id) = source_id.as_deref() {
                source = source.with_id(id);
            }

            let mut ctx = MonitorContext::new();
            let run = monitor.fetch(&mut ctx, &source).await?;
            log::info!("Captured {}", run.name);

            print_report(&monitor.report(&ctx)?)?;
        }
        Commands::Report => {
            let ctx = monitor.resume()?;
            print_report(&monitor.report(&ctx)?)?;
        }
        Commands::Runs => {
            let runs = monitor.store().list_runs();
            if runs.is_empty() {
                println!("No runs yet in {}", monitor.store().dir().display());
            }
            for run in &runs {
                println!("{:<32} {}", run.name, run.saved_at.to_rfc3339());
            }
        }
        Commands::Lookup {
            vessel,
            region,
            from,
            to,
        } => {
            let ctx = monitor.resume()?;
            let filter = EventFilter {
                entity_id: vessel,
                region_contains: region,
                from,
                to,
            };
            let events = monitor.lookup(&ctx, &filter)?;
            log::info!("Events found: {}", events.len());
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
    }

    Ok(())
}
