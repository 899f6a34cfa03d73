use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use lapse_core::app::{App, AppBuilder};
use lapse_core::domain::SweepReport;
use lapse_core::observability::init_tracing;
use lapse_core::settings::Settings;
use tracing::info;

#[derive(Parser)]
#[command(name = "lapse", about = "Expires quotes whose completion date has passed")]
struct Cli {
    /// Config file (toml/yaml/json). Defaults to config/lapse.* when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single sweep and print its report
    RunOnce {
        /// Evaluate deadlines as of this date instead of the current UTC date
        #[arg(long, value_name = "YYYY-MM-DD")]
        today: Option<NaiveDate>,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sweep once a day at schedule.run_at until interrupted
    Serve,
    /// Validate configuration and print the effective settings
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref()).context("loading configuration")?;
    init_tracing(&settings.logging);

    match cli.command {
        Command::Check => check(settings),
        Command::RunOnce { today, json } => run_once(build(settings)?, today, json).await,
        Command::Serve => serve(build(settings)?).await,
    }
}

fn build(settings: Settings) -> Result<App> {
    AppBuilder::new(settings)
        .build()
        .context("invalid configuration")
}

fn check(settings: Settings) -> Result<()> {
    settings.validate().context("invalid configuration")?;
    println!("{}", serde_json::to_string_pretty(&settings.redacted())?);
    println!("configuration ok");
    Ok(())
}

async fn run_once(app: App, today: Option<NaiveDate>, json: bool) -> Result<()> {
    let report = match today {
        Some(today) => app.run_for(today).await,
        None => app.run_once().await,
    }
    .context("sweep failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn print_summary(report: &SweepReport) {
    println!(
        "{} ({}): {} quotes, {} expired, {} cancelled, {} failed, {} unevaluable, {} reconciled",
        report.sweep_id,
        report.today,
        report.total,
        report.expired,
        report.transitioned,
        report.failures.len(),
        report.unevaluable.len(),
        report.reconciled,
    );
    for failure in &report.failures {
        println!(
            "  failed  {} at {}: {}",
            failure.quote_id, failure.step, failure.reason
        );
    }
    for skipped in &report.unevaluable {
        println!(
            "  skipped {} ({} = {:?}): {}",
            skipped.quote_id, skipped.field, skipped.raw, skipped.reason
        );
    }
}

async fn serve(app: App) -> Result<()> {
    info!(run_at = %app.run_at(), "starting lapse");
    let handle = app.serve();

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown signal received");

    handle.shutdown_and_join().await;
    Ok(())
}
