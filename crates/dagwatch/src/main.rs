//! dagwatch CLI - workflow failure-streak monitor.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dagwatch::server::{run_server, ServerState};
use dagwatch::{
    AirflowSource, BatchOutcome, BatchReport, FileSnapshotStore, FileSource, Monitor,
    MonitorConfig, RunHistorySource, SnapshotStore,
};

/// dagwatch - alert on workflows whose latest runs keep failing.
#[derive(Parser)]
#[command(name = "dagwatch")]
#[command(about = "Workflow failure-streak monitor")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the JSON configuration file
    #[arg(short, long, global = true, env = "DAGWATCH_CONFIG", default_value = "dagwatch.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SourceKind {
    /// Airflow stable REST API
    Airflow,
    /// JSON history export
    File,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate run history and publish the alert snapshot
    Run {
        /// Where run history comes from
        #[arg(long, value_enum, default_value = "airflow")]
        source: SourceKind,

        /// History export, required with `--source file`
        #[arg(long)]
        history: Option<PathBuf>,

        /// Repeat every N seconds instead of running once
        #[arg(long)]
        interval: Option<u64>,

        /// Print the batch report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Serve the published snapshot over HTTP
    Serve {
        /// Listen address (overrides the config file)
        #[arg(long)]
        addr: Option<String>,
    },

    /// Print the currently published snapshot
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("dagwatch=debug,info")
    } else {
        EnvFilter::new("dagwatch=info,warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Run {
            source,
            history,
            interval,
            json,
        } => run_command(&config, source, history.as_deref(), interval, json).await,
        Commands::Serve { addr } => serve_command(&config, addr).await,
        Commands::Show => show_command(&config).await,
    }
}

fn load_config(path: &Path) -> Result<MonitorConfig> {
    if path.exists() {
        MonitorConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))
    } else {
        info!(path = %path.display(), "Config file not found, using defaults");
        let mut config = MonitorConfig::default();
        config.apply_env();
        Ok(config)
    }
}

fn build_source(
    config: &MonitorConfig,
    kind: SourceKind,
    history: Option<&Path>,
) -> Result<Arc<dyn RunHistorySource>> {
    match kind {
        SourceKind::Airflow => {
            let source = AirflowSource::new(config.airflow.clone())
                .context("Failed to create Airflow client")?;
            Ok(Arc::new(source))
        }
        SourceKind::File => {
            let path = history.context("--history is required with --source file")?;
            Ok(Arc::new(FileSource::new(path)))
        }
    }
}

async fn run_command(
    config: &MonitorConfig,
    kind: SourceKind,
    history: Option<&Path>,
    interval: Option<u64>,
    json: bool,
) -> Result<()> {
    let source = build_source(config, kind, history)?;
    let store = Arc::new(FileSnapshotStore::new(&config.snapshot_path));
    let monitor = Monitor::new(config, source, store).context("Invalid configuration")?;

    let Some(secs) = interval else {
        let report = monitor.run_batch(Utc::now()).await.context("Batch failed")?;
        return print_report(&report, json);
    };

    let mut ticker = batch_ticker(secs);
    loop {
        ticker.tick().await;
        match monitor.run_batch(Utc::now()).await {
            Ok(report) => print_report(&report, json)?,
            Err(e) => error!(error = %e, "Batch failed"),
        }
    }
}

/// Batch schedule. Ticks missed by a slow batch are skipped, not replayed.
fn batch_ticker(secs: u64) -> Interval {
    let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

fn print_report(report: &BatchReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    match &report.outcome {
        BatchOutcome::NoHistory => {
            println!("{}", "No run history for monitored workflows".yellow());
        }
        BatchOutcome::Healthy => {
            println!(
                "{}",
                format!("All {} runs checked, nothing failing", report.records).green()
            );
        }
        BatchOutcome::Alerting {
            workflows,
            global_severity,
        } => {
            println!(
                "{}",
                format!(
                    "{} workflow(s) failing, global severity {global_severity}",
                    workflows.len()
                )
                .red()
                .bold()
            );
            println!("  {}", report.snapshot.title);
        }
    }
    Ok(())
}

async fn serve_command(config: &MonitorConfig, addr: Option<String>) -> Result<()> {
    let addr = addr.unwrap_or_else(|| config.server.addr.clone());

    println!("{}", "═".repeat(60).cyan());
    println!("{}", "DAGWATCH SNAPSHOT SERVER".cyan().bold());
    println!("{}", "═".repeat(60).cyan());
    println!();
    println!("  Address:  {}", addr.green());
    println!(
        "  Snapshot: {}",
        config.snapshot_path.display().to_string().green()
    );
    println!(
        "  Auth:     {}",
        if config.server.api_token.is_some() {
            "bearer token".green()
        } else {
            "disabled".red()
        }
    );
    println!();

    let store: Arc<dyn SnapshotStore> = Arc::new(FileSnapshotStore::new(&config.snapshot_path));
    let state = Arc::new(ServerState::new(store, config.server.api_token.clone()));

    run_server(state, &addr)
        .await
        .with_context(|| format!("Server on {addr} failed"))
}

async fn show_command(config: &MonitorConfig) -> Result<()> {
    let store = FileSnapshotStore::new(&config.snapshot_path);
    let snapshot = store
        .current()
        .await
        .with_context(|| format!("Failed to read {}", store.path().display()))?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
