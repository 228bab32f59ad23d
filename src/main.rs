//! Skillscout main entry point
//!
//! This is the command-line interface for the Skillscout discovery and
//! extraction pipeline.

use anyhow::{Context, Result};
use clap::Parser;
use skillscout::config::{load_config_with_hash, Config};
use skillscout::pipeline::{run_pipeline, RunMode, RunOptions, RunOutcome};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Skillscout: complete discovery and extraction for a skills directory
///
/// Skillscout finds every listed skill through several overlapping sources,
/// merges them into one frontier and extracts a structured record per skill,
/// resuming interrupted runs from checkpoints.
#[derive(Parser, Debug)]
#[command(name = "skillscout")]
#[command(version)]
#[command(about = "Discovery and extraction for a skills directory", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Run discovery only
    #[arg(long, conflicts_with_all = ["extract", "stats"])]
    discover: bool,

    /// Extract from the persisted frontier without rediscovering
    #[arg(long, conflicts_with_all = ["discover", "stats"])]
    extract: bool,

    /// Show statistics from the latest snapshot database and exit
    #[arg(long, conflicts_with_all = ["discover", "extract"])]
    stats: bool,

    /// Start fresh, ignoring unfinished checkpoints
    #[arg(long)]
    fresh: bool,

    /// Only run the first N search queries
    #[arg(long, value_name = "N")]
    sample: Option<usize>,

    /// Fail with exit code 2 if fewer than N items are produced
    #[arg(long, value_name = "N")]
    baseline: Option<usize>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {}", e);
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("Run failed: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.stats {
        handle_stats(&config)?;
        return Ok(0);
    }

    let mode = if cli.discover {
        RunMode::DiscoverOnly
    } else if cli.extract {
        RunMode::ExtractOnly
    } else {
        RunMode::Full
    };

    let options = RunOptions {
        fresh: cli.fresh,
        sample: cli.sample,
        baseline: cli.baseline,
    };

    handle_run(config, config_hash, options, mode).await
}

/// Installs the tracing subscriber
///
/// `RUST_LOG`, when set, wins over `-v`/`-q`.
fn setup_logging(verbose: u8, quiet: bool) {
    let directives = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "skillscout=info,warn",
        (false, 1) => "skillscout=debug,info",
        (false, 2) => "skillscout=trace,debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --stats mode: shows statistics from the latest snapshot
fn handle_stats(config: &Config) -> Result<()> {
    use skillscout::output::{load_statistics, print_statistics};
    use skillscout::storage::{OutputLayout, SqliteRecordStore};

    let layout = OutputLayout::new(&config.output.output_dir);
    let latest = layout
        .snapshot_dates()
        .context("failed to list snapshots")?
        .into_iter()
        .next_back()
        .context("no snapshots found")?;

    let db_path = layout.database_path(latest);
    println!("Snapshot: {}", latest);
    println!("Database: {}\n", db_path.display());

    let store = SqliteRecordStore::new(&db_path)?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles a pipeline run and maps its outcome to an exit code
async fn handle_run(
    config: Config,
    config_hash: String,
    options: RunOptions,
    mode: RunMode,
) -> Result<u8> {
    if options.fresh {
        tracing::info!("Starting fresh run (ignoring checkpoints)");
    } else {
        tracing::info!("Starting run (will resume unfinished checkpoints)");
    }

    let outcome = run_pipeline(config, config_hash, options, mode).await?;
    print_outcome(&outcome);

    if outcome.below_baseline() {
        tracing::warn!("Run {} finished below baseline", outcome.run_id);
    }
    Ok(outcome.exit_code() as u8)
}

fn print_outcome(outcome: &RunOutcome) {
    println!("=== Run {} ===\n", outcome.run_id);
    println!("  Frontier: {}", outcome.frontier_size);
    if outcome.mode != RunMode::DiscoverOnly {
        println!("  Records: {}", outcome.records);
        println!("  Failures: {}", outcome.failures);
    }

    if let Some(report) = &outcome.report {
        for (field, pct) in &report.coverage {
            println!("  Coverage {}: {:.1}%", field, pct);
        }
        if let Some(completeness) = &report.completeness {
            println!("  Completeness: {:?}", completeness.status);
        }
    }
}
