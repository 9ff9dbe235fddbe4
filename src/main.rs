//! Registry-Repos main entry point
//!
//! This is the command-line interface for the registry repository updater.

use anyhow::{bail, Context};
use clap::Parser;
use registry_repos::config::{load_config_with_hash, Config};
use registry_repos::output::{print_statistics, update_report};
use registry_repos::storage::{open_store, CheckpointStore};
use registry_repos::{run_update, RunControl};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Registry-Repos: package name to repository URL, kept in sync
///
/// Follows the registry change feed from the last checkpoint, resolves
/// each package's repository, and writes a sorted snapshot plus statistics.
#[derive(Parser, Debug)]
#[command(name = "registry-repos")]
#[command(version)]
#[command(about = "Keeps a package to repository map in sync with a registry", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Discard the checkpoint and rebuild from sequence 0
    #[arg(long, conflicts_with_all = ["stats", "verify", "report"])]
    fresh: bool,

    /// Show statistics from the stored checkpoint and exit
    #[arg(long, conflicts_with_all = ["verify", "report"])]
    stats: bool,

    /// Check the stored checkpoint for consistency and exit
    #[arg(long, conflicts_with = "report")]
    verify: bool,

    /// Rewrite the statistics block of a markdown file and exit
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = load_config_with_hash(cli.config.as_deref())
        .context("failed to load configuration")?;

    match (&cli.config, config_hash) {
        (Some(path), Some(hash)) => {
            tracing::info!("Configuration loaded from {} (hash: {})", path.display(), hash)
        }
        _ => tracing::info!("Using default configuration"),
    }

    if cli.stats {
        handle_stats(&config)
    } else if cli.verify {
        handle_verify(&config)
    } else if let Some(path) = &cli.report {
        handle_report(&config, path)
    } else {
        handle_update(config, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("registry_repos=info,warn"),
            1 => EnvFilter::new("registry_repos=debug,info"),
            2 => EnvFilter::new("registry_repos=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn load_checkpoint(
    config: &Config,
) -> anyhow::Result<(registry_repos::Metadata, registry_repos::state::Dataset)> {
    let store = open_store(&config.output.data_dir);
    store
        .load()
        .context("failed to read checkpoint")?
        .with_context(|| format!("no checkpoint in {}", config.output.data_dir.display()))
}

/// Handles the --stats mode: shows statistics from the checkpoint
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Data: {}\n", config.output.data_dir.display());

    let (metadata, dataset) = load_checkpoint(config)?;
    print_statistics(&metadata, &dataset, 20);

    Ok(())
}

/// Handles the --verify mode: checks the checkpoint against its dataset
fn handle_verify(config: &Config) -> anyhow::Result<()> {
    let (metadata, dataset) = load_checkpoint(config)?;
    let issues = metadata.consistency_issues(&dataset);

    if issues.is_empty() {
        println!("✓ {} packages, metadata consistent", dataset.len());
        return Ok(());
    }

    for issue in &issues {
        println!("✗ {}", issue);
    }
    bail!("{} consistency issue(s) found", issues.len())
}

/// Handles the --report mode: regenerates the statistics block of a document
fn handle_report(config: &Config, path: &Path) -> anyhow::Result<()> {
    let (metadata, _) = load_checkpoint(config)?;
    update_report(path, &metadata)
        .with_context(|| format!("failed to update report {}", path.display()))?;

    println!("✓ Statistics written to: {}", path.display());
    Ok(())
}

/// Handles the main update operation
async fn handle_update(config: Config, fresh: bool) -> anyhow::Result<()> {
    let store = open_store(&config.output.data_dir);

    if fresh {
        tracing::info!("Starting fresh (discarding previous checkpoint)");
        store.reset().context("failed to reset checkpoint")?;
    }

    tracing::info!(
        "Following {} (page size {}, concurrency {})",
        config.feed.registry_url,
        config.feed.page_size,
        config.feed.concurrency
    );

    let control = RunControl::new();
    spawn_signal_handlers(&control);

    match run_update(&config, &store, control).await {
        Ok(metadata) => {
            tracing::info!(
                "Update completed: {} packages at sequence {}",
                metadata.packages,
                metadata.last_sequence
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Update failed: {}", e);
            Err(e).context("update run failed")
        }
    }
}

/// Routes process signals to the run: interrupt/terminate cancel, USR1 dumps progress
fn spawn_signal_handlers(control: &RunControl) {
    let cancel = control.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received");
            cancel.cancel();
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let cancel = control.cancel.clone();
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::spawn(async move {
                    if term.recv().await.is_some() {
                        tracing::info!("terminate received");
                        cancel.cancel();
                    }
                });
            }
            Err(e) => tracing::warn!("cannot listen for SIGTERM: {}", e),
        }

        let dump = control.dump.clone();
        match signal(SignalKind::user_defined1()) {
            Ok(mut usr1) => {
                tokio::spawn(async move {
                    while usr1.recv().await.is_some() {
                        dump.notify_one();
                    }
                });
            }
            Err(e) => tracing::warn!("cannot listen for SIGUSR1: {}", e),
        }
    }
}
