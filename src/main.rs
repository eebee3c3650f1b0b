//! Command-line interface for record-sync
//!
//! Source and target are JSON Lines files, one record per line.
//!
//! # Usage Examples
//!
//! ## Full Sync
//! ```bash
//! # Batched, 50 records per page, only records whose owner contains "t"
//! record-sync full \
//!   --source source.jsonl --target target.jsonl \
//!   --page-size 50 --contains owner=t
//!
//! # Everything in one query
//! record-sync full --source source.jsonl --target target.jsonl --unbatched
//! ```
//!
//! ## Incremental Sync
//! ```bash
//! record-sync incremental \
//!   --source source.jsonl --target target.jsonl \
//!   --from "2024-06-15T14:30:00.123Z,GE"
//! ```
//!
//! ## Continuous Sync
//! ```bash
//! record-sync sync \
//!   --source source.jsonl --target target.jsonl \
//!   --poll-interval 500ms --timeout 1h
//! ```
//!
//! ## Watermark Format
//! - `origin` (nothing synced yet)
//! - `2024-06-15T14:30:00Z` (everything up to and including this instant)
//! - `2024-06-15T14:30:00.123Z,GE` (up to this instant, ties up to key `GE`)

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use record_sync::config::duration::parse_duration;
use record_sync::{
    sync_all_no_limit, sync_all_safely, sync_new_changes, Checkpoint, JsonlStore, Predicate,
    StoreSink, SyncConfig, SyncOutcome, Synchronizer, Watermark,
};
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "record-sync")]
#[command(about = "Replicate records from a source store into a target store")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy every matching source record into the target
    Full {
        #[command(flatten)]
        opts: SessionOpts,

        /// Draw all records with one query instead of paging
        #[arg(long)]
        unbatched: bool,
    },

    /// Apply source changes made after a watermark, once
    Incremental {
        #[command(flatten)]
        opts: SessionOpts,

        /// Watermark to start from (format: "origin", "<rfc3339>" or "<rfc3339>,<key>")
        #[arg(long)]
        from: String,
    },

    /// Bootstrap the target, then keep polling the source for changes
    Sync {
        #[command(flatten)]
        opts: SessionOpts,

        /// Delay between delta passes (e.g. "500ms", "5s", "1m")
        #[arg(long, env = "RECORD_SYNC_POLL_INTERVAL")]
        poll_interval: Option<String>,

        /// Maximum time to run (optional, default: 1 hour)
        /// Format: duration in seconds or with units like "30m", "2h"
        #[arg(long, default_value = "3600")]
        timeout: String,

        /// Skip the bootstrap sync and start polling from this watermark
        #[arg(long)]
        from: Option<String>,
    },
}

#[derive(Args, Clone)]
struct SessionOpts {
    /// Source JSONL file
    #[arg(long, value_name = "PATH")]
    source: PathBuf,

    /// Target JSONL file (created if missing)
    #[arg(long, value_name = "PATH")]
    target: PathBuf,

    /// YAML configuration file; flags override its values
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Records per batch
    #[arg(long, env = "RECORD_SYNC_PAGE_SIZE")]
    page_size: Option<usize>,

    /// Natural key field (default: "name")
    #[arg(long)]
    key_field: Option<String>,

    /// Change marker field (default: "updatedAt")
    #[arg(long)]
    change_field: Option<String>,

    /// Only sync records where FIELD equals VALUE (VALUE is parsed as JSON when possible)
    #[arg(long = "where", value_name = "FIELD=VALUE")]
    equals: Vec<String>,

    /// Only sync records where string FIELD contains SUBSTRING
    #[arg(long, value_name = "FIELD=SUBSTRING")]
    contains: Vec<String>,
}

impl SessionOpts {
    fn to_config(&self) -> anyhow::Result<SyncConfig> {
        let mut config = match &self.config {
            Some(path) => SyncConfig::from_file(path)?,
            None => SyncConfig::default(),
        };

        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
        if let Some(key) = &self.key_field {
            config.fields.key = key.clone();
        }
        if let Some(marker) = &self.change_field {
            config.fields.change_marker = marker.clone();
        }

        for rule in &self.equals {
            let (field, value) = split_rule(rule)?;
            let value = serde_json::from_str(value)
                .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
            config.change_predicate = config
                .change_predicate
                .and(Predicate::equals(field, value));
        }
        for rule in &self.contains {
            let (field, needle) = split_rule(rule)?;
            config.change_predicate = config
                .change_predicate
                .and(Predicate::contains(field, needle));
        }

        Ok(config)
    }

    fn stores(&self, config: &SyncConfig) -> (JsonlStore, StoreSink<JsonlStore>) {
        let source = JsonlStore::new(&self.source, config.fields.clone());
        let target = JsonlStore::new(&self.target, config.fields.clone());
        (source, StoreSink::new(target))
    }
}

fn split_rule(rule: &str) -> anyhow::Result<(&str, &str)> {
    match rule.split_once('=') {
        Some((field, value)) if !field.is_empty() => Ok((field, value)),
        _ => anyhow::bail!("Invalid filter '{rule}', expected FIELD=VALUE"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Full { opts, unbatched } => run_full_sync(opts, unbatched).await,
        Commands::Incremental { opts, from } => run_incremental_sync(opts, from).await,
        Commands::Sync {
            opts,
            poll_interval,
            timeout,
            from,
        } => run_continuous_sync(opts, poll_interval, timeout, from).await,
    }
}

async fn run_full_sync(opts: SessionOpts, unbatched: bool) -> anyhow::Result<()> {
    let config = opts.to_config()?;
    config.validate()?;
    let (source, sink) = opts.stores(&config);

    tracing::info!(
        "Starting full sync from {} to {}",
        opts.source.display(),
        opts.target.display()
    );

    let outcome = if unbatched {
        sync_all_no_limit(&source, &sink, &config.change_predicate, Watermark::origin()).await?
    } else {
        let shutdown = setup_shutdown_handler();
        let (outcome, cursor) = sync_all_safely(
            &source,
            &sink,
            &config.change_predicate,
            config.page_size,
            None,
            Watermark::origin(),
            Some(&shutdown),
        )
        .await?;
        if !cursor.exhausted {
            tracing::warn!(
                "Full sync interrupted after {} records; rerun to finish",
                cursor.offset
            );
        }
        outcome
    };

    print_outcome(&outcome)
}

async fn run_incremental_sync(opts: SessionOpts, from: String) -> anyhow::Result<()> {
    let config = opts.to_config()?;
    config.validate()?;
    let watermark = Watermark::from_cli_string(&from)
        .with_context(|| format!("Invalid --from watermark: {from}"))?;
    let (source, sink) = opts.stores(&config);

    tracing::info!("Starting incremental sync from watermark {watermark}");

    let outcome = sync_new_changes(&source, &sink, &config.change_predicate, watermark).await?;
    print_outcome(&outcome)
}

async fn run_continuous_sync(
    opts: SessionOpts,
    poll_interval: Option<String>,
    timeout: String,
    from: Option<String>,
) -> anyhow::Result<()> {
    let mut config = opts.to_config()?;
    if let Some(interval) = poll_interval {
        config.poll_interval = parse_duration(&interval)
            .with_context(|| format!("Invalid poll interval: {interval}"))?;
    }
    if let Some(from) = from {
        config.start_from = Some(
            Watermark::from_cli_string(&from)
                .with_context(|| format!("Invalid --from watermark: {from}"))?,
        );
    }
    let timeout =
        parse_duration(&timeout).with_context(|| format!("Invalid timeout format: {timeout}"))?;

    let (source, sink) = opts.stores(&config);
    let handle = Synchronizer::new(source, sink, config).start()?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            tracing::info!("Received interrupt signal (Ctrl+C)");
        }
        _ = tokio::time::sleep(timeout) => {
            tracing::info!("Timeout of {timeout:?} reached");
        }
    }

    let summary = handle.stop().await?;
    println!("{summary}");
    println!("Watermark: {}", summary.watermark.to_cli_string());
    Ok(())
}

fn print_outcome(outcome: &SyncOutcome) -> anyhow::Result<()> {
    let rendered =
        serde_json::to_string_pretty(outcome).context("Failed to render sync outcome")?;
    println!("{rendered}");
    Ok(())
}

/// Sets up a shutdown signal handler
fn setup_shutdown_handler() -> watch::Receiver<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {e}");
            return;
        }
        tracing::info!("Received interrupt signal (Ctrl+C), stopping after current batch");
        let _ = shutdown_tx.send(true);
    });

    shutdown_rx
}
