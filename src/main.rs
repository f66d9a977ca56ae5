//! segment-importer: quorum-verifying hash-chain importer for record
//! segments published by a fixed set of semi-trusted nodes.
//!
//! Each polling cycle collects per-node signature attestations from object
//! storage, establishes which claimed content hash has support from more
//! than two-thirds of all known nodes, fetches the endorsed segment (with
//! fallback across endorsing nodes), validates hash-chain continuity
//! against a durable checkpoint, and hands validated segments downstream.

mod checkpoint;
mod config;
mod downstream;
mod importer;
mod registry;
mod stop;
mod store;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use checkpoint::CheckpointStore;
use config::{Config, StorageBackend};
use importer::chain::ChainValidator;
use importer::cycle::Orchestrator;
use registry::NodeRegistry;
use stop::StopFlag;
use store::{FsObjectStore, HttpObjectStore, ObjectStore};

#[derive(Parser)]
#[command(name = "segment-importer")]
#[command(about = "Quorum-verifying hash-chain importer for node-published record segments")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "segment-importer.toml")]
    config: String,

    /// Address book path (overrides config file)
    #[arg(long, env = "IMPORTER_ADDRESS_BOOK")]
    address_book: Option<PathBuf>,

    /// Checkpoint file path (overrides config file)
    #[arg(long, env = "IMPORTER_CHECKPOINT")]
    checkpoint: Option<PathBuf>,

    /// Stop file path (overrides config file)
    #[arg(long, env = "IMPORTER_STOP_FILE")]
    stop_file: Option<PathBuf>,

    /// Seconds between polling cycles (overrides config file)
    #[arg(long, env = "IMPORTER_POLL_INTERVAL_SECS")]
    poll_interval_secs: Option<u64>,
}

fn build_store(config: &Config) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match config.storage.backend {
        StorageBackend::Fs => {
            let root = config
                .storage
                .fs_root
                .clone()
                .context("storage.fs_root is required for the fs backend")?;
            Ok(Arc::new(FsObjectStore::new(root)))
        }
        StorageBackend::Http => {
            let base = config
                .storage
                .http_base
                .clone()
                .context("storage.http_base is required for the http backend")?;
            let timeout = Duration::from_millis(config.storage.request_timeout_ms);
            Ok(Arc::new(
                HttpObjectStore::new(base, timeout)
                    .map_err(|e| anyhow::anyhow!("failed to build http store: {}", e))?,
            ))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("segment_importer=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    info!("Starting segment-importer");
    info!("Config file: {}", cli.config);

    // Load or create default config
    let mut config: Config = if std::path::Path::new(&cli.config).exists() {
        let content = std::fs::read_to_string(&cli.config)?;
        toml::from_str(&content)?
    } else {
        info!("Config file not found, using defaults");
        Config::default()
    };

    // Apply CLI overrides
    if let Some(address_book) = cli.address_book {
        config.registry.address_book = address_book;
    }
    if let Some(checkpoint) = cli.checkpoint {
        config.checkpoint.path = checkpoint;
    }
    if let Some(stop_file) = cli.stop_file {
        config.importer.stop_file = Some(stop_file);
    }
    if let Some(secs) = cli.poll_interval_secs {
        config.importer.poll_interval_secs = secs;
    }

    info!("Address book: {}", config.registry.address_book.display());
    info!("Checkpoint: {}", config.checkpoint.path.display());

    let registry = NodeRegistry::load(&config.registry.address_book)
        .with_context(|| {
            format!(
                "failed to load address book {}",
                config.registry.address_book.display()
            )
        })?;
    info!("Known nodes: {}", registry.len());

    let store = build_store(&config)?;

    let checkpoints = CheckpointStore::load(config.checkpoint.path.clone())
        .context("failed to load checkpoint")?;
    match checkpoints.current() {
        Some(cp) => info!(filename = %cp.filename, hash = %cp.hash, "Resuming from checkpoint"),
        None => info!("No checkpoint, starting from genesis"),
    }

    let stop = StopFlag::new(config.importer.stop_file.clone());
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, stopping after the current filename");
                stop.trigger();
            }
        });
    }

    let (downstream_tx, downstream_rx) =
        downstream::channel(config.downstream.channel_capacity);
    tokio::spawn(downstream::run_logging_sink(downstream_rx));

    let mut orchestrator = Orchestrator::new(
        store,
        Some(config.registry.address_book.clone()),
        registry,
        ChainValidator::new(checkpoints),
        downstream_tx,
        stop.clone(),
        config.importer.worker_count,
        config.importer.chain_break_escalate_after,
    );

    let poll_interval = Duration::from_secs(config.importer.poll_interval_secs.max(1));
    loop {
        if stop.is_set() {
            info!("Stop requested, exiting");
            break;
        }

        let report = orchestrator.run_cycle().await;
        if report.stopped {
            info!("Stop requested mid-cycle, exiting");
            break;
        }
        if report.is_idle() {
            info!("Cycle idle, nothing pending");
        } else {
            info!(
                pending = report.pending,
                validated = report.validated,
                deferred = report.deferred,
                "Cycle complete"
            );
        }
        if let Some(filename) = &report.chain_break {
            error!(filename = %filename, "Chain broken, will retry next cycle");
        }

        tokio::time::sleep(poll_interval).await;
    }

    Ok(())
}
