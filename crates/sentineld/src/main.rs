//! Ops Sentinel daemon.
//!
//! Reads log lines from stdin into the ordered queue, watches for fatal
//! events, and resolves each incident against indexed documentation.

use anyhow::Result;
use clap::Parser;
use sentinel_common::Config;
use sentineld::clients::huggingface::HfClient;
use sentineld::clients::supabase::SupabaseIndex;
use sentineld::dispatcher::ResolutionDispatcher;
use sentineld::engine::ForensicEngine;
use sentineld::monitor::Monitor;
use sentineld::queue::{LogQueue, MemoryQueue};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sentineld", about = "Forensic log triage daemon", version)]
struct Args {
    /// Path to config file (default: /etc/sentinel/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the rolling history window size
    #[arg(long)]
    window: Option<usize>,

    /// Override the queue poll interval in milliseconds
    #[arg(long)]
    poll_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!("sentineld v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load(),
    };
    if let Some(window) = args.window {
        config.buffer.history_window_size = window;
    }
    if let Some(poll_ms) = args.poll_ms {
        config.buffer.poll_interval_ms = poll_ms;
    }

    let model = Arc::new(HfClient::new(&config.ai)?);
    let index = Arc::new(SupabaseIndex::new(&config.search)?);
    let queue: Arc<dyn LogQueue> = Arc::new(MemoryQueue::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let engine = ForensicEngine::new(
        config.buffer.history_window_size,
        config.severity.clone(),
    );
    let dispatcher = ResolutionDispatcher::new(
        model,
        index,
        config.retry.clone(),
        config.search.clone(),
        shutdown_rx.clone(),
    );
    let monitor = Monitor::new(
        Arc::clone(&queue),
        engine,
        dispatcher,
        Duration::from_millis(config.buffer.poll_interval_ms),
        shutdown_rx.clone(),
    );
    let monitor_handle = tokio::spawn(monitor.run());

    // Producer: feed stdin into the queue tail until EOF or shutdown.
    let producer_queue = Arc::clone(&queue);
    let mut producer_shutdown = shutdown_rx;
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) if !line.trim().is_empty() => {
                        producer_queue.push_tail(line).await;
                    }
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        info!("stdin closed, no more log lines will arrive");
                        break;
                    }
                    Err(e) => {
                        info!("stdin read error, stopping producer: {}", e);
                        break;
                    }
                },
                _ = producer_shutdown.changed() => break,
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, draining");
    let _ = shutdown_tx.send(true);
    monitor_handle.await?;
    info!("sentineld stopped");

    Ok(())
}
