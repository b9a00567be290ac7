//! MangoKV - An In-Memory Key-Value Store
//!
//! This is the main entry point for the MangoKV server.
//! It loads the configuration, sets up logging and the runtime, and serves
//! connections until Ctrl+C.

use anyhow::Context;
use mangokv::config::Config;
use mangokv::server::Server;
use mangokv::storage::StorageEngine;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_banner(config: &Config) {
    println!(
        r#"
  __  __                         _  ____     __
 |  \/  | __ _ _ __   __ _  ___ | |/ /\ \   / /
 | |\/| |/ _` | '_ \ / _` |/ _ \| ' /  \ \ / /
 | |  | | (_| | | | | (_| | (_) | . \   \ V /
 |_|  |_|\__,_|_| |_|\__, |\___/|_|\_\   \_/
                     |___/

MangoKV v{} - In-Memory Key-Value Store
──────────────────────────────────────────────────────────────
Server starting on {}

Use Ctrl+C to shutdown gracefully.
"#,
        mangokv::VERSION,
        config.bind_address()
    );
}

fn main() -> anyhow::Result<()> {
    // Parse command-line arguments and the optional config file
    let config = Config::load().context("failed to load configuration")?;

    // Set up logging; RUST_LOG wins over the configured level
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(workers) = config.workers {
        builder.worker_threads(workers);
    }
    let runtime = builder.build().context("failed to build Tokio runtime")?;

    print_banner(&config);

    runtime.block_on(serve(config))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!(
        host = %config.host,
        port = config.port,
        workers = ?config.workers,
        max_line_length = config.max_line_length,
        shutdown_timeout = ?config.shutdown_timeout,
        "Starting MangoKV server"
    );

    // Create the storage engine (shared across all connections)
    let storage = Arc::new(StorageEngine::new());
    info!("Storage engine initialized");

    let server = Server::bind(&config, Arc::clone(&storage))
        .await
        .context("failed to start server")?;
    let stats = server.connection_stats();

    // Set up graceful shutdown
    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C; serving until killed");
            std::future::pending::<()>().await;
        }
    };

    server.run(shutdown).await;

    let store_stats = storage.stats();
    info!(
        keys = store_stats.keys,
        gets = store_stats.get_ops,
        puts = store_stats.put_ops,
        deletes = store_stats.del_ops,
        rejected_puts = store_stats.rejected_puts,
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        bytes_read = stats.bytes_read.load(Ordering::Relaxed),
        bytes_written = stats.bytes_written.load(Ordering::Relaxed),
        "Final statistics"
    );

    Ok(())
}
