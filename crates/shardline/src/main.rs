//! shardline entry point
//!
//! Run with:
//! ```bash
//! SHARDLINE_TOKEN="Bot <token>" cargo run -p shardline
//! ```
//!
//! Configuration is loaded from environment variables. Every dispatch is
//! logged; Ctrl-C closes all sessions.

use anyhow::Context;
use async_trait::async_trait;
use shardline::{Client, ClientConfig, DispatchEvent, EventSink};
use shardline_common::{try_init_tracing_with_config, TracingConfig};
use std::sync::Arc;
use tracing::{error, info};

/// Logs each dispatch event
struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    async fn on_dispatch(&self, event: DispatchEvent) {
        info!(
            shard = %event.shard,
            seq = ?event.sequence,
            event = %event.name,
            "Dispatch received"
        );
    }
}

#[tokio::main]
async fn main() {
    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = try_init_tracing_with_config(&TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run(config).await {
        error!(error = %format!("{e:#}"), "shardline exited with an error");
        std::process::exit(1);
    }
}

async fn run(config: ClientConfig) -> anyhow::Result<()> {
    info!(
        app = %config.app.name,
        env = ?config.app.env,
        shards = ?config.shards,
        intents = config.intents.bits(),
        "Configuration loaded"
    );

    let client = Client::new(config).context("failed to build client")?;
    let coordinator = client
        .connect(Arc::new(LogSink))
        .await
        .context("failed to start gateway sessions")?;

    info!(shards = ?coordinator.shard_ids(), "Gateway sessions started");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("Shutdown signal received");

    for (shard_id, result) in coordinator.shutdown().await {
        if let Err(e) = result {
            error!(shard_id, error = %e, "Session ended with an error");
        }
    }
    client.shutdown();

    info!("Shutdown complete");
    Ok(())
}
