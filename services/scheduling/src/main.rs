//! convoy scheduling manager
//!
//! Runs the reconciliation pipeline in-process on a fixed interval against
//! the in-memory collaborators, seeded from a JSON fixture.

use std::sync::Arc;

use anyhow::{Context, Result};
use convoy_scheduling::{
    clients::memory::{Fixture, InMemoryCluster, InMemoryEnvironments},
    config::Config,
    pipeline::LocalPipeline,
    worker::SchedulerWorker,
};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to CONVOY_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting convoy scheduling manager");
    info!(
        reconcile_interval_secs = config.reconcile_interval.as_secs(),
        call_timeout_secs = config.call_timeout.as_secs(),
        describe_concurrency = config.describe_concurrency,
        "Configuration loaded"
    );

    let path = config
        .fixture_path
        .clone()
        .context("CONVOY_FIXTURE_PATH must name a fixture file")?;
    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read fixture {}", path.display()))?;
    let fixture = match Fixture::from_json(&raw) {
        Ok(fixture) => fixture,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Invalid fixture");
            return Err(e.into());
        }
    };
    info!(
        environments = fixture.environments.len(),
        clusters = fixture.clusters.len(),
        "Fixture loaded"
    );

    let pipeline = LocalPipeline::new(
        Arc::new(InMemoryEnvironments::from_fixture(&fixture)),
        Arc::new(InMemoryCluster::from_fixture(&fixture)),
        &config,
    );

    // Create shutdown channel for graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = SchedulerWorker::new(pipeline.reconciler.clone(), config.reconcile_interval);
    let worker_handle = tokio::spawn(async move {
        worker.run(shutdown_rx).await;
    });

    // Wait for shutdown signal (Ctrl+C)
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    // Signal shutdown to the worker
    let _ = shutdown_tx.send(true);

    info!("Waiting for in-flight work to finish...");
    let shutdown_timeout = std::time::Duration::from_secs(10);

    if let Err(e) = tokio::time::timeout(shutdown_timeout, worker_handle).await {
        warn!(error = %e, "Scheduler worker did not shut down in time");
    }
    if let Err(e) = tokio::time::timeout(shutdown_timeout, pipeline.wait_idle()).await {
        warn!(error = %e, "Managers did not finish in time");
    }

    info!("Shutdown complete");
    Ok(())
}
