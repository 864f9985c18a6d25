//! The `recap serve` command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use recap_jobs::{IngestionJob, Scheduler, ValidityJob};

use super::open_store;

pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let (config, store) = open_store(config_path).await?;

    let ingestion = Arc::new(IngestionJob::new(
        &config.courses_dir,
        Arc::clone(&store),
        config.reuse_scope,
    ));
    let validity = Arc::new(ValidityJob::new(Arc::clone(&store), config.validity_threshold));

    let handle = Scheduler::new()
        .with_job(ingestion, Duration::from_secs(config.ingestion_interval_secs))
        .with_job(validity, Duration::from_secs(config.validity_interval_secs))
        .spawn();

    tracing::info!(
        courses_dir = %config.courses_dir.display(),
        backend = store.name(),
        "recap serving, press Ctrl-C to stop"
    );
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    tracing::info!("shutting down");
    handle.shutdown().await
}
