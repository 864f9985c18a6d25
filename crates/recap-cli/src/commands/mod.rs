//! Subcommand implementations.

pub mod exams;
pub mod ingest;
pub mod init;
pub mod plan;
pub mod reports;
pub mod serve;
pub mod session;
pub mod validate;
pub mod validity;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::ValueEnum;

use recap_core::traits::ExamStore;
use recap_store::config::{create_store, load_config_from, RecapConfig, StoreConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Load the configuration and open its store.
pub async fn open_store(config_path: Option<PathBuf>) -> Result<(RecapConfig, Arc<dyn ExamStore>)> {
    let config = load_config_from(config_path.as_deref())?;
    if config.store == StoreConfig::Memory {
        eprintln!(
            "Warning: using the in-memory store; nothing is kept after this command. \
             Set [store] type = \"json\" or RECAP_DATA_PATH to persist."
        );
    }
    let store = create_store(&config.store).await?;
    tracing::debug!(backend = store.name(), "store opened");
    Ok((config, store))
}
