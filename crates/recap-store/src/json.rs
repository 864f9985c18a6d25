//! JSON snapshot backend.
//!
//! The whole state lives in one JSON file. Each committed write serializes
//! the new state to a sibling temporary file and renames it over the target,
//! so the file on disk is always a complete snapshot.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::error::StoreError;
use crate::memory::{Snapshot, StateStore};
use crate::state::{StoreState, FORMAT_VERSION};

/// Snapshot sink writing to a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "recap-store.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl Snapshot for JsonFile {
    fn backend(&self) -> &str {
        "json"
    }

    async fn persist(&self, state: &StoreState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state).context("failed to serialize store state")?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &bytes)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "store snapshot written");
        Ok(())
    }
}

/// A store persisted as a JSON snapshot.
pub type JsonStore = StateStore<JsonFile>;

impl JsonStore {
    /// Open the snapshot at `path`, starting empty when the file is absent.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }

        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let state: StoreState = serde_json::from_slice(&bytes)
                    .with_context(|| format!("failed to parse store file: {}", path.display()))?;
                if state.format_version != FORMAT_VERSION {
                    return Err(StoreError::UnsupportedSnapshot {
                        found: state.format_version,
                        expected: FORMAT_VERSION,
                    }
                    .into());
                }
                state
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no store file yet, starting empty");
                StoreState::default()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read store file: {}", path.display()))
            }
        };

        Ok(Self::with_state(state, JsonFile { path }))
    }
}
