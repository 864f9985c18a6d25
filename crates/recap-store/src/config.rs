//! Configuration loading and store factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use recap_core::selector::ReuseScope;
use recap_core::traits::ExamStore;
use recap_core::validity::DEFAULT_THRESHOLD;

use crate::json::JsonStore;
use crate::memory::MemoryStore;

/// Which store backend to use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    Memory,
    Json {
        #[serde(default = "default_store_path")]
        path: PathBuf,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./recap-data/store.json")
}

/// Top-level recap configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecapConfig {
    #[serde(default)]
    pub store: StoreConfig,
    /// Directory holding one sub-directory per course.
    #[serde(default = "default_courses_dir")]
    pub courses_dir: PathBuf,
    /// Seconds between bank ingestion passes.
    #[serde(default = "default_ingestion_interval")]
    pub ingestion_interval_secs: u64,
    /// Seconds between validity scoring passes.
    #[serde(default = "default_validity_interval")]
    pub validity_interval_secs: u64,
    /// Fraction of attempts forming the low-scoring group.
    #[serde(default = "default_validity_threshold")]
    pub validity_threshold: f64,
    /// Question reuse policy across the exams of one generation run.
    #[serde(default)]
    pub reuse_scope: ReuseScope,
}

fn default_courses_dir() -> PathBuf {
    PathBuf::from("./courses")
}
fn default_ingestion_interval() -> u64 {
    300
}
fn default_validity_interval() -> u64 {
    86_400
}
fn default_validity_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

impl Default for RecapConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            courses_dir: default_courses_dir(),
            ingestion_interval_secs: default_ingestion_interval(),
            validity_interval_secs: default_validity_interval(),
            validity_threshold: default_validity_threshold(),
            reuse_scope: ReuseScope::default(),
        }
    }
}

impl RecapConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.validity_threshold > 0.0 && self.validity_threshold < 1.0) {
            anyhow::bail!(
                "validity_threshold must be between 0 and 1 (exclusive), got {}",
                self.validity_threshold
            );
        }
        if self.ingestion_interval_secs == 0 {
            anyhow::bail!("ingestion_interval_secs must be greater than zero");
        }
        if self.validity_interval_secs == 0 {
            anyhow::bail!("validity_interval_secs must be greater than zero");
        }
        Ok(())
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_path(p: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&p.to_string_lossy()))
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `recap.toml` in the current directory
/// 2. `~/.config/recap/config.toml`
///
/// Environment variable overrides: `RECAP_DATA_PATH`, `RECAP_COURSES_DIR`,
/// `RECAP_VALIDITY_THRESHOLD`.
pub fn load_config() -> Result<RecapConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<RecapConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("recap.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<RecapConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => RecapConfig::default(),
    };

    apply_env_overrides(&mut config)?;

    config.courses_dir = resolve_path(&config.courses_dir);
    if let StoreConfig::Json { path } = &mut config.store {
        *path = resolve_path(path);
    }

    config.validate()?;
    Ok(config)
}

fn apply_env_overrides(config: &mut RecapConfig) -> Result<()> {
    if let Ok(path) = std::env::var("RECAP_DATA_PATH") {
        config.store = StoreConfig::Json {
            path: PathBuf::from(path),
        };
    }
    if let Ok(dir) = std::env::var("RECAP_COURSES_DIR") {
        config.courses_dir = PathBuf::from(dir);
    }
    if let Ok(raw) = std::env::var("RECAP_VALIDITY_THRESHOLD") {
        config.validity_threshold = raw
            .trim()
            .parse()
            .with_context(|| format!("invalid RECAP_VALIDITY_THRESHOLD: '{raw}'"))?;
    }
    Ok(())
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("recap"))
}

/// Create a store from its configuration.
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn ExamStore>> {
    match config {
        StoreConfig::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreConfig::Json { path } => {
            let store = JsonStore::open(path.clone())
                .await
                .with_context(|| format!("failed to open store at {}", path.display()))?;
            Ok(Arc::new(store))
        }
    }
}
