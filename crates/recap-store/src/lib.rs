//! recap-store: storage backends for recap.
//!
//! Implements the `ExamStore` trait over an in-memory state, optionally
//! persisted as a JSON snapshot, plus configuration loading.

pub mod config;
pub mod error;
pub mod json;
pub mod memory;
pub mod state;

pub use config::{create_store, load_config, load_config_from, RecapConfig, StoreConfig};
pub use error::StoreError;
pub use json::JsonStore;
pub use memory::MemoryStore;
