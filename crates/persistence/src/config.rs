//! Store configuration.
//!
//! ```
//! use helios_kv_persistence::config::{BackendConfig, StoreConfig};
//!
//! let config: StoreConfig = serde_json::from_str(r#"{ "scan_batch_size": 64 }"#).unwrap();
//! assert_eq!(config.backend, BackendConfig::Memory);
//! assert_eq!(config.scan_batch_size, 64);
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[cfg(feature = "sqlite")]
use crate::backends::sqlite::{SqliteBackend, SqliteBackendConfig};
use crate::backends::MemoryBackend;
use crate::core::{DEFAULT_SCAN_BATCH_SIZE, KvBackend};
use crate::error::BackendError;

/// Which backend to open and how.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// In-process ordered map. Data is lost when the store is dropped.
    #[default]
    Memory,

    /// SQLite database at `path` (`:memory:` for a private in-memory one).
    #[cfg(feature = "sqlite")]
    Sqlite {
        /// Database file path.
        path: String,
        /// Pool and connection settings.
        #[serde(flatten)]
        sqlite: SqliteBackendConfig,
    },
}

impl BackendConfig {
    /// Opens the configured backend.
    pub fn open(&self, scan_batch_size: usize) -> Result<Arc<dyn KvBackend>, BackendError> {
        match self {
            BackendConfig::Memory => Ok(Arc::new(
                MemoryBackend::new().with_scan_batch_size(scan_batch_size),
            )),
            #[cfg(feature = "sqlite")]
            BackendConfig::Sqlite { path, sqlite } => Ok(Arc::new(
                SqliteBackend::with_config(path, sqlite.clone())?
                    .with_scan_batch_size(scan_batch_size),
            )),
        }
    }
}

/// Top-level configuration for a [`StoreContext`](crate::context::StoreContext).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend selection.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Entries fetched per batch by every scan.
    #[serde(default = "default_scan_batch_size")]
    pub scan_batch_size: usize,
}

fn default_scan_batch_size() -> usize {
    DEFAULT_SCAN_BATCH_SIZE
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            scan_batch_size: default_scan_batch_size(),
        }
    }
}

impl StoreConfig {
    /// Configuration for an in-process memory store.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Configuration for a SQLite database at `path` with default pool
    /// settings.
    #[cfg(feature = "sqlite")]
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            backend: BackendConfig::Sqlite {
                path: path.into(),
                sqlite: SqliteBackendConfig::default(),
            },
            ..Self::default()
        }
    }
}
