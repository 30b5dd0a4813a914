//! Core storage abstractions.
//!
//! - [`KvBackend`] - sorted key-value store driver
//! - [`KeyRange`] - byte range for scans and bulk deletes
//! - [`KvScan`] - lazy, self-releasing scan cursor
//!
//! Everything above this layer (entity store, secondary indexes, message
//! logs) talks to the store only through [`KvBackend`].
//!
//! # Example: Implementing a Backend
//!
//! ```ignore
//! use helios_kv_persistence::core::{BackendKind, KeyRange, KvBackend, KvPair, KvScan};
//! use helios_kv_persistence::error::BackendError;
//!
//! #[derive(Debug)]
//! struct MyBackend {
//!     // ... connection handle
//! }
//!
//! impl KvBackend for MyBackend {
//!     fn kind(&self) -> BackendKind {
//!         BackendKind::Custom("my-backend")
//!     }
//!
//!     fn get(&self, keyspace: &str, key: &[u8]) -> Result<Option<Vec<u8>>, BackendError> {
//!         // Implementation...
//!         todo!()
//!     }
//!
//!     // ... implement the remaining methods
//! }
//! ```

pub mod backend;

pub use backend::{
    BackendKind, DEFAULT_SCAN_BATCH_SIZE, KeyRange, KvBackend, KvPair, KvScan, prefix_successor,
};
