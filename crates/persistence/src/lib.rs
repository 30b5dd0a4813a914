//! Helios Key-Value Persistence Core
//!
//! This crate stores hierarchically addressed clinical entities (patients,
//! encounters, observations, ...) in a sorted, range-scannable key-value
//! store. It provides the primary entity store, lazily backfilled secondary
//! indexes, and append-only message logs with per-parent consumer
//! checkpoints.
//!
//! # Features
//!
//! - **Hierarchical keys**: `Patient=P1&Encounter=E9&` style keys whose byte
//!   order groups every descendant of a path under its prefix
//! - **Schema-agnostic storage**: payloads go through an injected
//!   [`EntityCodec`](codec::EntityCodec); JSON via `serde_json` by default
//! - **Secondary indexes**: derived-key lookups maintained by the caller,
//!   with backfill and rebuild as the recovery path
//! - **Message logs**: chronologically ordered keys with a checkpoint that
//!   lets a new consumer skip the existing backlog
//!
//! # Backend Features
//!
//! - `sqlite` (default) - pooled SQLite, in-memory or file-based
//!
//! The in-process memory backend is always available.
//!
//! # Architecture
//!
//! - [`key`] - path and log key encoding
//! - [`core`] - the [`KvBackend`] trait every backend implements
//! - [`backends`] - memory and SQLite backends
//! - [`codec`] - payload serialization boundary
//! - [`store`] - primary entity store
//! - [`index`] - secondary indexes and their registry
//! - [`log`] - message logs and checkpoints
//! - [`context`] - the shared [`StoreContext`]
//! - [`config`] - serde-deserializable configuration
//! - [`error`] - error types for all operations
//!
//! # Quick Start
//!
//! ```
//! use helios_kv_persistence::config::StoreConfig;
//! use helios_kv_persistence::context::StoreContext;
//! use helios_kv_persistence::index::IndexDefinition;
//! use helios_kv_persistence::key::EntityPath;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! struct Encounter {
//!     status: String,
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let context = StoreContext::from_config(StoreConfig::memory())?;
//! let encounters = context.entity_store::<Encounter>();
//! let by_status = context.register_index(
//!     IndexDefinition::new("encounter-status", "Encounter", |e: &Encounter| e.status.clone()),
//!     &encounters,
//! )?;
//!
//! let path = EntityPath::new("Patient", "P1").child("Encounter", "E9");
//! let arrived = Encounter { status: "ARRIVED".into() };
//! encounters.save(&path, &arrived)?;
//! by_status.save(&path, None, &arrived)?;
//!
//! let finished = Encounter { status: "FINISHED".into() };
//! let previous = encounters.read(&path)?;
//! encounters.save(&path, &finished)?;
//! by_status.save(&path, previous.as_ref(), &finished)?;
//!
//! assert_eq!(by_status.search("ARRIVED")?.count(), 0);
//! assert_eq!(by_status.search("FINISHED")?.collect::<Result<Vec<_>, _>>()?, vec![path]);
//! # Ok(())
//! # }
//! ```
//!
//! # Message Logs
//!
//! ```
//! use helios_kv_persistence::context::StoreContext;
//! use helios_kv_persistence::key::EntityPath;
//! use helios_kv_persistence::log::Checkpoint;
//! use helios_kv_persistence::config::StoreConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let context = StoreContext::from_config(StoreConfig::memory())?;
//! let log = context.message_log();
//! let encounter = EntityPath::new("Encounter", "E9");
//!
//! log.append_message(&encounter, b"ADT^A01")?;
//!
//! // A new consumer starts after the existing backlog.
//! assert!(matches!(log.initialize_checkpoint(&encounter)?, Checkpoint::Set(_)));
//! assert_eq!(log.list_messages(&encounter)?.count(), 0);
//! # Ok(())
//! # }
//! ```
//!
//! # Consistency
//!
//! There are no multi-key transactions. A primary save and the matching
//! index save are two independent writes; a fault between them leaves the
//! index stale until the path is saved again or the index is rebuilt. See
//! [`index`] for details.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod codec;
pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod index;
pub mod key;
pub mod log;
pub mod store;

// Re-export commonly used types at crate root
pub use context::StoreContext;
pub use error::{BackendError, CodecError, StorageError, StorageResult};
pub use key::{EntityPath, LogKey, TypeTag};

// Re-export core traits
pub use codec::{EntityCodec, JsonCodec};
pub use core::{BackendKind, KeyRange, KvBackend};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
