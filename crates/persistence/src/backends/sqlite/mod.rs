//! SQLite backend implementation.
//!
//! Stores every keyspace in a single table keyed by `(space, key)`. Keys are
//! BLOBs, which SQLite orders byte-wise, so prefix and range scans map onto
//! primary-key range queries. Supports both in-memory databases (for tests)
//! and file-based databases.
//!
//! # Example
//!
//! ```no_run
//! use helios_kv_persistence::backends::sqlite::SqliteBackend;
//! use helios_kv_persistence::core::KvBackend;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Create an in-memory database (schema is initialized on open)
//! let backend = SqliteBackend::in_memory()?;
//! backend.put("entities", b"Patient=P1&", b"{}")?;
//!
//! // Or use a file-based database
//! let backend = SqliteBackend::open("./data/clinical.db")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE kv_entries (
//!     space TEXT NOT NULL,
//!     key BLOB NOT NULL,
//!     value BLOB NOT NULL,
//!     PRIMARY KEY (space, key)
//! ) WITHOUT ROWID;
//! ```

mod backend;
mod schema;

pub use backend::{SqliteBackend, SqliteBackendConfig};
pub use schema::SCHEMA_VERSION;
