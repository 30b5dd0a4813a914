//! Primary entity store.
//!
//! Entities live in the `entities` keyspace under `encode_path(path)`. The
//! store is generic over the entity type and an [`EntityCodec`], and never
//! inspects payloads.
//!
//! Secondary indexes are not maintained here. A repository that saves an
//! entity is responsible for the matching
//! [`SecondaryIndex::save`](crate::index::SecondaryIndex::save) call.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use helios_kv_persistence::backends::MemoryBackend;
//! use helios_kv_persistence::key::{EntityPath, TypeTag};
//! use helios_kv_persistence::store::EntityStore;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Patient {
//!     name: String,
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = EntityStore::<Patient>::new(Arc::new(MemoryBackend::new()));
//! let path = EntityPath::new("Patient", "P1");
//!
//! store.save(&path, &Patient { name: "Ada".into() })?;
//! assert_eq!(store.read(&path)?, Some(Patient { name: "Ada".into() }));
//!
//! let all: Vec<_> = store
//!     .stream_all(&TypeTag::new("Patient"))?
//!     .collect::<Result<_, _>>()?;
//! assert_eq!(all.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! [`EntityCodec`]: crate::codec::EntityCodec

mod entity;
mod stream;

pub use entity::{ENTITY_KEYSPACE, EntityStore};
pub use stream::{EntityStream, StoredEntity};
