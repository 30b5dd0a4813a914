//! Secondary indexes over the entity store.
//!
//! An index maps a derived key, computed from an entity's contents by the
//! projection in its [`IndexDefinition`], to the paths of every entity that
//! currently projects to that key. Entries live in their own keyspace
//! (`index/<name>`) as `EscapedDerivedKey|EncodedPath` with an empty value.
//!
//! Index writes are separate from primary writes. The owning repository
//! calls [`SecondaryIndex::save`] right after every
//! [`EntityStore::save`](crate::store::EntityStore::save), passing the value
//! it read before overwriting. There is no transaction spanning the two
//! writes: if the second one is lost the index is stale until the path is
//! saved again or the index is rebuilt. Staleness is never reported as an
//! error.
//!
//! [`SecondaryIndex::populate`] backfills an empty index from the primary
//! store. It is safe to call before every search, but a write that lands
//! while the backfill scan is running may or may not be captured.

mod definition;
mod registry;
mod secondary;

pub use definition::{IndexDefinition, Projection};
pub use registry::{IndexMaintenance, IndexRegistry};
pub use secondary::{IndexEntities, IndexHits, SecondaryIndex};
