use std::collections::BTreeMap;
use std::sync::Arc;

use crate::codec::EntityCodec;
use crate::error::{StorageError, StorageResult};
use crate::key::TypeTag;

use super::secondary::SecondaryIndex;

/// Type-erased maintenance operations shared by every secondary index.
pub trait IndexMaintenance: Send + Sync {
    /// Returns the index name.
    fn name(&self) -> &str;

    /// Returns the covered entity type.
    fn type_tag(&self) -> &TypeTag;

    /// Returns true if the index holds no entries.
    fn is_empty(&self) -> StorageResult<bool>;

    /// Backfills the index if it is empty.
    fn populate(&self) -> StorageResult<usize>;

    /// Clears and backfills the index.
    fn rebuild(&self) -> StorageResult<usize>;

    /// Removes every entry.
    fn clear(&self) -> StorageResult<u64>;
}

impl<E, C> IndexMaintenance for SecondaryIndex<E, C>
where
    C: EntityCodec<E> + 'static,
    E: 'static,
{
    fn name(&self) -> &str {
        self.definition().name()
    }

    fn type_tag(&self) -> &TypeTag {
        self.definition().type_tag()
    }

    fn is_empty(&self) -> StorageResult<bool> {
        SecondaryIndex::is_empty(self)
    }

    fn populate(&self) -> StorageResult<usize> {
        SecondaryIndex::populate(self)
    }

    fn rebuild(&self) -> StorageResult<usize> {
        SecondaryIndex::rebuild(self)
    }

    fn clear(&self) -> StorageResult<u64> {
        SecondaryIndex::clear(self)
    }
}

/// Named collection of the indexes declared against one store.
///
/// Cloning is cheap and shares the registered indexes.
#[derive(Clone, Default)]
pub struct IndexRegistry {
    indexes: BTreeMap<String, Arc<dyn IndexMaintenance>>,
}

impl IndexRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of registered indexes.
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    /// Returns true if no index is registered.
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Registers an index under its name.
    ///
    /// Registering a name again for the same type replaces the previous
    /// entry. Registering it for a different type fails with
    /// [`StorageError::IndexConflict`].
    pub fn register(&mut self, index: Arc<dyn IndexMaintenance>) -> StorageResult<()> {
        if let Some(existing) = self.indexes.get(index.name()) {
            if existing.type_tag() != index.type_tag() {
                return Err(StorageError::IndexConflict {
                    name: index.name().to_string(),
                    existing: existing.type_tag().clone(),
                    requested: index.type_tag().clone(),
                });
            }
            tracing::warn!(
                index = %index.name(),
                type_tag = %index.type_tag(),
                "Index registered again, replacing previous definition"
            );
        }
        self.indexes.insert(index.name().to_string(), index);
        Ok(())
    }

    /// Looks up an index by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn IndexMaintenance>> {
        self.indexes.get(name).cloned()
    }

    /// Returns the registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.indexes.keys().cloned().collect()
    }

    /// Returns every registered index.
    pub fn indexes(&self) -> Vec<Arc<dyn IndexMaintenance>> {
        self.indexes.values().cloned().collect()
    }

    /// Backfills every empty index and returns the total number of entries
    /// written.
    pub fn populate_all(&self) -> StorageResult<usize> {
        let mut total = 0;
        for index in self.indexes.values() {
            total += index.populate()?;
        }
        Ok(total)
    }

    /// Rebuilds every index and returns the total number of entries written.
    pub fn rebuild_all(&self) -> StorageResult<usize> {
        let mut total = 0;
        for index in self.indexes.values() {
            total += index.rebuild()?;
        }
        Ok(total)
    }
}

impl std::fmt::Debug for IndexRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexRegistry")
            .field("indexes", &self.names())
            .finish()
    }
}
