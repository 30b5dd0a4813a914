use std::fmt;

use crate::codec::{EntityCodec, JsonCodec};
use crate::core::{KeyRange, KvBackend, KvScan};
use crate::error::{StorageError, StorageResult};
use crate::key::{EntityPath, decode_path, escape};
use crate::store::{EntityStore, StoredEntity};

use super::definition::IndexDefinition;

/// Separator between the derived key and the entity path in an entry key.
const ENTRY_SEPARATOR: char = '|';

/// A secondary index bound to the entity store it covers.
///
/// Cloning shares the backend and the definition.
pub struct SecondaryIndex<E, C = JsonCodec<E>> {
    definition: IndexDefinition<E>,
    store: EntityStore<E, C>,
    keyspace: String,
}

impl<E, C> Clone for SecondaryIndex<E, C> {
    fn clone(&self) -> Self {
        Self {
            definition: self.definition.clone(),
            store: self.store.clone(),
            keyspace: self.keyspace.clone(),
        }
    }
}

impl<E, C> fmt::Debug for SecondaryIndex<E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecondaryIndex")
            .field("name", &self.definition.name())
            .field("type_tag", self.definition.type_tag())
            .finish()
    }
}

impl<E, C> SecondaryIndex<E, C> {
    /// Binds `definition` to `store`.
    pub fn new(definition: IndexDefinition<E>, store: EntityStore<E, C>) -> Self {
        let keyspace = definition.keyspace();
        Self {
            definition,
            store,
            keyspace,
        }
    }

    /// Returns the index definition.
    pub fn definition(&self) -> &IndexDefinition<E> {
        &self.definition
    }

    /// Returns the keyspace holding this index's entries.
    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    fn backend(&self) -> &dyn KvBackend {
        self.store.backend().as_ref()
    }

    /// Records that the entity at `path` changed from `previous` to `new`.
    ///
    /// The mapping for the old derived key is removed when it differs from
    /// the new one. The mapping for the new derived key is always written,
    /// so repeating a save repairs an entry lost to an earlier fault.
    pub fn save(&self, path: &EntityPath, previous: Option<&E>, new: &E) -> StorageResult<()> {
        let new_key = self.definition.project(new);
        if let Some(previous) = previous {
            let old_key = self.definition.project(previous);
            if old_key != new_key {
                self.backend()
                    .delete(&self.keyspace, &entry_key(&old_key, path))?;
                tracing::debug!(
                    index = %self.definition.name(),
                    path = %path,
                    old_key = %old_key,
                    "Removed index entry"
                );
            }
        }
        self.backend()
            .put(&self.keyspace, &entry_key(&new_key, path), &[])?;
        tracing::debug!(
            index = %self.definition.name(),
            path = %path,
            key = %new_key,
            "Installed index entry"
        );
        Ok(())
    }

    /// Removes the mapping for `entity` at `path`.
    pub fn delete(&self, path: &EntityPath, entity: &E) -> StorageResult<()> {
        let key = self.definition.project(entity);
        self.backend()
            .delete(&self.keyspace, &entry_key(&key, path))?;
        tracing::debug!(
            index = %self.definition.name(),
            path = %path,
            key = %key,
            "Removed index entry"
        );
        Ok(())
    }

    /// Streams every path currently mapped to `derived_key`.
    ///
    /// Entries left behind by a lost index write are included; use
    /// [`search_entities`](Self::search_entities) to filter them out.
    pub fn search(&self, derived_key: &str) -> StorageResult<IndexHits> {
        let prefix = search_prefix(derived_key);
        let scan = self
            .backend()
            .scan(&self.keyspace, KeyRange::prefix(prefix.as_bytes()))?;
        Ok(IndexHits {
            scan,
            prefix_len: prefix.len(),
        })
    }

    /// Returns true if the index holds no entries.
    pub fn is_empty(&self) -> StorageResult<bool> {
        let mut scan = self.backend().scan(&self.keyspace, KeyRange::all())?;
        match scan.next() {
            None => Ok(true),
            Some(Ok(_)) => Ok(false),
            Some(Err(e)) => Err(e.into()),
        }
    }

    /// Removes every entry and returns how many were removed.
    pub fn clear(&self) -> StorageResult<u64> {
        let removed = self.backend().delete_range(&self.keyspace, KeyRange::all())?;
        tracing::info!(
            index = %self.definition.name(),
            removed,
            "Cleared index"
        );
        Ok(removed)
    }
}

impl<E, C> SecondaryIndex<E, C>
where
    C: EntityCodec<E> + 'static,
    E: 'static,
{
    /// Backfills the index from the entity store if it is empty.
    ///
    /// Returns the number of entries written, zero if the index already held
    /// entries. Concurrent calls may both backfill; the result is the same.
    pub fn populate(&self) -> StorageResult<usize> {
        if !self.is_empty()? {
            return Ok(0);
        }
        self.backfill()
    }

    /// Clears the index and backfills it from the entity store.
    pub fn rebuild(&self) -> StorageResult<usize> {
        self.clear()?;
        self.backfill()
    }

    fn backfill(&self) -> StorageResult<usize> {
        tracing::info!(
            index = %self.definition.name(),
            type_tag = %self.definition.type_tag(),
            "Backfilling index"
        );
        let mut written = 0usize;
        for stored in self.store.stream_all(self.definition.type_tag())? {
            let stored = stored?;
            let key = self.definition.project(&stored.entity);
            self.backend()
                .put(&self.keyspace, &entry_key(&key, &stored.path), &[])?;
            written += 1;
        }
        tracing::info!(
            index = %self.definition.name(),
            entries = written,
            "Backfilled index"
        );
        Ok(written)
    }

    /// Streams the entities currently mapped to `derived_key`.
    ///
    /// Each hit is read back from the entity store. Hits whose record is gone
    /// or no longer projects to `derived_key` are skipped.
    pub fn search_entities(&self, derived_key: &str) -> StorageResult<IndexEntities<E, C>> {
        Ok(IndexEntities {
            hits: self.search(derived_key)?,
            definition: self.definition.clone(),
            store: self.store.clone(),
            derived_key: derived_key.to_string(),
        })
    }
}

/// Lazy stream of the paths mapped to one derived key.
pub struct IndexHits {
    scan: KvScan,
    prefix_len: usize,
}

impl fmt::Debug for IndexHits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexHits").finish_non_exhaustive()
    }
}

impl Iterator for IndexHits {
    type Item = StorageResult<EntityPath>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(match self.scan.next()? {
            Ok((key, _)) => path_from_entry(&key, self.prefix_len),
            Err(e) => Err(e.into()),
        })
    }
}

/// Lazy stream of the live entities mapped to one derived key.
pub struct IndexEntities<E, C> {
    hits: IndexHits,
    definition: IndexDefinition<E>,
    store: EntityStore<E, C>,
    derived_key: String,
}

impl<E, C> fmt::Debug for IndexEntities<E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexEntities")
            .field("index", &self.definition.name())
            .field("derived_key", &self.derived_key)
            .finish_non_exhaustive()
    }
}

impl<E, C> Iterator for IndexEntities<E, C>
where
    C: EntityCodec<E>,
{
    type Item = StorageResult<StoredEntity<E>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let path = match self.hits.next()? {
                Ok(path) => path,
                Err(e) => return Some(Err(e)),
            };
            match self.store.read(&path) {
                Ok(Some(entity)) if self.definition.project(&entity) == self.derived_key => {
                    return Some(Ok(StoredEntity { path, entity }));
                }
                Ok(_) => {
                    tracing::debug!(
                        index = %self.definition.name(),
                        path = %path,
                        "Skipping stale index entry"
                    );
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

fn search_prefix(derived_key: &str) -> String {
    let mut prefix = escape(derived_key);
    prefix.push(ENTRY_SEPARATOR);
    prefix
}

fn entry_key(derived_key: &str, path: &EntityPath) -> Vec<u8> {
    let mut key = search_prefix(derived_key);
    key.push_str(&path.encode());
    key.into_bytes()
}

fn path_from_entry(entry: &[u8], prefix_len: usize) -> StorageResult<EntityPath> {
    let Some(encoded) = entry.get(prefix_len..) else {
        return Err(StorageError::malformed_key(
            entry,
            "index entry is shorter than its search prefix",
        ));
    };
    let encoded = std::str::from_utf8(encoded)
        .map_err(|_| StorageError::malformed_key(entry, "index entry is not valid UTF-8"))?;
    decode_path(encoded)
}
