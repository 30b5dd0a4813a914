use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::codec::{EntityCodec, JsonCodec};
use crate::core::{KeyRange, KvBackend};
use crate::error::{StorageError, StorageResult};
use crate::key::{EntityPath, TypeTag};

use super::stream::EntityStream;

/// Keyspace holding primary entity records.
pub const ENTITY_KEYSPACE: &str = "entities";

/// Generic store for entities addressed by [`EntityPath`].
///
/// Every operation is a single blocking call against the backend. Concurrent
/// saves to the same path race and the last write wins.
pub struct EntityStore<E, C = JsonCodec<E>> {
    backend: Arc<dyn KvBackend>,
    codec: Arc<C>,
    _entity: PhantomData<fn() -> E>,
}

impl<E, C> Clone for EntityStore<E, C> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            codec: Arc::clone(&self.codec),
            _entity: PhantomData,
        }
    }
}

impl<E, C> fmt::Debug for EntityStore<E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityStore")
            .field("backend", &self.backend.name())
            .field("entity", &std::any::type_name::<E>())
            .finish()
    }
}

impl<E, C> EntityStore<E, C>
where
    C: Default,
{
    /// Creates a store using the codec's default configuration.
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self::with_codec(backend, C::default())
    }
}

impl<E, C> EntityStore<E, C> {
    /// Creates a store with an explicit codec.
    pub fn with_codec(backend: Arc<dyn KvBackend>, codec: C) -> Self {
        Self {
            backend,
            codec: Arc::new(codec),
            _entity: PhantomData,
        }
    }

    /// Returns the backend this store writes to.
    pub fn backend(&self) -> &Arc<dyn KvBackend> {
        &self.backend
    }
}

impl<E, C> EntityStore<E, C>
where
    C: EntityCodec<E>,
{
    /// Writes `entity` at `path`, replacing any previous value.
    pub fn save(&self, path: &EntityPath, entity: &E) -> StorageResult<()> {
        let key = entity_key(path)?;
        let bytes = self
            .codec
            .encode(entity)
            .map_err(|e| StorageError::Encode { message: e.message })?;
        self.backend.put(ENTITY_KEYSPACE, key.as_bytes(), &bytes)?;
        tracing::debug!(key = %key, bytes = bytes.len(), "Saved entity");
        Ok(())
    }

    /// Reads the entity stored at exactly `path`.
    pub fn read(&self, path: &EntityPath) -> StorageResult<Option<E>> {
        let key = entity_key(path)?;
        let Some(bytes) = self.backend.get(ENTITY_KEYSPACE, key.as_bytes())? else {
            return Ok(None);
        };
        let type_tag = path
            .leaf_type()
            .ok_or_else(|| StorageError::malformed_key(&key, "path has no segments"))?;
        match self.codec.decode(&bytes, type_tag) {
            Ok(entity) => Ok(Some(entity)),
            Err(e) => Err(StorageError::Decode {
                key,
                bytes,
                message: e.message,
            }),
        }
    }

    /// Returns true if a record exists at exactly `path`.
    pub fn exists(&self, path: &EntityPath) -> StorageResult<bool> {
        let key = entity_key(path)?;
        Ok(self.backend.get(ENTITY_KEYSPACE, key.as_bytes())?.is_some())
    }

    /// Removes the record at `path`. Removing an absent record is not an error.
    pub fn delete(&self, path: &EntityPath) -> StorageResult<()> {
        let key = entity_key(path)?;
        self.backend.delete(ENTITY_KEYSPACE, key.as_bytes())?;
        tracing::debug!(key = %key, "Deleted entity");
        Ok(())
    }

    /// Removes every record at or below `prefix` and returns how many were
    /// removed.
    ///
    /// Secondary indexes covering the removed records are left untouched.
    pub fn delete_tree(&self, prefix: &EntityPath) -> StorageResult<u64> {
        let key = prefix.encode();
        let removed = self
            .backend
            .delete_range(ENTITY_KEYSPACE, KeyRange::prefix(key.as_bytes()))?;
        tracing::debug!(prefix = %key, removed, "Deleted entity subtree");
        Ok(removed)
    }
}

impl<E, C> EntityStore<E, C>
where
    C: EntityCodec<E> + 'static,
    E: 'static,
{
    /// Streams every record at or below `prefix` whose leaf type is
    /// `type_tag`, in key order.
    ///
    /// The stream is lazy and holds backend resources until it is dropped.
    pub fn stream(
        &self,
        prefix: &EntityPath,
        type_tag: &TypeTag,
    ) -> StorageResult<EntityStream<E, C>> {
        let range = KeyRange::prefix(prefix.encode().into_bytes());
        let scan = self.backend.scan(ENTITY_KEYSPACE, range)?;
        Ok(EntityStream::new(
            scan,
            Arc::clone(&self.codec),
            type_tag.clone(),
        ))
    }

    /// Streams every record in the store whose leaf type is `type_tag`.
    pub fn stream_all(&self, type_tag: &TypeTag) -> StorageResult<EntityStream<E, C>> {
        self.stream(&EntityPath::root(), type_tag)
    }
}

fn entity_key(path: &EntityPath) -> StorageResult<String> {
    if path.is_empty() {
        return Err(StorageError::malformed_key(
            "",
            "the root path does not address an entity",
        ));
    }
    Ok(path.encode())
}
