//! Store context.
//!
//! A [`StoreContext`] is built once at startup and passed to repositories. It
//! owns the backend handle and the registry of secondary indexes, and hands
//! out entity stores, indexes and message logs that share that handle.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::codec::{EntityCodec, JsonCodec};
use crate::config::StoreConfig;
use crate::core::KvBackend;
use crate::error::StorageResult;
use crate::index::{IndexDefinition, IndexMaintenance, IndexRegistry, SecondaryIndex};
use crate::log::MessageLog;
use crate::store::EntityStore;

/// Shared handle to one key-value store and the indexes declared on it.
pub struct StoreContext {
    backend: Arc<dyn KvBackend>,
    config: StoreConfig,
    indexes: RwLock<IndexRegistry>,
}

impl fmt::Debug for StoreContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreContext")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .field("indexes", &self.index_names())
            .finish()
    }
}

impl StoreContext {
    /// Wraps an already opened backend.
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self {
            backend,
            config: StoreConfig::default(),
            indexes: RwLock::new(IndexRegistry::new()),
        }
    }

    /// Opens the backend described by `config`.
    pub fn from_config(config: StoreConfig) -> StorageResult<Self> {
        let backend = config.backend.open(config.scan_batch_size)?;
        tracing::info!(
            backend = %backend.kind(),
            scan_batch_size = config.scan_batch_size,
            "Opened store"
        );
        Ok(Self {
            backend,
            config,
            indexes: RwLock::new(IndexRegistry::new()),
        })
    }

    /// Returns the backend handle.
    pub fn backend(&self) -> &Arc<dyn KvBackend> {
        &self.backend
    }

    /// Returns the configuration this context was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Checks that the backend is reachable.
    pub fn health_check(&self) -> StorageResult<()> {
        Ok(self.backend.health_check()?)
    }

    /// Returns a JSON entity store for `E`.
    pub fn entity_store<E>(&self) -> EntityStore<E, JsonCodec<E>> {
        EntityStore::with_codec(Arc::clone(&self.backend), JsonCodec::new())
    }

    /// Returns an entity store for `E` using `codec`.
    pub fn entity_store_with_codec<E, C>(&self, codec: C) -> EntityStore<E, C>
    where
        C: EntityCodec<E>,
    {
        EntityStore::with_codec(Arc::clone(&self.backend), codec)
    }

    /// Returns the message log.
    pub fn message_log(&self) -> MessageLog {
        MessageLog::new(Arc::clone(&self.backend))
    }

    /// Declares a secondary index over `store` and registers it.
    ///
    /// Fails with [`IndexConflict`](crate::error::StorageError::IndexConflict)
    /// if the name is already registered for another type.
    pub fn register_index<E, C>(
        &self,
        definition: IndexDefinition<E>,
        store: &EntityStore<E, C>,
    ) -> StorageResult<SecondaryIndex<E, C>>
    where
        C: EntityCodec<E> + 'static,
        E: 'static,
    {
        let index = SecondaryIndex::new(definition, store.clone());
        self.indexes.write().register(Arc::new(index.clone()))?;
        tracing::debug!(
            index = %index.definition().name(),
            type_tag = %index.definition().type_tag(),
            "Registered index"
        );
        Ok(index)
    }

    /// Returns the names of all registered indexes.
    pub fn index_names(&self) -> Vec<String> {
        self.indexes.read().names()
    }

    /// Looks up a registered index by name.
    pub fn index(&self, name: &str) -> Option<Arc<dyn IndexMaintenance>> {
        self.indexes.read().get(name)
    }

    /// Backfills every empty registered index.
    pub fn populate_indexes(&self) -> StorageResult<usize> {
        // Snapshot so no lock is held while scanning.
        let registry = self.indexes.read().clone();
        registry.populate_all()
    }

    /// Rebuilds every registered index from the entity store.
    pub fn rebuild_indexes(&self) -> StorageResult<usize> {
        let registry = self.indexes.read().clone();
        registry.rebuild_all()
    }
}
