use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::core::{KeyRange, KvBackend, KvScan};
use crate::error::StorageResult;
use crate::key::{EntityPath, LogKey};

use super::checkpoint::Checkpoint;

/// Keyspace holding log records.
pub const MESSAGE_KEYSPACE: &str = "messages";

/// Keyspace holding one checkpoint per parent.
pub const CHECKPOINT_KEYSPACE: &str = "checkpoints";

/// A stored message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Position of the record in its parent's log.
    pub key: LogKey,
    /// Raw payload as appended.
    pub payload: Vec<u8>,
}

impl LogRecord {
    /// Parses the record's timestamp.
    pub fn timestamp(&self) -> StorageResult<DateTime<Utc>> {
        self.key.timestamp()
    }

    /// Discards the key.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

/// Message logs for every parent path in one backend.
#[derive(Clone)]
pub struct MessageLog {
    backend: Arc<dyn KvBackend>,
}

impl fmt::Debug for MessageLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageLog")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl MessageLog {
    /// Creates a message log over `backend`.
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend }
    }

    /// Appends `payload` under `parent`, stamped with the current time.
    ///
    /// Appending the same payload twice within one millisecond yields the
    /// same key; the second write replaces the first.
    pub fn append_message(&self, parent: &EntityPath, payload: &[u8]) -> StorageResult<LogKey> {
        self.append_message_at(parent, payload, Utc::now())
    }

    /// Appends `payload` under `parent` with a caller-supplied timestamp.
    pub fn append_message_at(
        &self,
        parent: &EntityPath,
        payload: &[u8],
        timestamp: DateTime<Utc>,
    ) -> StorageResult<LogKey> {
        let key = LogKey::new(parent, timestamp, payload);
        let raw = key.to_string();
        self.backend
            .put(MESSAGE_KEYSPACE, raw.as_bytes(), payload)?;
        tracing::debug!(key = %raw, bytes = payload.len(), "Appended message");
        Ok(key)
    }

    /// Streams the unprocessed records of `parent` in key order.
    ///
    /// With a checkpoint set, listing starts strictly after it. Without one,
    /// the whole log is listed.
    pub fn list_messages(&self, parent: &EntityPath) -> StorageResult<MessageStream> {
        let prefix = LogKey::parent_prefix(parent);
        let range = match self.checkpoint(parent)? {
            Checkpoint::Set(key) => KeyRange::prefix_after(prefix, key.to_string()),
            Checkpoint::Unset => KeyRange::prefix(prefix),
        };
        let scan = self.backend.scan(MESSAGE_KEYSPACE, range)?;
        Ok(MessageStream { scan })
    }

    /// Returns the most recent record of `parent`.
    pub fn latest(&self, parent: &EntityPath) -> StorageResult<Option<LogRecord>> {
        let range = KeyRange::prefix(LogKey::parent_prefix(parent));
        let Some((key, payload)) = self.backend.last_in_range(MESSAGE_KEYSPACE, range)? else {
            return Ok(None);
        };
        Ok(Some(LogRecord {
            key: LogKey::parse_bytes(&key)?,
            payload,
        }))
    }

    /// Returns the checkpoint recorded for `parent`.
    pub fn checkpoint(&self, parent: &EntityPath) -> StorageResult<Checkpoint> {
        let Some(raw) = self
            .backend
            .get(CHECKPOINT_KEYSPACE, parent.encode().as_bytes())?
        else {
            return Ok(Checkpoint::Unset);
        };
        Ok(Checkpoint::Set(LogKey::parse_bytes(&raw)?))
    }

    /// Sets the checkpoint of `parent` to its latest record unless a
    /// checkpoint already exists. Leaves it unset when the log is empty.
    pub fn initialize_checkpoint(&self, parent: &EntityPath) -> StorageResult<Checkpoint> {
        let current = self.checkpoint(parent)?;
        if current.is_set() {
            return Ok(current);
        }
        let Some(latest) = self.latest(parent)? else {
            tracing::debug!(parent = %parent, "No messages, checkpoint left unset");
            return Ok(Checkpoint::Unset);
        };
        self.write_checkpoint(parent, &latest.key)?;
        tracing::debug!(parent = %parent, key = %latest.key, "Initialized checkpoint");
        Ok(Checkpoint::Set(latest.key))
    }

    /// Sets the checkpoint of `parent` to `key`.
    ///
    /// The new key is not required to be ahead of the current one; moving
    /// backwards is logged and then written anyway.
    pub fn advance_checkpoint(&self, parent: &EntityPath, key: &LogKey) -> StorageResult<()> {
        if key.parent_key() != parent.encode() {
            tracing::warn!(
                parent = %parent,
                requested = %key,
                "Checkpoint key belongs to another parent"
            );
        }
        if let Checkpoint::Set(current) = self.checkpoint(parent)?
            && key.to_string() <= current.to_string()
        {
            tracing::warn!(
                parent = %parent,
                current = %current,
                requested = %key,
                "Checkpoint is not moving forward"
            );
        }
        self.write_checkpoint(parent, key)?;
        tracing::debug!(parent = %parent, key = %key, "Advanced checkpoint");
        Ok(())
    }

    /// Removes the checkpoint of `parent`, returning it to `Unset`.
    pub fn purge_checkpoint(&self, parent: &EntityPath) -> StorageResult<()> {
        self.backend
            .delete(CHECKPOINT_KEYSPACE, parent.encode().as_bytes())?;
        tracing::debug!(parent = %parent, "Purged checkpoint");
        Ok(())
    }

    /// Removes every record of `parent` and returns how many were removed.
    ///
    /// The checkpoint is kept.
    pub fn delete_all(&self, parent: &EntityPath) -> StorageResult<u64> {
        let range = KeyRange::prefix(LogKey::parent_prefix(parent));
        let removed = self.backend.delete_range(MESSAGE_KEYSPACE, range)?;
        tracing::debug!(parent = %parent, removed, "Deleted messages");
        Ok(removed)
    }

    fn write_checkpoint(&self, parent: &EntityPath, key: &LogKey) -> StorageResult<()> {
        self.backend.put(
            CHECKPOINT_KEYSPACE,
            parent.encode().as_bytes(),
            key.to_string().as_bytes(),
        )?;
        Ok(())
    }
}

/// Lazy stream of log records under one parent.
pub struct MessageStream {
    scan: KvScan,
}

impl fmt::Debug for MessageStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageStream").finish_non_exhaustive()
    }
}

impl Iterator for MessageStream {
    type Item = StorageResult<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(match self.scan.next()? {
            Ok((key, payload)) => LogKey::parse_bytes(&key).map(|key| LogRecord { key, payload }),
            Err(e) => Err(e.into()),
        })
    }
}
