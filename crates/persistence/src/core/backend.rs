//! Backend abstraction for sorted key-value stores.
//!
//! This module defines the [`KvBackend`] trait, the single seam between the
//! persistence engine and the store that actually holds bytes. A backend keeps
//! any number of named keyspaces; within a keyspace keys are ordered byte-wise
//! and can be range-scanned.

use std::fmt::Debug;
use std::ops::Bound;

use crate::error::BackendError;

/// Default number of entries a scan fetches per batch.
pub const DEFAULT_SCAN_BATCH_SIZE: usize = 256;

/// A key/value pair returned by a scan.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// A lazy, forward-only, single-pass scan over a key range.
///
/// Backends hold their lock or connection for one batch at a time, so an open
/// scan pins nothing and the caller may use the backend between items.
pub type KvScan = Box<dyn Iterator<Item = Result<KvPair, BackendError>> + Send>;

/// Identifies the type of key-value backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// In-process ordered map.
    Memory,
    /// SQLite database (file-based or in-memory).
    Sqlite,
    /// Custom or unknown backend.
    Custom(&'static str),
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::Sqlite => write!(f, "sqlite"),
            BackendKind::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// A contiguous range of keys.
///
/// # Examples
///
/// ```
/// use helios_kv_persistence::core::KeyRange;
///
/// let range = KeyRange::prefix(b"Patient=P1&".to_vec());
/// assert!(range.contains(b"Patient=P1&Encounter=E9&"));
/// assert!(!range.contains(b"Patient=P10&"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    /// Lower bound.
    pub start: Bound<Vec<u8>>,
    /// Upper bound.
    pub end: Bound<Vec<u8>>,
}

impl KeyRange {
    /// Every key in the keyspace.
    pub fn all() -> Self {
        Self {
            start: Bound::Unbounded,
            end: Bound::Unbounded,
        }
    }

    /// Every key starting with `prefix`.
    pub fn prefix(prefix: impl Into<Vec<u8>>) -> Self {
        let prefix = prefix.into();
        let end = match prefix_successor(&prefix) {
            Some(successor) => Bound::Excluded(successor),
            None => Bound::Unbounded,
        };
        Self {
            start: Bound::Included(prefix),
            end,
        }
    }

    /// Every key starting with `prefix` that sorts strictly after `after`.
    pub fn prefix_after(prefix: impl Into<Vec<u8>>, after: impl Into<Vec<u8>>) -> Self {
        let mut range = Self::prefix(prefix);
        let after = after.into();
        let after_is_below_prefix = match &range.start {
            Bound::Included(start) => after < *start,
            _ => false,
        };
        if !after_is_below_prefix {
            range.start = Bound::Excluded(after);
        }
        range
    }

    /// Returns a copy of this range that starts strictly after `key`.
    pub fn resume_after(&self, key: Vec<u8>) -> Self {
        Self {
            start: Bound::Excluded(key),
            end: self.end.clone(),
        }
    }

    /// Returns true if no key can fall within the range.
    pub fn is_empty(&self) -> bool {
        match (&self.start, &self.end) {
            (Bound::Included(start), Bound::Included(end)) => start > end,
            (Bound::Included(start), Bound::Excluded(end))
            | (Bound::Excluded(start), Bound::Included(end))
            | (Bound::Excluded(start), Bound::Excluded(end)) => start >= end,
            _ => false,
        }
    }

    /// Returns true if `key` falls within the range.
    pub fn contains(&self, key: &[u8]) -> bool {
        let above_start = match &self.start {
            Bound::Included(start) => key >= start.as_slice(),
            Bound::Excluded(start) => key > start.as_slice(),
            Bound::Unbounded => true,
        };
        let below_end = match &self.end {
            Bound::Included(end) => key <= end.as_slice(),
            Bound::Excluded(end) => key < end.as_slice(),
            Bound::Unbounded => true,
        };
        above_start && below_end
    }
}

/// Returns the smallest byte string greater than every string prefixed by
/// `prefix`, or `None` if no such string exists (empty or all `0xff`).
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut successor = prefix.to_vec();
    while let Some(last) = successor.pop() {
        if last < u8::MAX {
            successor.push(last + 1);
            return Some(successor);
        }
    }
    None
}

/// A sorted, range-scannable key-value store.
///
/// Every call is blocking and safe to invoke concurrently from several
/// threads. There are no multi-key transactions: each call is an independent
/// write or read.
///
/// Implementations do not retry; a failed call surfaces as a
/// [`BackendError`] and retry policy is left to whoever owns the connection.
pub trait KvBackend: Debug + Send + Sync {
    /// Returns the kind of this backend.
    fn kind(&self) -> BackendKind;

    /// Returns a human-readable name for this backend.
    fn name(&self) -> &'static str;

    /// Reads the value stored at `key`.
    fn get(&self, keyspace: &str, key: &[u8]) -> Result<Option<Vec<u8>>, BackendError>;

    /// Writes `value` at `key`, replacing any previous value.
    fn put(&self, keyspace: &str, key: &[u8], value: &[u8]) -> Result<(), BackendError>;

    /// Removes `key`. Removing an absent key is not an error.
    fn delete(&self, keyspace: &str, key: &[u8]) -> Result<(), BackendError>;

    /// Opens a lazy scan over `range` in ascending key order.
    fn scan(&self, keyspace: &str, range: KeyRange) -> Result<KvScan, BackendError>;

    /// Returns the entry with the greatest key within `range`.
    fn last_in_range(&self, keyspace: &str, range: KeyRange)
    -> Result<Option<KvPair>, BackendError>;

    /// Removes every key within `range` and returns how many were removed.
    fn delete_range(&self, keyspace: &str, range: KeyRange) -> Result<u64, BackendError>;

    /// Checks that the backend is reachable.
    fn health_check(&self) -> Result<(), BackendError>;
}
