//! In-process ordered backend.
//!
//! Keeps one `BTreeMap` per keyspace behind a shared lock. Scans read in
//! batches and drop the lock between batches, so a caller may write to the
//! backend while iterating.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::{BackendKind, DEFAULT_SCAN_BATCH_SIZE, KeyRange, KvBackend, KvPair, KvScan};
use crate::error::BackendError;

type Keyspaces = HashMap<String, BTreeMap<Vec<u8>, Vec<u8>>>;

/// In-memory key-value backend.
///
/// Cloning shares the underlying data.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    data: Arc<RwLock<Keyspaces>>,
    scan_batch_size: usize,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
        }
    }

    /// Sets the number of entries a scan reads per batch.
    pub fn with_scan_batch_size(mut self, batch_size: usize) -> Self {
        self.scan_batch_size = batch_size.max(1);
        self
    }

    /// Returns the number of keys in a keyspace.
    pub fn len(&self, keyspace: &str) -> usize {
        self.data.read().get(keyspace).map_or(0, BTreeMap::len)
    }

    /// Returns true if a keyspace holds no keys.
    pub fn is_empty(&self, keyspace: &str) -> bool {
        self.len(keyspace) == 0
    }

    /// Returns the names of all keyspaces that have been written to.
    pub fn keyspaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.data.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl KvBackend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, keyspace: &str, key: &[u8]) -> Result<Option<Vec<u8>>, BackendError> {
        Ok(self
            .data
            .read()
            .get(keyspace)
            .and_then(|map| map.get(key).cloned()))
    }

    fn put(&self, keyspace: &str, key: &[u8], value: &[u8]) -> Result<(), BackendError> {
        self.data
            .write()
            .entry(keyspace.to_string())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, keyspace: &str, key: &[u8]) -> Result<(), BackendError> {
        if let Some(map) = self.data.write().get_mut(keyspace) {
            map.remove(key);
        }
        Ok(())
    }

    fn scan(&self, keyspace: &str, range: KeyRange) -> Result<KvScan, BackendError> {
        Ok(Box::new(MemoryScan {
            data: Arc::clone(&self.data),
            keyspace: keyspace.to_string(),
            exhausted: range.is_empty(),
            range,
            batch: VecDeque::new(),
            batch_size: self.scan_batch_size,
        }))
    }

    fn last_in_range(
        &self,
        keyspace: &str,
        range: KeyRange,
    ) -> Result<Option<KvPair>, BackendError> {
        if range.is_empty() {
            return Ok(None);
        }
        Ok(self.data.read().get(keyspace).and_then(|map| {
            map.range((range.start, range.end))
                .next_back()
                .map(|(k, v)| (k.clone(), v.clone()))
        }))
    }

    fn delete_range(&self, keyspace: &str, range: KeyRange) -> Result<u64, BackendError> {
        if range.is_empty() {
            return Ok(0);
        }
        let mut data = self.data.write();
        let Some(map) = data.get_mut(keyspace) else {
            return Ok(0);
        };
        let doomed: Vec<Vec<u8>> = map
            .range((range.start, range.end))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &doomed {
            map.remove(key);
        }
        Ok(doomed.len() as u64)
    }

    fn health_check(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Batched cursor over one keyspace.
struct MemoryScan {
    data: Arc<RwLock<Keyspaces>>,
    keyspace: String,
    range: KeyRange,
    batch: VecDeque<KvPair>,
    batch_size: usize,
    exhausted: bool,
}

impl MemoryScan {
    fn refill(&mut self) {
        let data = self.data.read();
        let Some(map) = data.get(&self.keyspace) else {
            self.exhausted = true;
            return;
        };
        self.batch.extend(
            map.range((self.range.start.clone(), self.range.end.clone()))
                .take(self.batch_size)
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        match self.batch.back() {
            Some((last, _)) if self.batch.len() == self.batch_size => {
                self.range = self.range.resume_after(last.clone());
            }
            _ => self.exhausted = true,
        }
    }
}

impl Iterator for MemoryScan {
    type Item = Result<KvPair, BackendError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.batch.is_empty() && !self.exhausted {
            self.refill();
        }
        self.batch.pop_front().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPACE: &str = "entities";

    fn keys(scan: KvScan) -> Vec<Vec<u8>> {
        scan.map(|r| r.unwrap().0).collect()
    }

    #[test]
    fn test_put_get_delete() {
        let backend = MemoryBackend::new();
        backend.put(SPACE, b"a", b"1").unwrap();
        assert_eq!(backend.get(SPACE, b"a").unwrap(), Some(b"1".to_vec()));

        backend.put(SPACE, b"a", b"2").unwrap();
        assert_eq!(backend.get(SPACE, b"a").unwrap(), Some(b"2".to_vec()));

        backend.delete(SPACE, b"a").unwrap();
        assert_eq!(backend.get(SPACE, b"a").unwrap(), None);
        backend.delete("missing", b"a").unwrap();
    }

    #[test]
    fn test_keyspaces_are_isolated() {
        let backend = MemoryBackend::new();
        backend.put("one", b"k", b"1").unwrap();
        assert_eq!(backend.get("two", b"k").unwrap(), None);
        assert_eq!(backend.keyspaces(), vec!["one".to_string()]);
    }

    #[test]
    fn test_scan_spans_batches_in_order() {
        let backend = MemoryBackend::new().with_scan_batch_size(2);
        for key in ["e", "a", "d", "b", "c"] {
            backend.put(SPACE, key.as_bytes(), b"").unwrap();
        }
        let scanned = keys(backend.scan(SPACE, KeyRange::all()).unwrap());
        assert_eq!(
            scanned,
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec(), b"e".to_vec()]
        );
    }

    #[test]
    fn test_scan_prefix_stops_outside_prefix() {
        let backend = MemoryBackend::new();
        backend.put(SPACE, b"P1&", b"").unwrap();
        backend.put(SPACE, b"P1&E1&", b"").unwrap();
        backend.put(SPACE, b"P10&", b"").unwrap();
        backend.put(SPACE, b"P2&", b"").unwrap();
        let scanned = keys(backend.scan(SPACE, KeyRange::prefix(b"P1&".to_vec())).unwrap());
        assert_eq!(scanned, vec![b"P1&".to_vec(), b"P1&E1&".to_vec()]);
    }

    #[test]
    fn test_scan_sees_writes_between_batches() {
        let backend = MemoryBackend::new().with_scan_batch_size(1);
        backend.put(SPACE, b"a", b"").unwrap();
        backend.put(SPACE, b"b", b"").unwrap();
        let mut scan = backend.scan(SPACE, KeyRange::all()).unwrap();
        assert_eq!(scan.next().unwrap().unwrap().0, b"a".to_vec());
        backend.put(SPACE, b"c", b"").unwrap();
        let rest: Vec<_> = scan.map(|r| r.unwrap().0).collect();
        assert_eq!(rest, vec![b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn test_last_in_range_and_delete_range() {
        let backend = MemoryBackend::new();
        for key in ["m|1", "m|2", "m|3", "n|1"] {
            backend.put(SPACE, key.as_bytes(), key.as_bytes()).unwrap();
        }
        let last = backend
            .last_in_range(SPACE, KeyRange::prefix(b"m|".to_vec()))
            .unwrap()
            .unwrap();
        assert_eq!(last.0, b"m|3".to_vec());

        let removed = backend
            .delete_range(SPACE, KeyRange::prefix(b"m|".to_vec()))
            .unwrap();
        assert_eq!(removed, 3);
        assert_eq!(backend.len(SPACE), 1);
    }

    #[test]
    fn test_empty_range_does_not_panic() {
        let backend = MemoryBackend::new();
        backend.put(SPACE, b"a", b"").unwrap();
        let range = KeyRange::prefix_after(b"a".to_vec(), b"z".to_vec());
        assert!(keys(backend.scan(SPACE, range.clone()).unwrap()).is_empty());
        assert!(backend.last_in_range(SPACE, range.clone()).unwrap().is_none());
        assert_eq!(backend.delete_range(SPACE, range).unwrap(), 0);
    }
}
