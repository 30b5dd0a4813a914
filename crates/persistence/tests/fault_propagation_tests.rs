//! Backend faults surface to callers unchanged and are never retried.

#![cfg(feature = "sqlite")]

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::*;

use helios_kv_persistence::core::{BackendKind, KeyRange, KvBackend, KvPair, KvScan};
use helios_kv_persistence::error::{BackendError, StorageError, StorageResult};
use helios_kv_persistence::index::SecondaryIndex;
use helios_kv_persistence::key::{EntityPath, TypeTag};
use helios_kv_persistence::log::MessageLog;
use helios_kv_persistence::store::EntityStore;

/// A backend whose every call fails.
///
/// With `fail_mid_scan`, scans open successfully and fail on their first item.
#[derive(Debug, Default)]
struct UnreachableBackend {
    calls: AtomicUsize,
    fail_mid_scan: bool,
}

impl UnreachableBackend {
    fn mid_scan() -> Self {
        Self {
            fail_mid_scan: true,
            ..Self::default()
        }
    }

    /// Returns the calls made since the last check.
    fn take_calls(&self) -> usize {
        self.calls.swap(0, Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(unavailable())
    }
}

fn unavailable() -> BackendError {
    BackendError::Unavailable {
        backend_name: "unreachable".to_string(),
        message: "connection refused".to_string(),
    }
}

impl KvBackend for UnreachableBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Custom("unreachable")
    }

    fn name(&self) -> &'static str {
        "unreachable"
    }

    fn get(&self, _keyspace: &str, _key: &[u8]) -> Result<Option<Vec<u8>>, BackendError> {
        self.fail()
    }

    fn put(&self, _keyspace: &str, _key: &[u8], _value: &[u8]) -> Result<(), BackendError> {
        self.fail()
    }

    fn delete(&self, _keyspace: &str, _key: &[u8]) -> Result<(), BackendError> {
        self.fail()
    }

    fn scan(&self, _keyspace: &str, _range: KeyRange) -> Result<KvScan, BackendError> {
        if self.fail_mid_scan {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let items: Vec<Result<KvPair, BackendError>> = vec![Err(unavailable())];
            return Ok(Box::new(items.into_iter()));
        }
        self.fail()
    }

    fn last_in_range(
        &self,
        _keyspace: &str,
        _range: KeyRange,
    ) -> Result<Option<KvPair>, BackendError> {
        self.fail()
    }

    fn delete_range(&self, _keyspace: &str, _range: KeyRange) -> Result<u64, BackendError> {
        self.fail()
    }

    fn health_check(&self) -> Result<(), BackendError> {
        self.fail()
    }
}

fn assert_fault<T>(result: StorageResult<T>, operation: &str) {
    match result {
        Err(err @ StorageError::Backend(BackendError::Unavailable { .. })) => {
            assert!(err.is_storage_fault(), "{operation}");
        }
        Err(other) => panic!("{operation}: expected backend fault, got {other:?}"),
        Ok(_) => panic!("{operation}: expected backend fault, got Ok"),
    }
}

#[test]
fn test_faults_propagate_without_retry() {
    let backend = Arc::new(UnreachableBackend::default());
    let store: EntityStore<Encounter> = EntityStore::new(backend.clone());
    let by_status = SecondaryIndex::new(status_index(), store.clone());
    let log = MessageLog::new(backend.clone());
    let path = encounter_path("P1", "E1");
    let encounter = Encounter::new("E1", "ARRIVED");

    assert_fault(store.read(&path), "read");
    assert_eq!(backend.take_calls(), 1);

    assert_fault(store.save(&path, &encounter), "save");
    assert_eq!(backend.take_calls(), 1);

    assert_fault(store.delete(&path), "delete");
    assert_eq!(backend.take_calls(), 1);

    assert_fault(store.stream_all(&TypeTag::new("Encounter")), "stream_all");
    assert_eq!(backend.take_calls(), 1);

    assert_fault(by_status.search("ARRIVED"), "search");
    assert_eq!(backend.take_calls(), 1);

    assert_fault(by_status.save(&path, None, &encounter), "index save");
    assert_eq!(backend.take_calls(), 1);

    assert_fault(log.list_messages(&path), "list_messages");
    assert_eq!(backend.take_calls(), 1);

    assert_fault(log.append_message(&path, b"ADT^A01"), "append_message");
    assert_eq!(backend.take_calls(), 1);
}

#[test]
fn test_faults_inside_streams_are_yielded() {
    let backend = Arc::new(UnreachableBackend::mid_scan());
    let store: EntityStore<Encounter> = EntityStore::new(backend.clone());
    let by_status = SecondaryIndex::new(status_index(), store.clone());

    let items: Vec<_> = store
        .stream(&EntityPath::new("Patient", "P1"), &TypeTag::new("Encounter"))
        .unwrap()
        .collect();
    assert_eq!(items.len(), 1);
    assert_fault(items.into_iter().next().unwrap(), "stream item");

    let hits: Vec<_> = by_status.search("ARRIVED").unwrap().collect();
    assert_eq!(hits.len(), 1);
    assert_fault(hits.into_iter().next().unwrap(), "search hit");

    assert_eq!(backend.take_calls(), 2);
}
