//! Shared test infrastructure.
//!
//! Provides clinical fixture entities and constructors for every backend the
//! integration tests run against.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use helios_kv_persistence::backends::MemoryBackend;
use helios_kv_persistence::backends::sqlite::{SqliteBackend, SqliteBackendConfig};
use helios_kv_persistence::core::KvBackend;
use helios_kv_persistence::index::IndexDefinition;
use helios_kv_persistence::key::EntityPath;

// ============================================================================
// Fixture Entities
// ============================================================================

/// A patient record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub mrn: String,
    pub family: String,
    pub active: bool,
}

impl Patient {
    pub fn new(mrn: &str, family: &str) -> Self {
        Self {
            mrn: mrn.to_string(),
            family: family.to_string(),
            active: true,
        }
    }

    pub fn path(&self) -> EntityPath {
        EntityPath::new("Patient", self.mrn.clone())
    }
}

/// An encounter belonging to a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    pub visit_number: String,
    pub status: String,
    pub location: Option<String>,
}

impl Encounter {
    pub fn new(visit_number: &str, status: &str) -> Self {
        Self {
            visit_number: visit_number.to_string(),
            status: status.to_string(),
            location: None,
        }
    }

    pub fn with_status(&self, status: &str) -> Self {
        Self {
            status: status.to_string(),
            ..self.clone()
        }
    }
}

/// An observation recorded during an encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub code: String,
    pub value: f64,
    pub unit: String,
}

impl Observation {
    pub fn new(code: &str, value: f64, unit: &str) -> Self {
        Self {
            code: code.to_string(),
            value,
            unit: unit.to_string(),
        }
    }
}

pub fn encounter_path(mrn: &str, visit: &str) -> EntityPath {
    EntityPath::new("Patient", mrn).child("Encounter", visit)
}

pub fn observation_path(mrn: &str, visit: &str, id: &str) -> EntityPath {
    encounter_path(mrn, visit).child("Observation", id)
}

pub fn status_index() -> IndexDefinition<Encounter> {
    IndexDefinition::new("encounter-status", "Encounter", |e: &Encounter| {
        e.status.clone()
    })
}

/// A fixed instant plus `ms` milliseconds.
pub fn at(ms: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 15, 0).unwrap() + Duration::milliseconds(ms)
}

// ============================================================================
// Backends
// ============================================================================

/// A backend under test. Holds the temp directory of file databases open.
pub struct TestBackend {
    pub name: &'static str,
    pub backend: Arc<dyn KvBackend>,
    _dir: Option<TempDir>,
}

pub fn memory_backend() -> TestBackend {
    TestBackend {
        name: "memory",
        backend: Arc::new(MemoryBackend::new().with_scan_batch_size(3)),
        _dir: None,
    }
}

pub fn sqlite_memory_backend() -> TestBackend {
    let backend = SqliteBackend::in_memory()
        .expect("Failed to create SQLite backend")
        .with_scan_batch_size(3);
    TestBackend {
        name: "sqlite-memory",
        backend: Arc::new(backend),
        _dir: None,
    }
}

pub fn sqlite_file_backend() -> TestBackend {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let backend =
        SqliteBackend::with_config(dir.path().join("kv.db"), SqliteBackendConfig::default())
            .expect("Failed to open SQLite database")
            .with_scan_batch_size(3);
    TestBackend {
        name: "sqlite-file",
        backend: Arc::new(backend),
        _dir: Some(dir),
    }
}

/// Every backend, for single-threaded tests.
pub fn all_backends() -> Vec<TestBackend> {
    vec![memory_backend(), sqlite_memory_backend(), sqlite_file_backend()]
}

/// Backends safe for multi-threaded tests.
///
/// Shared-cache in-memory SQLite uses table-level locks that surface as
/// `SQLITE_LOCKED` under concurrent writers, so it is left out.
pub fn concurrent_backends() -> Vec<TestBackend> {
    vec![memory_backend(), sqlite_file_backend()]
}
