//! SQLite backend implementation.

use std::collections::VecDeque;
use std::fmt::Debug;
use std::ops::Bound;
use std::path::Path;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, params, params_from_iter};
use serde::{Deserialize, Serialize};

use crate::core::{BackendKind, DEFAULT_SCAN_BATCH_SIZE, KeyRange, KvBackend, KvPair, KvScan};
use crate::error::BackendError;

use super::schema;

/// SQLite backend for the key-value store.
pub struct SqliteBackend {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteBackendConfig,
    is_memory: bool,
    scan_batch_size: usize,
}

impl Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("config", &self.config)
            .field("is_memory", &self.is_memory)
            .field("scan_batch_size", &self.scan_batch_size)
            .finish_non_exhaustive()
    }
}

/// Configuration for the SQLite backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqliteBackendConfig {
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of idle connections.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,

    /// Enable WAL mode for better concurrency.
    #[serde(default = "default_true")]
    pub enable_wal: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_busy_timeout_ms() -> u32 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for SqliteBackendConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enable_wal: true,
        }
    }
}

impl SqliteBackend {
    /// Creates a new in-memory SQLite backend.
    ///
    /// Every pooled connection attaches to the same uniquely named
    /// shared-cache database, which lives as long as the pool.
    pub fn in_memory() -> Result<Self, BackendError> {
        Self::with_config(":memory:", SqliteBackendConfig::default())
    }

    /// Opens or creates a file-based SQLite database.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, BackendError> {
        Self::with_config(path, SqliteBackendConfig::default())
    }

    /// Creates a backend with custom configuration and initializes its schema.
    pub fn with_config<P: AsRef<Path>>(
        path: P,
        config: SqliteBackendConfig,
    ) -> Result<Self, BackendError> {
        let path_str = path.as_ref().to_string_lossy().into_owned();
        let is_memory = path_str == ":memory:";

        let busy_timeout = Duration::from_millis(config.busy_timeout_ms as u64);
        let enable_wal = config.enable_wal && !is_memory;
        let manager = if is_memory {
            SqliteConnectionManager::file(format!(
                "file:helios-kv-{}?mode=memory&cache=shared",
                uuid::Uuid::new_v4()
            ))
        } else {
            SqliteConnectionManager::file(path.as_ref())
        };
        let manager = manager.with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            if enable_wal {
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                    row.get::<_, String>(0)
                })?;
            }
            Ok(())
        });

        let max_size = config.max_connections.max(1);
        let mut builder = Pool::builder()
            .max_size(max_size)
            .min_idle(Some(config.min_connections.clamp(1, max_size)))
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms));
        if is_memory {
            // The shared in-memory database disappears with its last connection.
            builder = builder.idle_timeout(None).max_lifetime(None);
        }
        let pool = builder
            .build(manager)
            .map_err(|e| BackendError::ConnectionFailed {
                backend_name: "sqlite".to_string(),
                message: e.to_string(),
            })?;

        let backend = Self {
            pool,
            config,
            is_memory,
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
        };
        backend.init_schema()?;

        tracing::info!(path = %path_str, is_memory, "Opened SQLite key-value backend");
        Ok(backend)
    }

    /// Sets the number of rows a scan fetches per query.
    pub fn with_scan_batch_size(mut self, batch_size: usize) -> Self {
        self.scan_batch_size = batch_size.max(1);
        self
    }

    /// Initialize the database schema.
    pub fn init_schema(&self) -> Result<(), BackendError> {
        let conn = self.get_connection()?;
        schema::initialize_schema(&conn)
    }

    /// Get a connection from the pool.
    ///
    /// Fails with [`BackendError::PoolExhausted`] once the connection timeout
    /// elapses with every connection checked out.
    pub(crate) fn get_connection(
        &self,
    ) -> Result<PooledConnection<SqliteConnectionManager>, BackendError> {
        self.pool.get().map_err(BackendError::from)
    }

    /// Returns whether this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    /// Returns the backend configuration.
    pub fn config(&self) -> &SqliteBackendConfig {
        &self.config
    }
}

impl KvBackend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn get(&self, keyspace: &str, key: &[u8]) -> Result<Option<Vec<u8>>, BackendError> {
        let conn = self.get_connection()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_entries WHERE space = ?1 AND key = ?2",
                params![keyspace, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&self, keyspace: &str, key: &[u8], value: &[u8]) -> Result<(), BackendError> {
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO kv_entries (space, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(space, key) DO UPDATE SET value = excluded.value",
            params![keyspace, key, value],
        )?;
        Ok(())
    }

    fn delete(&self, keyspace: &str, key: &[u8]) -> Result<(), BackendError> {
        let conn = self.get_connection()?;
        conn.execute(
            "DELETE FROM kv_entries WHERE space = ?1 AND key = ?2",
            params![keyspace, key],
        )?;
        Ok(())
    }

    fn scan(&self, keyspace: &str, range: KeyRange) -> Result<KvScan, BackendError> {
        Ok(Box::new(SqliteScan {
            pool: self.pool.clone(),
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
        let conn = self.get_connection()?;
        let (clause, params) = range_filter(keyspace, &range);
        let sql = format!(
            "SELECT key, value FROM kv_entries WHERE {} ORDER BY key DESC LIMIT 1",
            clause
        );
        let entry = conn
            .query_row(&sql, params_from_iter(params.iter()), |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .optional()?;
        Ok(entry)
    }

    fn delete_range(&self, keyspace: &str, range: KeyRange) -> Result<u64, BackendError> {
        if range.is_empty() {
            return Ok(0);
        }
        let conn = self.get_connection()?;
        let (clause, params) = range_filter(keyspace, &range);
        let sql = format!("DELETE FROM kv_entries WHERE {}", clause);
        let removed = conn.execute(&sql, params_from_iter(params.iter()))?;
        Ok(removed as u64)
    }

    fn health_check(&self) -> Result<(), BackendError> {
        let conn = self
            .get_connection()
            .map_err(|_| BackendError::Unavailable {
                backend_name: "sqlite".to_string(),
                message: "Failed to get connection".to_string(),
            })?;
        conn.query_row("SELECT 1", [], |_| Ok(()))
            .map_err(|e| BackendError::Internal {
                backend_name: "sqlite".to_string(),
                message: format!("Health check failed: {}", e),
                source: None,
            })?;
        Ok(())
    }
}

/// Builds the `WHERE` clause selecting `range` within `keyspace`.
fn range_filter(keyspace: &str, range: &KeyRange) -> (String, Vec<Value>) {
    let mut clause = String::from("space = ?1");
    let mut params = vec![Value::Text(keyspace.to_string())];

    let mut bound = |op: &str, key: &Vec<u8>| {
        params.push(Value::Blob(key.clone()));
        clause.push_str(&format!(" AND key {} ?{}", op, params.len()));
    };
    match &range.start {
        Bound::Included(key) => bound(">=", key),
        Bound::Excluded(key) => bound(">", key),
        Bound::Unbounded => {}
    }
    match &range.end {
        Bound::Included(key) => bound("<=", key),
        Bound::Excluded(key) => bound("<", key),
        Bound::Unbounded => {}
    }

    (clause, params)
}

/// Batched cursor over one keyspace.
///
/// Checks a connection out of the pool for each batch and returns it before
/// yielding, so an open scan never pins a connection and the caller may use
/// the backend between items.
struct SqliteScan {
    pool: Pool<SqliteConnectionManager>,
    keyspace: String,
    range: KeyRange,
    batch: VecDeque<KvPair>,
    batch_size: usize,
    exhausted: bool,
}

impl SqliteScan {
    fn refill(&mut self) -> Result<(), BackendError> {
        let (clause, params) = range_filter(&self.keyspace, &self.range);
        let sql = format!(
            "SELECT key, value FROM kv_entries WHERE {} ORDER BY key LIMIT {}",
            clause, self.batch_size
        );
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;
        for row in rows {
            self.batch.push_back(row?);
        }

        match self.batch.back() {
            Some((last, _)) if self.batch.len() == self.batch_size => {
                self.range = self.range.resume_after(last.clone());
            }
            _ => self.exhausted = true,
        }
        Ok(())
    }
}

impl Iterator for SqliteScan {
    type Item = Result<KvPair, BackendError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.batch.is_empty() && !self.exhausted {
            if let Err(e) = self.refill() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        self.batch.pop_front().map(Ok)
    }
}
