//! Keys for append-only message logs.
//!
//! A log key is `ParentKey|Timestamp|ContentHash` where the parent key is the
//! encoded parent [`EntityPath`], the timestamp is a fixed-width,
//! millisecond-resolution UTC string (`2024-03-01T09:15:00.042Z`) and the
//! content hash is the unpadded base64url SHA-256 of the payload. Lexicographic
//! order of keys under one parent is therefore chronological order.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::{StorageError, StorageResult};

use super::path::{EntityPath, decode_path};

/// Separator between the fields of a log key.
pub const LOG_FIELD_SEPARATOR: char = '|';

/// `strftime` pattern for log timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Length of an encoded content hash (32 digest bytes, base64url, no padding).
pub const CONTENT_HASH_LEN: usize = 43;

/// Formats a timestamp for use in a log key.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Returns the fixed-length content hash of a payload.
pub fn content_hash(payload: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(payload))
}

/// A decomposed message log key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogKey {
    parent_key: String,
    timestamp: String,
    content_hash: String,
}

impl LogKey {
    /// Builds the key for `payload` appended under `parent` at `timestamp`.
    pub fn new(parent: &EntityPath, timestamp: DateTime<Utc>, payload: &[u8]) -> Self {
        Self {
            parent_key: parent.encode(),
            timestamp: format_timestamp(timestamp),
            content_hash: content_hash(payload),
        }
    }

    /// Returns the scan prefix shared by every log key under `parent`.
    pub fn parent_prefix(parent: &EntityPath) -> String {
        let mut prefix = parent.encode();
        prefix.push(LOG_FIELD_SEPARATOR);
        prefix
    }

    /// Parses a raw log key.
    ///
    /// # Examples
    ///
    /// ```
    /// use helios_kv_persistence::key::LogKey;
    ///
    /// let raw = "Encounter=E9&|2024-03-01T09:15:00.042Z|47DEQpj8HBSa-_TImW-5JCeuQeRkm5NMpJWZG3hSuFU";
    /// let key = LogKey::parse(raw).unwrap();
    /// assert_eq!(key.parent_key(), "Encounter=E9&");
    /// assert_eq!(key.timestamp_str(), "2024-03-01T09:15:00.042Z");
    /// assert_eq!(key.to_string(), raw);
    /// ```
    pub fn parse(raw: &str) -> StorageResult<Self> {
        let mut fields = raw.rsplitn(3, LOG_FIELD_SEPARATOR);
        let (Some(content_hash), Some(timestamp), Some(parent_key)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(StorageError::malformed_key(
                raw,
                "log key must have parent, timestamp and hash fields",
            ));
        };
        if content_hash.len() != CONTENT_HASH_LEN {
            return Err(StorageError::malformed_key(
                raw,
                format!("content hash must be {} characters", CONTENT_HASH_LEN),
            ));
        }
        Ok(Self {
            parent_key: parent_key.to_string(),
            timestamp: timestamp.to_string(),
            content_hash: content_hash.to_string(),
        })
    }

    /// Parses a raw log key read back from a backend.
    pub fn parse_bytes(raw: &[u8]) -> StorageResult<Self> {
        let raw = std::str::from_utf8(raw)
            .map_err(|_| StorageError::malformed_key(raw, "key is not valid UTF-8"))?;
        Self::parse(raw)
    }

    /// Returns the encoded parent path.
    pub fn parent_key(&self) -> &str {
        &self.parent_key
    }

    /// Decodes the parent path.
    pub fn parent(&self) -> StorageResult<EntityPath> {
        decode_path(&self.parent_key)
    }

    /// Returns the timestamp field as written.
    pub fn timestamp_str(&self) -> &str {
        &self.timestamp
    }

    /// Parses the timestamp field.
    pub fn timestamp(&self) -> StorageResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| StorageError::malformed_key(self.to_string(), e.to_string()))
    }

    /// Returns the content hash field.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }
}

impl fmt::Display for LogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.parent_key,
            self.timestamp,
            self.content_hash,
            sep = LOG_FIELD_SEPARATOR
        )
    }
}
