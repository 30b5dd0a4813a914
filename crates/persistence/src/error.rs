//! Error types for the persistence engine.
//!
//! Callers of this crate see one of three failure kinds: a key that cannot be
//! decomposed ([`StorageError::MalformedKey`]), a payload that does not decode
//! ([`StorageError::Decode`]), or a fault raised by the underlying store
//! ([`StorageError::Backend`]). None of them are retried here; retry and
//! backoff belong to whatever manages the connection to the store.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::key::TypeTag;

/// The primary error type for all storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// A stored key is missing an expected separator or escape sequence.
    #[error("malformed key '{key}': {reason}")]
    MalformedKey { key: String, reason: String },

    /// Stored bytes do not match the expected payload shape.
    #[error("failed to decode payload at '{key}' ({} bytes): {message}", .bytes.len())]
    Decode {
        key: String,
        bytes: Vec<u8>,
        message: String,
    },

    /// The injected codec refused to serialize a value.
    #[error("failed to encode payload: {message}")]
    Encode { message: String },

    /// The backend is unreachable or rejected the operation.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// An index name was declared twice for different covered types.
    #[error("index '{name}' already registered for {existing}, cannot register for {requested}")]
    IndexConflict {
        name: String,
        existing: TypeTag,
        requested: TypeTag,
    },
}

impl StorageError {
    /// Builds a [`StorageError::MalformedKey`] from raw key bytes.
    pub fn malformed_key(key: impl AsRef<[u8]>, reason: impl Into<String>) -> Self {
        StorageError::MalformedKey {
            key: String::from_utf8_lossy(key.as_ref()).into_owned(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error originated in the backend.
    pub fn is_storage_fault(&self) -> bool {
        matches!(self, StorageError::Backend(_))
    }
}

/// Errors originating from the key-value backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend is currently unavailable.
    #[error("backend unavailable: {backend_name}")]
    Unavailable {
        backend_name: String,
        message: String,
    },

    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Connection pool exhausted.
    #[error("connection pool exhausted for {backend_name}")]
    PoolExhausted { backend_name: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Error reported by an [`EntityCodec`](crate::codec::EntityCodec).
///
/// The entity store wraps it into [`StorageError::Decode`] or
/// [`StorageError::Encode`] together with the key and raw bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CodecError {
    pub message: String,
}

impl CodecError {
    /// Creates a codec error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::new(err.to_string())
    }
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for BackendError {
    fn from(err: rusqlite::Error) -> Self {
        BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for BackendError {
    fn from(_err: r2d2::Error) -> Self {
        BackendError::PoolExhausted {
            backend_name: "sqlite".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_key_display() {
        let err = StorageError::malformed_key(b"Patient=P1", "missing trailing separator");
        assert_eq!(
            err.to_string(),
            "malformed key 'Patient=P1': missing trailing separator"
        );
    }

    #[test]
    fn test_decode_error_keeps_raw_bytes() {
        let err = StorageError::Decode {
            key: "Patient=P1&".to_string(),
            bytes: vec![0xde, 0xad],
            message: "expected value".to_string(),
        };
        assert!(err.to_string().contains("2 bytes"));
        match err {
            StorageError::Decode { bytes, .. } => assert_eq!(bytes, vec![0xde, 0xad]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_backend_error_is_storage_fault() {
        let err: StorageError = BackendError::Unavailable {
            backend_name: "sqlite".to_string(),
            message: "gone".to_string(),
        }
        .into();
        assert!(err.is_storage_fault());
        assert!(!StorageError::malformed_key("x", "y").is_storage_fault());
    }

    #[test]
    fn test_codec_error_from_json() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err = CodecError::from(json_err);
        assert!(!err.message.is_empty());
    }

    #[test]
    fn test_index_conflict_display() {
        let err = StorageError::IndexConflict {
            name: "status".to_string(),
            existing: TypeTag::new("Encounter"),
            requested: TypeTag::new("Patient"),
        };
        assert_eq!(
            err.to_string(),
            "index 'status' already registered for Encounter, cannot register for Patient"
        );
    }
}
