//! Key codec.
//!
//! Maps hierarchical entity addresses and log positions to sortable string
//! keys and back:
//!
//! - [`EntityPath`] / [`encode_path`] / [`decode_path`] - primary entity keys
//!   of the form `TypeTag=EscapedLocalId&TypeTag=EscapedLocalId&`
//! - [`escape`] / [`unescape`] - percent-encoding of local identifiers
//! - [`LogKey`] - `ParentKey|Timestamp|ContentHash` message log keys
//!
//! Any key that cannot be decomposed fails with
//! [`StorageError::MalformedKey`](crate::error::StorageError::MalformedKey).

mod escape;
mod log_key;
mod path;

pub use escape::{escape, unescape};
pub use log_key::{
    CONTENT_HASH_LEN, LOG_FIELD_SEPARATOR, LogKey, TIMESTAMP_FORMAT, content_hash,
    format_timestamp,
};
pub use path::{
    EntityPath, PathSegment, SEGMENT_SEPARATOR, TYPE_SEPARATOR, TypeTag, decode_path,
    decode_path_bytes, encode_path, extract_local_id,
};
