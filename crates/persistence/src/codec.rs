//! Payload serialization boundary.
//!
//! The entity store never looks inside a payload. It hands entities to an
//! [`EntityCodec`] on write and hands raw bytes plus the expected
//! [`TypeTag`] back on read.

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CodecError;
use crate::key::TypeTag;

/// Converts entities to and from stored bytes.
pub trait EntityCodec<E>: Send + Sync {
    /// Serializes an entity.
    fn encode(&self, entity: &E) -> Result<Vec<u8>, CodecError>;

    /// Deserializes an entity that was stored under a key of type `type_tag`.
    fn decode(&self, bytes: &[u8], type_tag: &TypeTag) -> Result<E, CodecError>;
}

/// JSON codec backed by `serde_json`.
///
/// The type tag is not consulted; the target type `E` fixes the shape.
pub struct JsonCodec<E> {
    _entity: PhantomData<fn() -> E>,
}

impl<E> JsonCodec<E> {
    /// Creates a JSON codec.
    pub fn new() -> Self {
        Self {
            _entity: PhantomData,
        }
    }
}

impl<E> Default for JsonCodec<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for JsonCodec<E> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for JsonCodec<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonCodec")
            .field("entity", &std::any::type_name::<E>())
            .finish()
    }
}

impl<E> EntityCodec<E> for JsonCodec<E>
where
    E: Serialize + DeserializeOwned,
{
    fn encode(&self, entity: &E) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(entity)?)
    }

    fn decode(&self, bytes: &[u8], type_tag: &TypeTag) -> Result<E, CodecError> {
        serde_json::from_slice(bytes)
            .map_err(|e| CodecError::new(format!("invalid {} payload: {}", type_tag, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Patient {
        name: String,
        active: bool,
    }

    #[test]
    fn test_json_roundtrip() {
        let codec = JsonCodec::<Patient>::new();
        let patient = Patient {
            name: "Ada".to_string(),
            active: true,
        };
        let bytes = codec.encode(&patient).unwrap();
        let decoded = codec.decode(&bytes, &TypeTag::new("Patient")).unwrap();
        assert_eq!(decoded, patient);
    }

    #[test]
    fn test_decode_error_names_type() {
        let codec = JsonCodec::<Patient>::new();
        let err = codec
            .decode(b"{\"name\": 3}", &TypeTag::new("Patient"))
            .unwrap_err();
        assert!(err.message.contains("invalid Patient payload"));
    }
}
