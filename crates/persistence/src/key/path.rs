//! Hierarchical entity addresses.
//!
//! An [`EntityPath`] such as `[(Patient, "P1"), (Encounter, "E9")]` encodes to
//! `Patient=P1&Encounter=E9&`. Every encoded segment ends with the segment
//! separator, so the encoding of a path is always a byte-prefix of the
//! encoding of any of its descendants, and `P1` never matches `P10`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

use super::escape::{escape, unescape};

/// Separator written after every segment.
pub const SEGMENT_SEPARATOR: char = '&';

/// Separator between a segment's type tag and its local identifier.
pub const TYPE_SEPARATOR: char = '=';

/// Identifies the kind of entity a path segment addresses (e.g. `Patient`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeTag(String);

impl TypeTag {
    /// Creates a new type tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeTag {
    fn from(s: &str) -> Self {
        TypeTag::new(s)
    }
}

impl From<String> for TypeTag {
    fn from(s: String) -> Self {
        TypeTag(s)
    }
}

/// One `(type, local id)` step of an [`EntityPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathSegment {
    type_tag: TypeTag,
    local_id: String,
}

impl PathSegment {
    /// Creates a new segment.
    pub fn new(type_tag: impl Into<TypeTag>, local_id: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            local_id: local_id.into(),
        }
    }

    /// Returns the segment's type tag.
    pub fn type_tag(&self) -> &TypeTag {
        &self.type_tag
    }

    /// Returns the segment's local identifier.
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    fn encode_into(&self, out: &mut String) {
        out.push_str(&escape(self.type_tag.as_str()));
        out.push(TYPE_SEPARATOR);
        out.push_str(&escape(&self.local_id));
        out.push(SEGMENT_SEPARATOR);
    }
}

/// An ordered sequence of segments forming a hierarchical address.
///
/// Parent/child relationships exist only through shared prefixes; no entity
/// holds a reference to another.
///
/// # Examples
///
/// ```
/// use helios_kv_persistence::key::EntityPath;
///
/// let patient = EntityPath::new("Patient", "P1");
/// let encounter = patient.child("Encounter", "E9");
///
/// assert_eq!(encounter.encode(), "Patient=P1&Encounter=E9&");
/// assert!(encounter.encode().starts_with(&patient.encode()));
/// assert_eq!(encounter.parent(), Some(patient));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityPath {
    segments: Vec<PathSegment>,
}

impl EntityPath {
    /// The empty path. Its encoding is the empty string, a prefix of every key.
    pub fn root() -> Self {
        Self::default()
    }

    /// Creates a single-segment path.
    pub fn new(type_tag: impl Into<TypeTag>, local_id: impl Into<String>) -> Self {
        Self {
            segments: vec![PathSegment::new(type_tag, local_id)],
        }
    }

    /// Creates a path from its segments.
    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Returns a new path extended by one child segment.
    pub fn child(&self, type_tag: impl Into<TypeTag>, local_id: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::new(type_tag, local_id));
        Self { segments }
    }

    /// Appends a segment in place.
    pub fn push(&mut self, segment: PathSegment) {
        self.segments.push(segment);
    }

    /// Returns the path's segments, root first.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Returns the final segment, or `None` for the root path.
    pub fn leaf(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// Returns the final segment's type tag.
    pub fn leaf_type(&self) -> Option<&TypeTag> {
        self.leaf().map(PathSegment::type_tag)
    }

    /// Returns the final segment's local identifier.
    pub fn local_id(&self) -> Option<&str> {
        self.leaf().map(PathSegment::local_id)
    }

    /// Returns the path without its final segment.
    pub fn parent(&self) -> Option<EntityPath> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Returns the number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns `true` for the root path.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns `true` if `self` is `other` or one of its ancestors.
    pub fn is_prefix_of(&self, other: &EntityPath) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// Encodes this path into its sortable key form.
    pub fn encode(&self) -> String {
        encode_path(self)
    }
}

impl fmt::Display for EntityPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromIterator<PathSegment> for EntityPath {
    fn from_iter<I: IntoIterator<Item = PathSegment>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}

/// Encodes a path as `TypeTag=EscapedLocalId&...`, one trailing separator
/// per segment.
pub fn encode_path(path: &EntityPath) -> String {
    let mut out = String::new();
    for segment in &path.segments {
        segment.encode_into(&mut out);
    }
    out
}

/// Decodes a key produced by [`encode_path`].
///
/// The empty key decodes to the root path.
pub fn decode_path(key: &str) -> StorageResult<EntityPath> {
    if key.is_empty() {
        return Ok(EntityPath::root());
    }
    let Some(body) = key.strip_suffix(SEGMENT_SEPARATOR) else {
        return Err(StorageError::malformed_key(
            key,
            "missing trailing segment separator",
        ));
    };

    body.split(SEGMENT_SEPARATOR)
        .map(|raw| {
            let (tag, id) = raw.split_once(TYPE_SEPARATOR).ok_or_else(|| {
                StorageError::malformed_key(key, format!("segment '{}' has no type separator", raw))
            })?;
            Ok(PathSegment::new(TypeTag::new(unescape(tag)?), unescape(id)?))
        })
        .collect::<StorageResult<Vec<_>>>()
        .map(EntityPath::from_segments)
}

/// Decodes a raw key read back from a backend.
pub fn decode_path_bytes(key: &[u8]) -> StorageResult<EntityPath> {
    let key = std::str::from_utf8(key)
        .map_err(|_| StorageError::malformed_key(key, "key is not valid UTF-8"))?;
    decode_path(key)
}

/// Recovers the local identifier of the final segment of `key`, which must be
/// of type `type_tag`.
///
/// Used when a caller only holds a key (for example from a scan) and needs
/// the address back without decoding every segment.
pub fn extract_local_id(key: &str, type_tag: &TypeTag) -> StorageResult<String> {
    let Some(body) = key.strip_suffix(SEGMENT_SEPARATOR) else {
        return Err(StorageError::malformed_key(
            key,
            "missing trailing segment separator",
        ));
    };
    let last = body.rsplit(SEGMENT_SEPARATOR).next().unwrap_or(body);
    let expected = format!("{}{}", escape(type_tag.as_str()), TYPE_SEPARATOR);
    let Some(escaped_id) = last.strip_prefix(expected.as_str()) else {
        return Err(StorageError::malformed_key(
            key,
            format!("final segment does not start with '{}'", expected),
        ));
    };
    unescape(escaped_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encounter_path() -> EntityPath {
        EntityPath::new("Patient", "P1").child("Encounter", "E9")
    }

    #[test]
    fn test_encode_hierarchical_path() {
        assert_eq!(encode_path(&encounter_path()), "Patient=P1&Encounter=E9&");
    }

    #[test]
    fn test_root_encodes_empty() {
        assert_eq!(encode_path(&EntityPath::root()), "");
        assert_eq!(decode_path("").unwrap(), EntityPath::root());
    }

    #[test]
    fn test_decode_round_trip_with_reserved_characters() {
        let path = EntityPath::new("Patient", "a&b=c|d%").child("Note", "");
        let encoded = path.encode();
        assert_eq!(encoded, "Patient=a%26b%3Dc%7Cd%25&Note=&");
        assert_eq!(decode_path(&encoded).unwrap(), path);
    }

    #[test]
    fn test_sibling_ids_do_not_share_prefix() {
        let p1 = EntityPath::new("Patient", "P1").encode();
        let p10 = EntityPath::new("Patient", "P10").encode();
        assert!(!p10.starts_with(&p1));
    }

    #[test]
    fn test_decode_missing_trailing_separator() {
        let err = decode_path("Patient=P1").unwrap_err();
        assert!(matches!(err, StorageError::MalformedKey { ref key, .. } if key == "Patient=P1"));
    }

    #[test]
    fn test_decode_missing_type_separator() {
        assert!(decode_path("Patient&").is_err());
        assert!(decode_path("Patient=P1&&").is_err());
    }

    #[test]
    fn test_decode_path_bytes_rejects_invalid_utf8() {
        assert!(decode_path_bytes(&[0xff, b'&']).is_err());
    }

    #[test]
    fn test_extract_local_id() {
        let key = encounter_path().encode();
        assert_eq!(
            extract_local_id(&key, &TypeTag::new("Encounter")).unwrap(),
            "E9"
        );
        assert!(extract_local_id(&key, &TypeTag::new("Patient")).is_err());
        assert!(extract_local_id("Encounter=E9", &TypeTag::new("Encounter")).is_err());
    }

    #[test]
    fn test_extract_escaped_local_id() {
        let key = EntityPath::new("Patient", "MRN&42").encode();
        assert_eq!(
            extract_local_id(&key, &TypeTag::new("Patient")).unwrap(),
            "MRN&42"
        );
    }

    #[test]
    fn test_parent_and_leaf() {
        let path = encounter_path();
        assert_eq!(path.leaf_type(), Some(&TypeTag::new("Encounter")));
        assert_eq!(path.local_id(), Some("E9"));
        assert_eq!(path.parent(), Some(EntityPath::new("Patient", "P1")));
        assert_eq!(EntityPath::root().parent(), None);
        assert!(EntityPath::new("Patient", "P1").is_prefix_of(&path));
        assert!(!path.is_prefix_of(&EntityPath::new("Patient", "P1")));
    }
}
