//! Property tests for the key codec.

use proptest::prelude::*;

use helios_kv_persistence::core::KeyRange;
use helios_kv_persistence::key::{
    EntityPath, PathSegment, TypeTag, decode_path, encode_path, escape, extract_local_id, unescape,
};

fn type_tag() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Patient".to_string()),
        Just("Encounter".to_string()),
        Just("Observation".to_string()),
        "[A-Z][A-Za-z]{0,12}",
    ]
}

/// Local ids biased toward separators, escapes and non-ASCII text.
fn local_id() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[A-Za-z0-9]{1,8}",
        "[&=|%]{1,4}",
        "[a-z&=|% ]{0,12}",
        "\\PC{0,10}",
    ]
}

fn segment() -> impl Strategy<Value = PathSegment> {
    (type_tag(), local_id()).prop_map(|(tag, id)| PathSegment::new(tag, id))
}

fn path(max_len: usize) -> impl Strategy<Value = EntityPath> {
    prop::collection::vec(segment(), 0..max_len).prop_map(EntityPath::from_segments)
}

proptest! {
    #[test]
    fn prop_escape_roundtrip(value in "\\PC{0,24}") {
        prop_assert_eq!(unescape(&escape(&value)).unwrap(), value);
    }

    #[test]
    fn prop_escaped_ids_contain_no_separators(value in "\\PC{0,24}") {
        let escaped = escape(&value);
        prop_assert!(!escaped.contains(['&', '=', '|']));
        prop_assert!(escaped.is_ascii());
    }

    #[test]
    fn prop_path_roundtrip(p in path(5)) {
        prop_assert_eq!(decode_path(&encode_path(&p)).unwrap(), p);
    }

    #[test]
    fn prop_child_key_extends_parent_key(p in path(4), c in segment()) {
        let mut child = p.clone();
        child.push(c);
        let parent_key = encode_path(&p);
        let child_key = encode_path(&child);
        prop_assert!(child_key.starts_with(&parent_key));
        prop_assert!(KeyRange::prefix(parent_key.as_bytes()).contains(child_key.as_bytes()));
    }

    #[test]
    fn prop_sibling_is_outside_prefix(p in path(3), a in segment(), b in segment()) {
        prop_assume!(a != b);
        let left = p.child(a.type_tag().clone(), a.local_id());
        let right = p.child(b.type_tag().clone(), b.local_id());
        let range = KeyRange::prefix(encode_path(&left).into_bytes());
        prop_assert!(!range.contains(encode_path(&right).as_bytes()));
    }

    #[test]
    fn prop_extract_local_id(p in path(3), tag in type_tag(), id in local_id()) {
        let leaf = p.child(tag.as_str(), id.clone());
        let key = encode_path(&leaf);
        prop_assert_eq!(extract_local_id(&key, &TypeTag::new(tag)).unwrap(), id);
    }
}

#[test]
fn test_root_path_encodes_to_empty_key() {
    assert_eq!(encode_path(&EntityPath::root()), "");
    assert_eq!(decode_path("").unwrap(), EntityPath::root());
}

#[test]
fn test_known_encoding() {
    let path = EntityPath::new("Patient", "MRN&42").child("Encounter", "V=1");
    assert_eq!(encode_path(&path), "Patient=MRN%2642&Encounter=V%3D1&");
}
