//! Percent-encoding for local identifiers.
//!
//! Every byte outside the RFC 3986 unreserved set is rendered as `%XX`, so the
//! reserved separators (`&`, `=`, `|`, `%`) and any non-ASCII text never appear
//! raw inside an encoded segment.

use crate::error::{StorageError, StorageResult};

const HEX: &[u8; 16] = b"0123456789ABCDEF";

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

/// Percent-encodes a local identifier.
///
/// # Examples
///
/// ```
/// use helios_kv_persistence::key::escape;
///
/// assert_eq!(escape("P1"), "P1");
/// assert_eq!(escape("a&b=c"), "a%26b%3Dc");
/// assert_eq!(escape(""), "");
/// ```
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for &b in value.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0f) as usize] as char);
        }
    }
    out
}

/// Decodes a percent-encoded local identifier.
///
/// Fails with [`StorageError::MalformedKey`] on a truncated or non-hex escape
/// sequence, or if the decoded bytes are not valid UTF-8.
pub fn unescape(value: &str) -> StorageResult<String> {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(|b| hex_value(*b)),
                bytes.get(i + 2).and_then(|b| hex_value(*b)),
            ) else {
                return Err(StorageError::malformed_key(
                    value,
                    format!("invalid escape sequence at offset {}", i),
                ));
            };
            out.push((hi << 4) | lo);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out)
        .map_err(|_| StorageError::malformed_key(value, "escaped value is not valid UTF-8"))
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}
