//! Field key derivation.
//!
//! A field key identifies one cached query result inside a namespace. It is
//! the SHA-256 fingerprint of four parts, hashed in a fixed order:
//! collection, canonical options, canonical filter, mode name.
//!
//! # Encoding
//!
//! Each part is fed to the hasher as an 8-byte little-endian length followed
//! by its UTF-8 bytes, so `("ab", "c")` and `("a", "bc")` never hash alike.
//! The digest is rendered as 64 lowercase hex characters.

use std::fmt;

use doccache_core::CollectionName;
use sha2::{Digest, Sha256};

use super::query::ReadMode;

/// Length of a rendered field key in hex characters.
pub const FIELD_KEY_LEN: usize = 64;

/// Deterministic fingerprint of one read query.
///
/// Can only be produced by [`derive_field_key`] or parsed from a well-formed
/// hex string, so a malformed key never reaches the cache store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldKey {
    hex: String,
}

impl FieldKey {
    /// Parse a rendered key. Returns `None` unless it is exactly 64
    /// lowercase hex characters.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let well_formed = hex.len() == FIELD_KEY_LEN
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        well_formed.then(|| Self {
            hex: hex.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

/// Derive the field key for a query.
///
/// `filter` and `options` must already be canonically encoded; equal logical
/// values must arrive as identical strings.
pub fn derive_field_key(
    collection: &CollectionName,
    filter: &str,
    options: &str,
    mode: ReadMode,
) -> FieldKey {
    let mut hasher = Sha256::new();
    for part in [collection.as_str(), options, filter, mode.as_str()] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    FieldKey {
        hex: hex::encode(hasher.finalize()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coll(name: &str) -> CollectionName {
        CollectionName::new(name).unwrap()
    }

    #[test]
    fn test_key_is_fixed_length_hex() {
        let key = derive_field_key(&coll("test"), "{}", "{}", ReadMode::GetCount);
        assert_eq!(key.as_str().len(), FIELD_KEY_LEN);
        assert!(FieldKey::from_hex(key.as_str()).is_some());
    }

    #[test]
    fn test_key_is_deterministic() {
        let a = derive_field_key(&coll("test"), r#"{"a":1}"#, "{}", ReadMode::GetAllList);
        let b = derive_field_key(&coll("test"), r#"{"a":1}"#, "{}", ReadMode::GetAllList);
        assert_eq!(a, b);
    }

    #[test]
    fn test_every_input_changes_the_key() {
        let base = derive_field_key(&coll("test"), r#"{"a":1}"#, "{}", ReadMode::GetAllList);

        assert_ne!(
            base,
            derive_field_key(&coll("other"), r#"{"a":1}"#, "{}", ReadMode::GetAllList)
        );
        assert_ne!(
            base,
            derive_field_key(&coll("test"), r#"{"a":2}"#, "{}", ReadMode::GetAllList)
        );
        assert_ne!(
            base,
            derive_field_key(&coll("test"), r#"{"a":1}"#, r#"{"limit":1}"#, ReadMode::GetAllList)
        );
        assert_ne!(
            base,
            derive_field_key(&coll("test"), r#"{"a":1}"#, "{}", ReadMode::Command)
        );
    }

    #[test]
    fn test_part_boundaries_are_unambiguous() {
        // Same concatenated bytes, different split between filter and options.
        let a = derive_field_key(&coll("t"), "{}x", "{}", ReadMode::GetRow);
        let b = derive_field_key(&coll("t"), "{}", "{}x", ReadMode::GetRow);
        assert_ne!(a, b);
    }

    #[test]
    fn test_filter_and_options_are_not_interchangeable() {
        let a = derive_field_key(&coll("t"), r#"{"x":1}"#, "{}", ReadMode::GetRow);
        let b = derive_field_key(&coll("t"), "{}", r#"{"x":1}"#, ReadMode::GetRow);
        assert_ne!(a, b);
    }

    #[test]
    fn test_from_hex_rejects_malformed() {
        assert!(FieldKey::from_hex("abc").is_none());
        assert!(FieldKey::from_hex(&"G".repeat(FIELD_KEY_LEN)).is_none());
        assert!(FieldKey::from_hex(&"A".repeat(FIELD_KEY_LEN)).is_none());
        assert!(FieldKey::from_hex(&"a".repeat(FIELD_KEY_LEN)).is_some());
    }
}
