//! # Content Digests
//!
//! Two hashes exist for every authored file:
//!
//! - the full SHA-256 [`ContentDigest`] stored on the `PackFile` row and used
//!   as the content-addressed storage key, and
//! - the short [`content_hash`] fingerprint (first 16 hex chars) embedded in
//!   provenance markers.
//!
//! Both are computed over the raw bytes as published. Markers are applied at
//! install time and are never part of either value.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;
use crate::error::CryptoError;

/// Length of the marker fingerprint in hex characters.
pub const CONTENT_HASH_LEN: usize = 16;

/// A 32-byte SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Digest raw bytes.
    pub fn of_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hash);
        Self(bytes)
    }

    /// Digest canonical structured data.
    pub fn of_canonical(data: &CanonicalBytes) -> Self {
        Self::of_bytes(data.as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering (64 chars).
    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }

    /// Parse a 64-char hex digest.
    pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        let hex = hex.trim().to_ascii_lowercase();
        if hex.len() != 64 {
            return Err(CryptoError::Hex(format!(
                "digest hex must be 64 chars, got {}",
                hex.len()
            )));
        }
        let bytes = from_hex(&hex)?;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// The marker fingerprint derived from this digest.
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(CONTENT_HASH_LEN);
        hex
    }
}

impl std::fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContentDigest({}...)", &self.to_hex()[..12])
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// Full SHA-256 of raw bytes as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    ContentDigest::of_bytes(data).to_hex()
}

/// Short, stable tamper fingerprint: the first 16 hex chars of SHA-256.
///
/// Not a security primitive on its own; it only has to change when the
/// content changes.
pub fn content_hash(data: &[u8]) -> String {
    ContentDigest::of_bytes(data).short()
}

/// Lowercase hex encoding.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decode an even-length hex string.
pub fn from_hex(hex: &str) -> Result<Vec<u8>, CryptoError> {
    if hex.len() % 2 != 0 {
        return Err(CryptoError::Hex("hex string must have even length".into()));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            hex.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| CryptoError::Hex(format!("invalid hex at position {i}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn content_hash_is_prefix_of_full_digest() {
        let data = b"# Skill\n\nDo the thing.\n";
        let full = sha256_hex(data);
        let short = content_hash(data);
        assert_eq!(short.len(), CONTENT_HASH_LEN);
        assert!(full.starts_with(&short));
    }

    #[test]
    fn content_hash_changes_with_content() {
        assert_ne!(content_hash(b"a"), content_hash(b"b"));
    }

    #[test]
    fn digest_hex_roundtrip() {
        let d = ContentDigest::of_bytes(b"abc");
        assert_eq!(ContentDigest::from_hex(&d.to_hex()).unwrap(), d);
    }

    #[test]
    fn digest_from_hex_rejects_bad_input() {
        assert!(ContentDigest::from_hex("abcd").is_err());
        assert!(ContentDigest::from_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn digest_serializes_as_hex_string() {
        let d = ContentDigest::of_bytes(b"abc");
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, format!("\"{}\"", d.to_hex()));
    }

    #[test]
    fn from_hex_rejects_multibyte_chars() {
        assert!(from_hex("é1").is_err());
    }
}
