//! # Identity Newtypes
//!
//! Identifiers for registry rows plus the validated, URL-safe pack slug.
//! Distinct types keep a `VersionId` from being passed where a `PackId` is
//! expected.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Unique identifier for a pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackId(pub Uuid);

/// Unique identifier for a published pack version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(pub Uuid);

/// Unique identifier for a file row within a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub Uuid);

impl PackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PackId {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for VersionId {
    fn default() -> Self {
        Self::new()
    }
}

impl FileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for VersionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── Pack Slug ───────────────────────────────────────────────────────

/// Maximum slug length.
pub const MAX_SLUG_LEN: usize = 64;

/// A URL-safe pack slug: `^[a-z0-9][a-z0-9-]{0,63}$`.
///
/// Slugs name the pack-local install directory, so the character set also
/// rules out path separators and dot segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PackSlug(String);

impl PackSlug {
    /// Validate and wrap a slug.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let bytes = s.as_bytes();
        let valid = !bytes.is_empty()
            && bytes.len() <= MAX_SLUG_LEN
            && (bytes[0].is_ascii_lowercase() || bytes[0].is_ascii_digit())
            && bytes
                .iter()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-');
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(ValidationError::InvalidSlug(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PackSlug {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for PackSlug {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for PackSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PackSlug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_slugs() {
        for s in ["demo", "a", "0day", "agent-skills-2", &"x".repeat(64)] {
            assert!(PackSlug::parse(s).is_ok(), "{s} should be valid");
        }
    }

    #[test]
    fn invalid_slugs() {
        for s in ["", "-lead", "Upper", "has space", "dot.dot", "../x", "a/b", &"x".repeat(65)] {
            assert!(PackSlug::parse(s).is_err(), "{s} should be rejected");
        }
    }

    #[test]
    fn slug_deserialization_validates() {
        assert!(serde_json::from_str::<PackSlug>("\"demo\"").is_ok());
        assert!(serde_json::from_str::<PackSlug>("\"../etc\"").is_err());
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(PackId::new(), PackId::new());
        assert_ne!(VersionId::new(), VersionId::new());
    }

    #[test]
    fn pack_id_serializes_as_bare_uuid() {
        let id = PackId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
    }
}
