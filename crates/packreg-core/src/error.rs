//! # Error Types
//!
//! Leaf error types shared by every crate in the workspace. Higher layers
//! wrap these in their own `thiserror` enums rather than stringifying them.

use thiserror::Error;

/// A value failed domain validation at construction time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Pack slug does not match `^[a-z0-9][a-z0-9-]{0,63}$`.
    #[error("invalid pack slug {0:?}: must be 1-64 chars of [a-z0-9-], starting with [a-z0-9]")]
    InvalidSlug(String),

    /// Version string is not valid SemVer 2.0.
    #[error("invalid version {version:?}: {reason}")]
    InvalidVersion {
        /// The rejected input.
        version: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// Logical file path is absolute, empty, or escapes the pack root.
    #[error("invalid pack path {path:?}: {reason}")]
    InvalidPath {
        /// The rejected path.
        path: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Tier name is not one of the known tiers.
    #[error("unknown tier {0:?}")]
    UnknownTier(String),

    /// Pack status name is not one of the known statuses.
    #[error("unknown pack status {0:?}")]
    UnknownStatus(String),

    /// Timestamp could not be parsed or is out of range.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Floats are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// Input bytes parse as JSON but are not in canonical form.
    #[error("payload is not in canonical form")]
    NotCanonical,

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Error in cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Signature verification failed.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    /// Key generation or parsing failed.
    #[error("key error: {0}")]
    KeyError(String),

    /// Hex decoding failed.
    #[error("hex decoding failed: {0}")]
    Hex(String),
}
