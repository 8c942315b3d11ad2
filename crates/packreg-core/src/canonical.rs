//! # Canonical Serialization
//!
//! `CanonicalBytes` is the only construction path for bytes that get signed
//! or hashed as structured data (license claims, watermark inputs).
//!
//! ## Invariant
//!
//! The inner buffer is private. `CanonicalBytes::new()` rejects floats and
//! serializes with `serde_jcs` (RFC 8785): sorted keys, compact separators,
//! a deterministic byte sequence. A verifier that re-serializes the same claims
//! always reproduces the bytes the issuer signed.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by JCS canonicalization with float rejection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Canonicalize any serializable value.
    ///
    /// # Errors
    ///
    /// `FloatRejected` if the value contains a non-integer number,
    /// `SerializationFailed` if serde or JCS serialization fails.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        let coerced = reject_floats(value)?;
        let s = serde_jcs::to_string(&coerced)?;
        Ok(Self(s.into_bytes()))
    }

    /// Reconstruct from bytes that are already canonical, validating that
    /// re-canonicalizing them is a fixed point.
    ///
    /// Used by verifiers that receive a payload over the wire and must sign-check
    /// the exact bytes they were given.
    pub fn from_canonical_slice(bytes: &[u8]) -> Result<Self, CanonicalizationError> {
        let value: Value = serde_json::from_slice(bytes)?;
        let recomputed = Self::new(&value)?;
        if recomputed.as_bytes() != bytes {
            return Err(CanonicalizationError::NotCanonical);
        }
        Ok(recomputed)
    }

    /// Access the canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn reject_floats(value: Value) -> Result<Value, CanonicalizationError> {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(value),
        Value::Number(ref n) => {
            if n.is_f64() && !n.is_i64() && !n.is_u64() {
                if let Some(f) = n.as_f64() {
                    return Err(CanonicalizationError::FloatRejected(f));
                }
            }
            Ok(value)
        }
        Value::Object(map) => {
            let mut coerced = serde_json::Map::new();
            for (k, v) in map {
                coerced.insert(k, reject_floats(v)?);
            }
            Ok(Value::Object(coerced))
        }
        Value::Array(arr) => {
            let coerced: Result<Vec<_>, _> = arr.into_iter().map(reject_floats).collect();
            Ok(Value::Array(coerced?))
        }
    }
}
