//! # Leak-Attribution Watermarks
//!
//! A watermark is derived from a server-held seed, the licensed subject and
//! the pack. The same holder always receives the same watermark for a pack,
//! so a leaked license names its source. Watermarks play no part in access
//! decisions.

use packreg_core::{CanonicalBytes, CanonicalizationError, ContentDigest};
use serde::Serialize;

/// Prefix that makes watermarks recognisable in leaked material.
pub const WATERMARK_PREFIX: &str = "wm_";

/// Hex characters kept from the digest.
const WATERMARK_HEX_LEN: usize = 24;

#[derive(Serialize)]
struct WatermarkInput<'a> {
    seed: &'a str,
    subject: &'a str,
    pack: &'a str,
}

/// Derive the watermark for `subject` holding `pack`.
pub fn derive_watermark(
    seed: &str,
    subject: &str,
    pack: &str,
) -> Result<String, CanonicalizationError> {
    let canonical = CanonicalBytes::new(&WatermarkInput {
        seed,
        subject,
        pack,
    })?;
    let mut hex = ContentDigest::of_canonical(&canonical).to_hex();
    hex.truncate(WATERMARK_HEX_LEN);
    Ok(format!("{WATERMARK_PREFIX}{hex}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_holder() {
        let a = derive_watermark("seed", "alice", "demo").unwrap();
        let b = derive_watermark("seed", "alice", "demo").unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with(WATERMARK_PREFIX));
        assert_eq!(a.len(), WATERMARK_PREFIX.len() + WATERMARK_HEX_LEN);
    }

    #[test]
    fn differs_per_subject_pack_and_seed() {
        let base = derive_watermark("seed", "alice", "demo").unwrap();
        assert_ne!(base, derive_watermark("seed", "bob", "demo").unwrap());
        assert_ne!(base, derive_watermark("seed", "alice", "other").unwrap());
        assert_ne!(base, derive_watermark("other-seed", "alice", "demo").unwrap());
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        let a = derive_watermark("s", "ab", "c").unwrap();
        let b = derive_watermark("s", "a", "bc").unwrap();
        assert_ne!(a, b);
    }
}
