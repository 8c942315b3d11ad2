//! # packreg-core — Foundational Types for the Pack Registry
//!
//! Every other `packreg-*` crate depends on this one; it depends on nothing
//! internal. It defines the primitives that the publisher, the license
//! subsystem, the marker codec and the installer must agree on.
//!
//! ## Key Design Principles
//!
//! 1. **Newtypes for identifiers.** `PackId`, `VersionId`, `FileId` and the
//!    validated `PackSlug` cannot be confused with each other or with bare
//!    strings.
//!
//! 2. **`CanonicalBytes` for anything signed.** License claims and watermark
//!    inputs flow through `CanonicalBytes::new()` so the signed byte sequence
//!    is deterministic.
//!
//! 3. **Raw-byte digests for authored content.** File content hashes are
//!    computed over the bytes exactly as published, never over a marked copy.
//!
//! 4. **Tiers are an ordered enum.** Access checks are a single `>=`.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `packreg-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod path;
pub mod temporal;
pub mod tier;
pub mod version;
pub mod wire;

pub use canonical::CanonicalBytes;
pub use digest::{content_hash, sha256_hex, ContentDigest, CONTENT_HASH_LEN};
pub use error::{CanonicalizationError, CryptoError, ValidationError};
pub use identity::{FileId, PackId, PackSlug, VersionId};
pub use lifecycle::PackStatus;
pub use path::LogicalPath;
pub use temporal::Timestamp;
pub use tier::{can_access, Tier};
pub use version::SemVer;
