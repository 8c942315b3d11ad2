//! # packreg-crypto — Keys and Content Storage
//!
//! - [`ed25519`]: key pairs, public keys and signatures. Signing requires
//!   `CanonicalBytes`.
//! - [`cas`]: the content-addressed store for published file bytes, with a
//!   filesystem backend and an in-memory backend behind one async trait.

pub mod cas;
pub mod ed25519;

pub use cas::{CasError, ContentStore, FsContentStore, MemoryContentStore, StorageKey};
pub use ed25519::{
    verify, verify_with_public_key, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature,
};
