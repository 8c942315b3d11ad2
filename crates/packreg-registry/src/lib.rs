//! # packreg-registry — Packs, Versions and the Publish Transaction
//!
//! Owns the registry's relational state: packs, their versions and the
//! files each version ships.
//!
//! ## Guarantees
//!
//! - At most one version per pack has `is_latest = true`.
//! - A pack moves from `draft` to `published` exactly once, in the same
//!   transaction that commits its first version.
//! - A duplicate version string fails fast with `VersionConflict` and leaves
//!   the existing latest version untouched.
//!
//! ## Backends
//!
//! [`PgPackStore`] (production) and [`MemoryPackStore`] (development and
//! tests) implement [`PackStore`] with the same lock and timeout semantics.
//! [`VersionPublisher`] wraps either one with request validation, content
//! store writes and retry.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod publisher;
pub mod retry;
pub mod store;

pub use error::{PublishError, StoreError};
pub use memory::MemoryPackStore;
pub use model::{NewFile, NewPack, NewVersion, Pack, PackFile, PackVersion, PublishOutcome};
pub use postgres::{migrate, PgPackStore};
pub use publisher::{PublishFile, VersionPublisher};
pub use retry::RetryPolicy;
pub use store::{PackStore, DEFAULT_LOCK_TIMEOUT};
