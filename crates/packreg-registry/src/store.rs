//! # Pack Store Contract
//!
//! Both [`PgPackStore`](crate::postgres::PgPackStore) and
//! [`MemoryPackStore`](crate::memory::MemoryPackStore) implement this trait
//! with the same observable semantics. Callers hold an
//! `Arc<dyn PackStore>` and never branch on the backend.
//!
//! ## Publish transaction
//!
//! `publish_version` runs under an exclusive per-pack lock:
//!
//! 1. Lock the pack (bounded wait; `LockTimeout` on expiry).
//! 2. Reject if the pack's status does not accept versions.
//! 3. Reject if the version string exists (`VersionConflict`).
//! 4. Count existing versions; clear `is_latest` if any exist.
//! 5. Insert the version with `is_latest = true` and its file rows.
//! 6. If the count was zero and the pack is `draft`, set `published`.
//! 7. Commit. Nothing from steps 4-6 is visible before commit.
//!
//! Packs other than the locked one are unaffected.

use std::time::Duration;

use async_trait::async_trait;
use packreg_core::{PackId, PackSlug, PackStatus, SemVer, VersionId};

use crate::error::StoreError;
use crate::model::{NewPack, NewVersion, Pack, PackFile, PackVersion, PublishOutcome};

/// Default bound on waiting for a pack lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait PackStore: Send + Sync + 'static {
    /// Create a pack in `draft`. `SlugTaken` on duplicate slug.
    async fn create_pack(&self, new: NewPack) -> Result<Pack, StoreError>;

    async fn pack_by_id(&self, id: PackId) -> Result<Option<Pack>, StoreError>;

    async fn pack_by_slug(&self, slug: &PackSlug) -> Result<Option<Pack>, StoreError>;

    /// The locked publish transaction described in the module docs.
    async fn publish_version(&self, new: NewVersion) -> Result<PublishOutcome, StoreError>;

    async fn version(
        &self,
        pack_id: PackId,
        version: &SemVer,
    ) -> Result<Option<PackVersion>, StoreError>;

    async fn latest_version(&self, pack_id: PackId) -> Result<Option<PackVersion>, StoreError>;

    /// All versions of a pack, highest SemVer first.
    async fn list_versions(&self, pack_id: PackId) -> Result<Vec<PackVersion>, StoreError>;

    /// Files of a version, ordered by path.
    async fn files(&self, version_id: VersionId) -> Result<Vec<PackFile>, StoreError>;

    /// Apply a moderator/owner lifecycle transition.
    ///
    /// Only edges in [`PackStatus::valid_transitions`] are accepted; the
    /// draft-to-published edge belongs to `publish_version`.
    async fn transition_status(
        &self,
        pack_id: PackId,
        target: PackStatus,
    ) -> Result<Pack, StoreError>;
}

/// Sort versions highest first.
pub(crate) fn sort_newest_first(versions: &mut [PackVersion]) {
    versions.sort_by(|a, b| b.version.cmp(&a.version));
}
