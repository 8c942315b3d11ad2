//! # In-Memory Pack Store
//!
//! Used when `DATABASE_URL` is absent and by tests. Each pack has its own
//! async mutex standing in for the Postgres row lock; record data sits
//! behind a single `RwLock` that is only held for synchronous sections, so
//! every publish commits its writes in one step.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use packreg_core::{FileId, PackId, PackSlug, PackStatus, SemVer, Timestamp, VersionId};
use parking_lot::{Mutex, RwLock};
use tokio::sync::OwnedMutexGuard;

use crate::error::StoreError;
use crate::model::{NewPack, NewVersion, Pack, PackFile, PackVersion, PublishOutcome};
use crate::store::{sort_newest_first, PackStore, DEFAULT_LOCK_TIMEOUT};

#[derive(Debug, Default)]
struct Records {
    packs: HashMap<PackId, Pack>,
    slugs: HashMap<PackSlug, PackId>,
    versions: HashMap<PackId, Vec<PackVersion>>,
    files: HashMap<VersionId, Vec<PackFile>>,
}

/// Process-local [`PackStore`].
#[derive(Debug, Clone)]
pub struct MemoryPackStore {
    records: Arc<RwLock<Records>>,
    locks: Arc<Mutex<HashMap<PackId, Arc<tokio::sync::Mutex<()>>>>>,
    lock_timeout: Duration,
}

impl Default for MemoryPackStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPackStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Records::default())),
            locks: Arc::new(Mutex::new(HashMap::new())),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Acquire the exclusive lock for one pack. The guard releases it on drop.
    pub(crate) async fn lock_pack(&self, pack_id: PackId) -> Result<OwnedMutexGuard<()>, StoreError> {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(pack_id).or_default())
        };
        tokio::time::timeout(self.lock_timeout, lock.lock_owned())
            .await
            .map_err(|_| StoreError::LockTimeout(pack_id))
    }
}

#[async_trait]
impl PackStore for MemoryPackStore {
    async fn create_pack(&self, new: NewPack) -> Result<Pack, StoreError> {
        let mut records = self.records.write();
        if records.slugs.contains_key(&new.slug) {
            return Err(StoreError::SlugTaken(new.slug));
        }
        let now = Timestamp::now();
        let pack = Pack {
            id: PackId::new(),
            slug: new.slug,
            name: new.name,
            owner: new.owner,
            tier_required: new.tier_required,
            status: PackStatus::Draft,
            created_at: now,
            updated_at: now,
        };
        records.slugs.insert(pack.slug.clone(), pack.id);
        records.packs.insert(pack.id, pack.clone());
        Ok(pack)
    }

    async fn pack_by_id(&self, id: PackId) -> Result<Option<Pack>, StoreError> {
        Ok(self.records.read().packs.get(&id).cloned())
    }

    async fn pack_by_slug(&self, slug: &PackSlug) -> Result<Option<Pack>, StoreError> {
        let records = self.records.read();
        Ok(records
            .slugs
            .get(slug)
            .and_then(|id| records.packs.get(id))
            .cloned())
    }

    async fn publish_version(&self, new: NewVersion) -> Result<PublishOutcome, StoreError> {
        let pack_id = new.pack_id;
        let _guard = self.lock_pack(pack_id).await?;

        let mut records = self.records.write();
        let status = records
            .packs
            .get(&pack_id)
            .map(|p| p.status)
            .ok_or(StoreError::PackNotFound(pack_id))?;
        if !status.accepts_versions() {
            return Err(StoreError::PackNotPublishable { pack_id, status });
        }

        let existing = records.versions.entry(pack_id).or_default();
        if existing.iter().any(|v| v.version == new.version) {
            return Err(StoreError::VersionConflict {
                pack_id,
                version: new.version,
            });
        }
        let prior_count = existing.len();
        for v in existing.iter_mut() {
            v.is_latest = false;
        }

        let now = Timestamp::now();
        let version = PackVersion {
            id: VersionId::new(),
            pack_id,
            version: new.version,
            manifest: new.manifest,
            is_latest: true,
            published_at: now,
        };
        existing.push(version.clone());

        let mut files: Vec<PackFile> = new
            .files
            .into_iter()
            .map(|f| PackFile {
                id: FileId::new(),
                version_id: version.id,
                path: f.path,
                content_hash: f.content_hash,
                storage_key: f.storage_key,
                size: f.size,
                mime_type: f.mime_type,
            })
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        records.files.insert(version.id, files.clone());

        let promoted = prior_count == 0 && status == PackStatus::Draft;
        if let Some(pack) = records.packs.get_mut(&pack_id) {
            if promoted {
                pack.status = PackStatus::Published;
            }
            pack.updated_at = now;
        }

        Ok(PublishOutcome {
            version,
            files,
            promoted,
        })
    }

    async fn version(
        &self,
        pack_id: PackId,
        version: &SemVer,
    ) -> Result<Option<PackVersion>, StoreError> {
        Ok(self
            .records
            .read()
            .versions
            .get(&pack_id)
            .and_then(|vs| vs.iter().find(|v| &v.version == version))
            .cloned())
    }

    async fn latest_version(&self, pack_id: PackId) -> Result<Option<PackVersion>, StoreError> {
        Ok(self
            .records
            .read()
            .versions
            .get(&pack_id)
            .and_then(|vs| vs.iter().find(|v| v.is_latest))
            .cloned())
    }

    async fn list_versions(&self, pack_id: PackId) -> Result<Vec<PackVersion>, StoreError> {
        let mut versions = self
            .records
            .read()
            .versions
            .get(&pack_id)
            .cloned()
            .unwrap_or_default();
        sort_newest_first(&mut versions);
        Ok(versions)
    }

    async fn files(&self, version_id: VersionId) -> Result<Vec<PackFile>, StoreError> {
        Ok(self
            .records
            .read()
            .files
            .get(&version_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn transition_status(
        &self,
        pack_id: PackId,
        target: PackStatus,
    ) -> Result<Pack, StoreError> {
        let _guard = self.lock_pack(pack_id).await?;

        let mut records = self.records.write();
        let pack = records
            .packs
            .get_mut(&pack_id)
            .ok_or(StoreError::PackNotFound(pack_id))?;
        if !pack.status.can_transition_to(target) {
            return Err(StoreError::InvalidTransition {
                from: pack.status,
                to: target,
            });
        }
        pack.status = target;
        pack.updated_at = Timestamp::now();
        Ok(pack.clone())
    }
}
