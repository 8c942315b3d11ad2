//! # Postgres Pack Store
//!
//! Persists packs, versions and file rows via SQLx. The publish transaction
//! takes `SELECT ... FOR UPDATE` on the pack row with a transaction-local
//! `lock_timeout`, so concurrent publishers to one pack serialize while
//! other packs proceed. Lifecycle rules live in
//! [`PackStatus`](packreg_core::PackStatus), not in SQL.
//!
//! SQLSTATE mapping: `55P03` (lock_not_available) becomes `LockTimeout`;
//! `23505` on `pack_versions_pack_version_key` becomes `VersionConflict` and
//! on `packs_slug_key` becomes `SlugTaken`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use packreg_core::{
    FileId, LogicalPath, PackId, PackSlug, PackStatus, SemVer, Tier, Timestamp, VersionId,
};
use packreg_crypto::StorageKey;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{NewPack, NewVersion, Pack, PackFile, PackVersion, PublishOutcome};
use crate::store::{sort_newest_first, PackStore, DEFAULT_LOCK_TIMEOUT};

const LOCK_NOT_AVAILABLE: &str = "55P03";
const UNIQUE_VIOLATION: &str = "23505";

/// Apply the embedded schema migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Postgres-backed [`PackStore`].
#[derive(Debug, Clone)]
pub struct PgPackStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgPackStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PackStore for PgPackStore {
    async fn create_pack(&self, new: NewPack) -> Result<Pack, StoreError> {
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

        sqlx::query(
            "INSERT INTO packs (id, slug, name, owner, tier_required, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(pack.id.0)
        .bind(pack.slug.as_str())
        .bind(&pack.name)
        .bind(&pack.owner)
        .bind(pack.tier_required.as_str())
        .bind(pack.status.as_str())
        .bind(*pack.created_at.as_datetime())
        .bind(*pack.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| match unique_violation_on(&e) {
            Some("packs_slug_key") => StoreError::SlugTaken(pack.slug.clone()),
            _ => StoreError::Database(e),
        })?;

        Ok(pack)
    }

    async fn pack_by_id(&self, id: PackId) -> Result<Option<Pack>, StoreError> {
        let row = sqlx::query_as::<_, PackRow>(&format!("{PACK_COLUMNS} WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(PackRow::into_pack).transpose()
    }

    async fn pack_by_slug(&self, slug: &PackSlug) -> Result<Option<Pack>, StoreError> {
        let row = sqlx::query_as::<_, PackRow>(&format!("{PACK_COLUMNS} WHERE slug = $1"))
            .bind(slug.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(PackRow::into_pack).transpose()
    }

    async fn publish_version(&self, new: NewVersion) -> Result<PublishOutcome, StoreError> {
        let pack_id = new.pack_id;
        // Dropping `tx` on any early return rolls back and releases the lock.
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await?;

        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM packs WHERE id = $1 FOR UPDATE")
                .bind(pack_id.0)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_lock_error(e, pack_id))?;
        let status = parse_status(&status.ok_or(StoreError::PackNotFound(pack_id))?)?;
        if !status.accepts_versions() {
            return Err(StoreError::PackNotPublishable { pack_id, status });
        }

        let version_text = new.version.to_string();
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM pack_versions WHERE pack_id = $1 AND version = $2)",
        )
        .bind(pack_id.0)
        .bind(&version_text)
        .fetch_one(&mut *tx)
        .await?;
        if exists {
            return Err(StoreError::VersionConflict {
                pack_id,
                version: new.version,
            });
        }

        let prior_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pack_versions WHERE pack_id = $1")
                .bind(pack_id.0)
                .fetch_one(&mut *tx)
                .await?;
        if prior_count > 0 {
            sqlx::query(
                "UPDATE pack_versions SET is_latest = FALSE WHERE pack_id = $1 AND is_latest",
            )
            .bind(pack_id.0)
            .execute(&mut *tx)
            .await?;
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
        sqlx::query(
            "INSERT INTO pack_versions (id, pack_id, version, manifest, is_latest, published_at)
             VALUES ($1, $2, $3, $4, TRUE, $5)",
        )
        .bind(version.id.0)
        .bind(pack_id.0)
        .bind(&version_text)
        .bind(&version.manifest)
        .bind(*now.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| match unique_violation_on(&e) {
            Some("pack_versions_pack_version_key") => StoreError::VersionConflict {
                pack_id,
                version: version.version.clone(),
            },
            _ => StoreError::Database(e),
        })?;

        let mut files = Vec::with_capacity(new.files.len());
        for f in new.files {
            let file = PackFile {
                id: FileId::new(),
                version_id: version.id,
                path: f.path,
                content_hash: f.content_hash,
                storage_key: f.storage_key,
                size: f.size,
                mime_type: f.mime_type,
            };
            let size = i64::try_from(file.size)
                .map_err(|_| StoreError::Corrupt(format!("file size {} overflows", file.size)))?;
            sqlx::query(
                "INSERT INTO pack_files (id, version_id, path, content_hash, storage_key, size, mime_type)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(file.id.0)
            .bind(version.id.0)
            .bind(file.path.as_str())
            .bind(&file.content_hash)
            .bind(file.storage_key.to_string())
            .bind(size)
            .bind(&file.mime_type)
            .execute(&mut *tx)
            .await?;
            files.push(file);
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let promoted = prior_count == 0 && status == PackStatus::Draft;
        let new_status = if promoted {
            PackStatus::Published
        } else {
            status
        };
        sqlx::query("UPDATE packs SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(new_status.as_str())
            .bind(*now.as_datetime())
            .bind(pack_id.0)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

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
        let row = sqlx::query_as::<_, VersionRow>(&format!(
            "{VERSION_COLUMNS} WHERE pack_id = $1 AND version = $2"
        ))
        .bind(pack_id.0)
        .bind(version.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(VersionRow::into_version).transpose()
    }

    async fn latest_version(&self, pack_id: PackId) -> Result<Option<PackVersion>, StoreError> {
        let row = sqlx::query_as::<_, VersionRow>(&format!(
            "{VERSION_COLUMNS} WHERE pack_id = $1 AND is_latest"
        ))
        .bind(pack_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(VersionRow::into_version).transpose()
    }

    async fn list_versions(&self, pack_id: PackId) -> Result<Vec<PackVersion>, StoreError> {
        let rows =
            sqlx::query_as::<_, VersionRow>(&format!("{VERSION_COLUMNS} WHERE pack_id = $1"))
                .bind(pack_id.0)
                .fetch_all(&self.pool)
                .await?;
        let mut versions = rows
            .into_iter()
            .map(VersionRow::into_version)
            .collect::<Result<Vec<_>, _>>()?;
        // Text ordering is not SemVer ordering.
        sort_newest_first(&mut versions);
        Ok(versions)
    }

    async fn files(&self, version_id: VersionId) -> Result<Vec<PackFile>, StoreError> {
        let rows = sqlx::query_as::<_, FileRow>(
            "SELECT id, version_id, path, content_hash, storage_key, size, mime_type
             FROM pack_files WHERE version_id = $1 ORDER BY path",
        )
        .bind(version_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(FileRow::into_file).collect()
    }

    async fn transition_status(
        &self,
        pack_id: PackId,
        target: PackStatus,
    ) -> Result<Pack, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, PackRow>(&format!("{PACK_COLUMNS} WHERE id = $1 FOR UPDATE"))
            .bind(pack_id.0)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_lock_error(e, pack_id))?;
        let mut pack = row
            .ok_or(StoreError::PackNotFound(pack_id))?
            .into_pack()?;
        if !pack.status.can_transition_to(target) {
            return Err(StoreError::InvalidTransition {
                from: pack.status,
                to: target,
            });
        }

        pack.status = target;
        pack.updated_at = Timestamp::now();
        sqlx::query("UPDATE packs SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(target.as_str())
            .bind(*pack.updated_at.as_datetime())
            .bind(pack_id.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(pack)
    }
}

// ─── Error Mapping ───────────────────────────────────────────────────

fn map_lock_error(e: sqlx::Error, pack_id: PackId) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some(LOCK_NOT_AVAILABLE) {
            return StoreError::LockTimeout(pack_id);
        }
    }
    StoreError::Database(e)
}

/// Constraint name of a unique violation, if `e` is one.
fn unique_violation_on(e: &sqlx::Error) -> Option<&str> {
    match e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            db.constraint()
        }
        _ => None,
    }
}

fn parse_status(s: &str) -> Result<PackStatus, StoreError> {
    s.parse()
        .map_err(|_| StoreError::Corrupt(format!("unknown pack status {s:?}")))
}

// ─── Row Types ───────────────────────────────────────────────────────

const PACK_COLUMNS: &str =
    "SELECT id, slug, name, owner, tier_required, status, created_at, updated_at FROM packs";

const VERSION_COLUMNS: &str =
    "SELECT id, pack_id, version, manifest, is_latest, published_at FROM pack_versions";

#[derive(sqlx::FromRow)]
struct PackRow {
    id: Uuid,
    slug: String,
    name: String,
    owner: String,
    tier_required: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PackRow {
    fn into_pack(self) -> Result<Pack, StoreError> {
        let slug = PackSlug::parse(&self.slug)
            .map_err(|e| StoreError::Corrupt(format!("pack {}: {e}", self.id)))?;
        let tier_required: Tier = self
            .tier_required
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("pack {}: {e}", self.id)))?;
        Ok(Pack {
            id: PackId(self.id),
            slug,
            name: self.name,
            owner: self.owner,
            tier_required,
            status: parse_status(&self.status)?,
            created_at: Timestamp::from_utc(self.created_at),
            updated_at: Timestamp::from_utc(self.updated_at),
        })
    }
}

#[derive(sqlx::FromRow)]
struct VersionRow {
    id: Uuid,
    pack_id: Uuid,
    version: String,
    manifest: serde_json::Value,
    is_latest: bool,
    published_at: DateTime<Utc>,
}

impl VersionRow {
    fn into_version(self) -> Result<PackVersion, StoreError> {
        let version = SemVer::parse(&self.version)
            .map_err(|e| StoreError::Corrupt(format!("version {}: {e}", self.id)))?;
        Ok(PackVersion {
            id: VersionId(self.id),
            pack_id: PackId(self.pack_id),
            version,
            manifest: self.manifest,
            is_latest: self.is_latest,
            published_at: Timestamp::from_utc(self.published_at),
        })
    }
}

#[derive(sqlx::FromRow)]
struct FileRow {
    id: Uuid,
    version_id: Uuid,
    path: String,
    content_hash: String,
    storage_key: String,
    size: i64,
    mime_type: String,
}

impl FileRow {
    fn into_file(self) -> Result<PackFile, StoreError> {
        let corrupt = |what: String| StoreError::Corrupt(format!("file {}: {what}", self.id));
        let path = LogicalPath::parse(&self.path).map_err(|e| corrupt(e.to_string()))?;
        let storage_key =
            StorageKey::parse(&self.storage_key).map_err(|e| corrupt(e.to_string()))?;
        let size = u64::try_from(self.size).map_err(|_| corrupt("negative size".into()))?;
        Ok(PackFile {
            id: FileId(self.id),
            version_id: VersionId(self.version_id),
            path,
            content_hash: self.content_hash,
            storage_key,
            size,
            mime_type: self.mime_type,
        })
    }
}
