//! Registry records and their wire projections.

use packreg_core::wire::{FileInfo, PackInfo, VersionInfo};
use packreg_core::{
    FileId, LogicalPath, PackId, PackSlug, PackStatus, SemVer, Tier, Timestamp, VersionId,
};
use packreg_crypto::StorageKey;
use serde_json::Value;

/// A pack row.
#[derive(Debug, Clone, PartialEq)]
pub struct Pack {
    pub id: PackId,
    pub slug: PackSlug,
    pub name: String,
    /// Subject of the publishing account.
    pub owner: String,
    pub tier_required: Tier,
    pub status: PackStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Pack {
    pub fn to_info(&self, latest_version: Option<SemVer>) -> PackInfo {
        PackInfo {
            id: self.id,
            slug: self.slug.clone(),
            name: self.name.clone(),
            status: self.status,
            tier_required: self.tier_required,
            latest_version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A committed pack version.
#[derive(Debug, Clone, PartialEq)]
pub struct PackVersion {
    pub id: VersionId,
    pub pack_id: PackId,
    pub version: SemVer,
    pub manifest: Value,
    pub is_latest: bool,
    pub published_at: Timestamp,
}

impl PackVersion {
    pub fn to_info(&self, files: &[PackFile]) -> VersionInfo {
        VersionInfo {
            id: self.id,
            pack_id: self.pack_id,
            version: self.version.clone(),
            is_latest: self.is_latest,
            published_at: self.published_at,
            files: files.iter().map(PackFile::to_info).collect(),
        }
    }
}

/// A file row. `content_hash` is the SHA-256 of the authored bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackFile {
    pub id: FileId,
    pub version_id: VersionId,
    pub path: LogicalPath,
    pub content_hash: String,
    pub storage_key: StorageKey,
    pub size: u64,
    pub mime_type: String,
}

impl PackFile {
    pub fn to_info(&self) -> FileInfo {
        FileInfo {
            path: self.path.clone(),
            content_hash: self.content_hash.clone(),
            size: self.size,
            mime_type: self.mime_type.clone(),
        }
    }
}

// ─── Inputs ──────────────────────────────────────────────────────────

/// Input to [`PackStore::create_pack`](crate::store::PackStore::create_pack).
#[derive(Debug, Clone)]
pub struct NewPack {
    pub slug: PackSlug,
    pub name: String,
    pub owner: String,
    pub tier_required: Tier,
}

/// A file whose bytes are already in the content store.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub path: LogicalPath,
    pub content_hash: String,
    pub storage_key: StorageKey,
    pub size: u64,
    pub mime_type: String,
}

/// Input to the publish transaction.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub pack_id: PackId,
    pub version: SemVer,
    pub manifest: Value,
    pub files: Vec<NewFile>,
}

/// Result of a committed publish.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub version: PackVersion,
    pub files: Vec<PackFile>,
    /// True when this publish moved the pack from draft to published.
    pub promoted: bool,
}
