//! # On-Disk Records
//!
//! JSON files the installer keeps next to an installed pack:
//!
//! | File | Type | Purpose |
//! |------|------|---------|
//! | `.license.json` | [`LicenseRecord`] | license for offline re-verification |
//! | `.install.json` | [`InstallRecord`] | every artifact written, for update/uninstall/verify |
//! | `../.registry.json` | [`RegistryRecord`] | pinned registry public key |

use std::path::Path;

use packreg_core::{LogicalPath, PackSlug, SemVer, Timestamp};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::InstallError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    pub pack: PackSlug,
    pub version: SemVer,
    pub token: String,
    pub expires_at: Timestamp,
    pub watermark: String,
    pub installed_at: Timestamp,
}

/// One file written by an install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Project-relative, `/`-separated.
    pub path: String,
    /// Path inside the pack.
    pub source: LogicalPath,
    /// SHA-256 hex of the authored bytes, before any marker.
    pub content_hash: String,
    /// Whether a provenance marker was prepended.
    pub marked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRecord {
    pub pack: PackSlug,
    pub version: SemVer,
    pub installed_at: Timestamp,
    pub artifacts: Vec<Artifact>,
    /// Lines this install owns in the `.gitignore` section.
    #[serde(default)]
    pub ignore_entries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryRecord {
    pub registry_url: String,
    pub key_id: String,
    /// Hex Ed25519 public key.
    pub public_key: String,
    pub pinned_at: Timestamp,
}

// ─── JSON file helpers ───────────────────────────────────────────────

pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, InstallError> {
    let bytes = tokio::fs::read(path).await.map_err(InstallError::io(path))?;
    serde_json::from_slice(&bytes).map_err(|source| InstallError::Record {
        path: path.to_path_buf(),
        source,
    })
}

/// Like [`read_json`], but a missing file is `Ok(None)`.
pub async fn read_json_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, InstallError> {
    match tokio::fs::try_exists(path).await {
        Ok(true) => read_json(path).await.map(Some),
        Ok(false) => Ok(None),
        Err(e) => Err(InstallError::io(path)(e)),
    }
}

pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), InstallError> {
    let mut bytes = serde_json::to_vec_pretty(value).map_err(|source| InstallError::Record {
        path: path.to_path_buf(),
        source,
    })?;
    bytes.push(b'\n');
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(InstallError::io(parent))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(InstallError::io(path))
}
