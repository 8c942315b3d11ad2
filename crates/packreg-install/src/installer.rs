//! # Installer
//!
//! One install attempt walks a fixed sequence of steps:
//!
//! ```text
//! Requested → TierChecked → Downloaded → Staged → Written
//!           → LicensePersisted → IgnoreUpdated → Done
//! ```
//!
//! Nothing touches the project before `Written`: tier refusal, license
//! failures, hash mismatches and collisions all abort with the project
//! unchanged, and so does cancellation. Every file is fully staged (decoded,
//! checked, marked) in memory and then written in one call.
//!
//! A failure after writing begins leaves a partial install. The pack
//! directory exists, so the next install reports `AlreadyInstalled` and
//! points at update or uninstall.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use packreg_core::wire::{DownloadResponse, PackInfo, LATEST_ALIAS};
use packreg_core::{can_access, sha256_hex, PackSlug, SemVer, Timestamp};
use packreg_crypto::Ed25519PublicKey;
use packreg_license::{Clock, LicenseClaims, LicenseVerifier, SystemClock, Verification};
use packreg_marker::{add_marker, check_integrity, remove_marker, should_mark, IntegrityStatus};
use tokio_util::sync::CancellationToken;

use crate::client::{HttpRegistryClient, RegistryClient};
use crate::config::ClientConfig;
use crate::error::{ClientError, InstallError};
use crate::ignore;
use crate::layout::{ProjectLayout, CLAUDE_DIR};
use crate::record::{
    read_json, read_json_optional, write_json, Artifact, InstallRecord, LicenseRecord,
    RegistryRecord,
};

// ─── Steps ───────────────────────────────────────────────────────────

/// Progress of one install or update attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStep {
    Requested,
    TierChecked,
    Downloaded,
    Staged,
    Written,
    LicensePersisted,
    IgnoreUpdated,
    Done,
}

impl InstallStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::TierChecked => "tier_checked",
            Self::Downloaded => "downloaded",
            Self::Staged => "staged",
            Self::Written => "written",
            Self::LicensePersisted => "license_persisted",
            Self::IgnoreUpdated => "ignore_updated",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for InstallStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Reports ─────────────────────────────────────────────────────────

/// Result of a successful install or update.
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub pack: PackSlug,
    pub version: SemVer,
    /// Project-relative paths written.
    pub artifacts: Vec<String>,
    /// Paths removed because the new version no longer ships them.
    pub removed: Vec<String>,
    pub license_expires_at: Timestamp,
    pub watermark: String,
}

/// Integrity of one installed artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Intact,
    /// Content differs from what was installed.
    Modified { expected: String, actual: String },
    /// A marked artifact whose marker is gone or unparseable.
    Unmarked,
    Missing,
}

impl FileStatus {
    pub fn is_intact(&self) -> bool {
        matches!(self, Self::Intact)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: String,
    pub status: FileStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseStatus {
    Valid { expires_at: Timestamp },
    /// `expired`, `invalid_signature`, `malformed` or `license_mismatch`.
    Invalid { reason: String },
}

/// Offline check of one installed pack.
#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub pack: PackSlug,
    pub version: SemVer,
    pub license: LicenseStatus,
    pub files: Vec<FileReport>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        matches!(self.license, LicenseStatus::Valid { .. })
            && self.files.iter().all(|f| f.status.is_intact())
    }

    /// Files that are anything but intact.
    pub fn problems(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| !f.status.is_intact())
    }
}

/// One entry of [`Installer::list`].
#[derive(Debug, Clone)]
pub struct InstalledPack {
    pub pack: PackSlug,
    pub version: SemVer,
    pub installed_at: Timestamp,
    pub license_expires_at: Option<Timestamp>,
    pub artifacts: usize,
}

// ─── Installer ───────────────────────────────────────────────────────

/// A file ready to be written.
struct StagedFile {
    artifact: Artifact,
    target: PathBuf,
    bytes: Vec<u8>,
}

/// Installs packs from one registry into one project.
pub struct Installer {
    client: Arc<dyn RegistryClient>,
    layout: ProjectLayout,
    registry_url: String,
    configured_key: Option<Ed25519PublicKey>,
    upgrade_url: String,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Installer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer")
            .field("project", &self.layout.root())
            .field("registry_url", &self.registry_url)
            .field("configured_key", &self.configured_key.as_ref().map(|k| k.key_id()))
            .finish()
    }
}

impl Installer {
    pub fn new(client: Arc<dyn RegistryClient>, config: &ClientConfig) -> Result<Self, InstallError> {
        let configured_key = config
            .public_key
            .as_deref()
            .map(Ed25519PublicKey::from_hex)
            .transpose()?;
        Ok(Self {
            client,
            layout: ProjectLayout::new(&config.project_dir),
            registry_url: config.registry_url.clone(),
            configured_key,
            upgrade_url: config.upgrade_url.clone(),
            clock: Arc::new(SystemClock),
            cancel: CancellationToken::new(),
        })
    }

    /// Installer over HTTP.
    pub fn connect(config: &ClientConfig) -> Result<Self, InstallError> {
        let client = HttpRegistryClient::new(config)?;
        Self::new(Arc::new(client), config)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Cancelling `token` stops the next install at its next step boundary.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    fn checkpoint(&self, next: InstallStep) -> Result<(), InstallError> {
        if self.cancel.is_cancelled() {
            tracing::info!(step = %next, "install cancelled");
            return Err(InstallError::Cancelled { step: next });
        }
        tracing::debug!(step = %next, "install step");
        Ok(())
    }

    // ── install ─────────────────────────────────────────────────────

    /// Install `slug` at `version` (a SemVer string or `latest`; `None`
    /// means latest).
    pub async fn install(
        &self,
        slug: &PackSlug,
        version: Option<&str>,
    ) -> Result<InstallReport, InstallError> {
        tracing::info!(pack = %slug, version = version.unwrap_or(LATEST_ALIAS), "installing pack");
        let requested = parse_requested(version)?;

        self.checkpoint(InstallStep::TierChecked)?;
        let info = self.check_tier(slug).await?;

        self.checkpoint(InstallStep::Downloaded)?;
        let (download, claims, pin) = self.download(slug, &info, requested.as_ref()).await?;

        self.checkpoint(InstallStep::Staged)?;
        let pack_dir = self.layout.pack_dir(slug);
        if exists(&pack_dir).await? {
            return Err(InstallError::AlreadyInstalled {
                slug: slug.clone(),
                path: pack_dir,
            });
        }
        let staged = self.stage(slug, &download, &HashSet::new()).await?;

        self.checkpoint(InstallStep::Written)?;
        self.write_staged(slug, &download, &staged).await?;

        self.checkpoint(InstallStep::LicensePersisted)?;
        let record = self.persist(slug, &download, &claims, &staged, pin).await?;

        self.checkpoint(InstallStep::IgnoreUpdated)?;
        self.update_ignore(slug, &record.ignore_entries, false).await?;

        tracing::info!(
            pack = %slug,
            version = %download.version,
            files = staged.len(),
            step = %InstallStep::Done,
            "pack installed"
        );
        Ok(report(&download, &record, Vec::new()))
    }

    // ── update ──────────────────────────────────────────────────────

    /// Replace an installed pack with `version` (default latest).
    ///
    /// Refuses when any installed artifact was edited locally, unless
    /// `force`. Artifacts the new version no longer ships are removed.
    pub async fn update(
        &self,
        slug: &PackSlug,
        version: Option<&str>,
        force: bool,
    ) -> Result<InstallReport, InstallError> {
        tracing::info!(pack = %slug, version = version.unwrap_or(LATEST_ALIAS), force, "updating pack");
        let requested = parse_requested(version)?;
        let previous = self.installed_record(slug).await?;

        let modified: Vec<PathBuf> = self
            .artifact_reports(&previous)
            .await?
            .into_iter()
            .filter(|r| matches!(r.status, FileStatus::Modified { .. } | FileStatus::Unmarked))
            .map(|r| self.layout.resolve(&r.path))
            .collect();
        if !modified.is_empty() {
            if !force {
                return Err(InstallError::Modified { paths: modified });
            }
            tracing::warn!(pack = %slug, files = modified.len(), "overwriting locally modified files");
        }

        self.checkpoint(InstallStep::TierChecked)?;
        let info = self.check_tier(slug).await?;

        self.checkpoint(InstallStep::Downloaded)?;
        let (download, claims, pin) = self.download(slug, &info, requested.as_ref()).await?;

        self.checkpoint(InstallStep::Staged)?;
        let owned: HashSet<String> = previous.artifacts.iter().map(|a| a.path.clone()).collect();
        let staged = self.stage(slug, &download, &owned).await?;

        self.checkpoint(InstallStep::Written)?;
        self.write_staged(slug, &download, &staged).await?;
        let shipped: HashSet<&str> = staged.iter().map(|s| s.artifact.path.as_str()).collect();
        let mut removed = Vec::new();
        for artifact in &previous.artifacts {
            if !shipped.contains(artifact.path.as_str()) {
                self.remove_artifact(&artifact.path).await?;
                removed.push(artifact.path.clone());
            }
        }

        self.checkpoint(InstallStep::LicensePersisted)?;
        let record = self.persist(slug, &download, &claims, &staged, pin).await?;

        self.checkpoint(InstallStep::IgnoreUpdated)?;
        self.update_ignore(slug, &record.ignore_entries, true).await?;

        tracing::info!(
            pack = %slug,
            from = %previous.version,
            to = %download.version,
            removed = removed.len(),
            "pack updated"
        );
        Ok(report(&download, &record, removed))
    }

    // ── uninstall ───────────────────────────────────────────────────

    /// Remove every recorded artifact, the pack directory and the
    /// `.gitignore` section. Returns the artifact paths removed.
    ///
    /// Works on partial installs that never wrote a record.
    pub async fn uninstall(&self, slug: &PackSlug) -> Result<Vec<String>, InstallError> {
        let pack_dir = self.layout.pack_dir(slug);
        if !exists(&pack_dir).await? {
            return Err(InstallError::NotInstalled(slug.clone()));
        }
        let record: Option<InstallRecord> =
            read_json_optional(&self.layout.install_record_path(slug)).await?;

        let mut removed = Vec::new();
        if let Some(record) = &record {
            for artifact in &record.artifacts {
                if !ProjectLayout::in_pack_dir(slug, &artifact.path) {
                    self.remove_artifact(&artifact.path).await?;
                }
                removed.push(artifact.path.clone());
            }
        } else {
            tracing::warn!(pack = %slug, "no install record; removing pack directory only");
        }
        tokio::fs::remove_dir_all(&pack_dir)
            .await
            .map_err(InstallError::io(&pack_dir))?;

        let path = self.layout.gitignore_path();
        let existing = read_optional_text(&path).await?;
        let updated = ignore::remove_section(&existing, slug.as_str());
        if updated != existing {
            tokio::fs::write(&path, updated)
                .await
                .map_err(InstallError::io(&path))?;
        }

        tracing::info!(pack = %slug, files = removed.len(), "pack uninstalled");
        Ok(removed)
    }

    // ── verify ──────────────────────────────────────────────────────

    /// Offline check of one installed pack, or all of them.
    ///
    /// Uses the configured key or the pinned one; never contacts the
    /// registry and never repairs anything.
    pub async fn verify(&self, slug: Option<&PackSlug>) -> Result<Vec<VerifyReport>, InstallError> {
        let key = match &self.configured_key {
            Some(key) => key.clone(),
            None => match self.pinned_key().await? {
                Some(record) => Ed25519PublicKey::from_hex(&record.public_key)?,
                None => {
                    return Err(InstallError::NoPinnedKey {
                        path: self.layout.registry_path(),
                    })
                }
            },
        };
        let verifier = LicenseVerifier::new(key).with_clock(self.clock.clone());

        let records = match slug {
            Some(s) => vec![self.installed_record(s).await?],
            None => {
                let mut records = Vec::new();
                for slug in self.installed_slugs().await? {
                    let path = self.layout.install_record_path(&slug);
                    match read_json_optional::<InstallRecord>(&path).await? {
                        Some(record) => records.push(record),
                        None => tracing::warn!(
                            pack = %slug,
                            "skipping directory without install record; uninstall or reinstall it"
                        ),
                    }
                }
                records
            }
        };

        let mut reports = Vec::with_capacity(records.len());
        for record in records {
            let slug = &record.pack;
            let license: Option<LicenseRecord> =
                read_json_optional(&self.layout.license_path(slug)).await?;
            let license = match license {
                Some(l) => license_status(&verifier, &l, &record),
                None => LicenseStatus::Invalid {
                    reason: "missing".into(),
                },
            };
            let files = self.artifact_reports(&record).await?;
            let report = VerifyReport {
                pack: record.pack,
                version: record.version,
                license,
                files,
            };
            if report.is_ok() {
                tracing::debug!(pack = %report.pack, "pack verified");
            } else {
                tracing::warn!(pack = %report.pack, license = ?report.license, "pack failed verification");
            }
            reports.push(report);
        }
        Ok(reports)
    }

    // ── list ────────────────────────────────────────────────────────

    /// Installed packs, sorted by slug.
    pub async fn list(&self) -> Result<Vec<InstalledPack>, InstallError> {
        let mut packs = Vec::new();
        for slug in self.installed_slugs().await? {
            let Some(record): Option<InstallRecord> =
                read_json_optional(&self.layout.install_record_path(&slug)).await?
            else {
                tracing::debug!(pack = %slug, "skipping directory without install record");
                continue;
            };
            let license: Option<LicenseRecord> =
                read_json_optional(&self.layout.license_path(&slug)).await?;
            packs.push(InstalledPack {
                pack: record.pack,
                version: record.version,
                installed_at: record.installed_at,
                license_expires_at: license.map(|l| l.expires_at),
                artifacts: record.artifacts.len(),
            });
        }
        Ok(packs)
    }

    // ─── Steps ───────────────────────────────────────────────────────

    async fn check_tier(&self, slug: &PackSlug) -> Result<PackInfo, InstallError> {
        let account = self.client.account().await?;
        let info = self.client.pack(slug).await.map_err(|e| match e {
            ClientError::NotFound { .. } => InstallError::PackNotFound(slug.clone()),
            other => other.into(),
        })?;
        if !can_access(account.tier, info.tier_required) {
            tracing::info!(
                pack = %slug,
                current = %account.tier,
                required = %info.tier_required,
                "tier insufficient"
            );
            return Err(InstallError::TierInsufficient {
                current: account.tier,
                required: info.tier_required,
                upgrade_url: self.upgrade_url.clone(),
            });
        }
        Ok(info)
    }

    /// Fetch files and license, and verify the license before anything is
    /// staged. Returns the registry record to pin when no key was known.
    async fn download(
        &self,
        slug: &PackSlug,
        info: &PackInfo,
        requested: Option<&SemVer>,
    ) -> Result<(DownloadResponse, LicenseClaims, Option<RegistryRecord>), InstallError> {
        let label = requested.map_or_else(|| LATEST_ALIAS.to_string(), SemVer::to_string);
        if requested.is_none() && info.latest_version.is_none() {
            return Err(InstallError::VersionNotFound {
                slug: slug.clone(),
                version: label,
            });
        }
        let download = self.client.download(slug, &label).await.map_err(|e| match e {
            ClientError::NotFound { .. } => InstallError::VersionNotFound {
                slug: slug.clone(),
                version: label.clone(),
            },
            other => other.into(),
        })?;

        let (key, pin) = self.registry_key().await?;
        let verifier = LicenseVerifier::new(key).with_clock(self.clock.clone());
        let claims = match verifier.verify(&download.license.token) {
            Verification::Valid(claims) => claims,
            Verification::Invalid(reason) => {
                return Err(InstallError::LicenseInvalid {
                    reason: reason.as_str().to_string(),
                })
            }
        };
        claims.check_resource(slug, &download.version)?;
        if let Some(v) = requested {
            claims.check_resource(slug, v)?;
        }
        tracing::debug!(
            pack = %slug,
            version = %download.version,
            files = download.files.len(),
            license_id = %claims.license_id,
            "download verified"
        );
        Ok((download, claims, pin))
    }

    /// Decode, hash-check, route and mark every file. Targets outside
    /// `owned` that already exist are collisions.
    async fn stage(
        &self,
        slug: &PackSlug,
        download: &DownloadResponse,
        owned: &HashSet<String>,
    ) -> Result<Vec<StagedFile>, InstallError> {
        let mut seen = HashSet::new();
        let mut staged = Vec::with_capacity(download.files.len());
        for file in &download.files {
            let bytes = file.decode_content().map_err(|source| InstallError::Decode {
                path: file.path.to_string(),
                source,
            })?;
            let actual = sha256_hex(&bytes);
            if actual != file.content_hash {
                return Err(InstallError::HashMismatch {
                    path: file.path.to_string(),
                    expected: file.content_hash.clone(),
                    actual,
                });
            }

            let rel = ProjectLayout::route(slug, &file.path);
            let target = self.layout.resolve(&rel);
            if ProjectLayout::is_reserved(slug, &rel) || !seen.insert(rel.clone()) {
                return Err(InstallError::Collision { path: target });
            }
            if !owned.contains(&rel) && exists(&target).await? {
                return Err(InstallError::Collision { path: target });
            }

            let marked = should_mark(&file.path);
            let bytes = add_marker(&bytes, slug, &download.version, &file.path);
            staged.push(StagedFile {
                artifact: Artifact {
                    path: rel,
                    source: file.path.clone(),
                    content_hash: actual,
                    marked,
                },
                target,
                bytes,
            });
        }
        Ok(staged)
    }

    async fn write_staged(
        &self,
        slug: &PackSlug,
        download: &DownloadResponse,
        staged: &[StagedFile],
    ) -> Result<(), InstallError> {
        for file in staged {
            if let Some(parent) = file.target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(InstallError::io(parent))?;
            }
            tokio::fs::write(&file.target, &file.bytes)
                .await
                .map_err(InstallError::io(&file.target))?;
        }
        write_json(&self.layout.manifest_path(slug), &download.manifest).await
    }

    async fn persist(
        &self,
        slug: &PackSlug,
        download: &DownloadResponse,
        claims: &LicenseClaims,
        staged: &[StagedFile],
        pin: Option<RegistryRecord>,
    ) -> Result<InstallRecord, InstallError> {
        let now = self.clock.now();
        let license = LicenseRecord {
            pack: slug.clone(),
            version: download.version.clone(),
            token: download.license.token.clone(),
            expires_at: claims.expires_at().unwrap_or(download.license.expires_at),
            watermark: download.license.watermark.clone(),
            installed_at: now,
        };
        write_json(&self.layout.license_path(slug), &license).await?;

        let mut ignore_entries = vec![format!("{}/", ProjectLayout::pack_rel(slug))];
        ignore_entries.extend(
            staged
                .iter()
                .map(|s| &s.artifact.path)
                .filter(|p| !ProjectLayout::in_pack_dir(slug, p))
                .cloned(),
        );
        let record = InstallRecord {
            pack: slug.clone(),
            version: download.version.clone(),
            installed_at: now,
            artifacts: staged.iter().map(|s| s.artifact.clone()).collect(),
            ignore_entries,
        };
        write_json(&self.layout.install_record_path(slug), &record).await?;

        if let Some(pin) = pin {
            write_json(&self.layout.registry_path(), &pin).await?;
            tracing::info!(key_id = %pin.key_id, registry = %pin.registry_url, "pinned registry key");
        }
        Ok(record)
    }

    async fn update_ignore(
        &self,
        slug: &PackSlug,
        entries: &[String],
        replace: bool,
    ) -> Result<(), InstallError> {
        let path = self.layout.gitignore_path();
        let existing = read_optional_text(&path).await?;
        let base = if replace {
            ignore::remove_section(&existing, slug.as_str())
        } else {
            existing.clone()
        };
        let updated = ignore::add_entries(&base, slug.as_str(), entries);
        if updated != existing {
            tokio::fs::write(&path, updated)
                .await
                .map_err(InstallError::io(&path))?;
        }
        Ok(())
    }

    // ─── Keys ────────────────────────────────────────────────────────

    async fn pinned_key(&self) -> Result<Option<RegistryRecord>, InstallError> {
        read_json_optional(&self.layout.registry_path()).await
    }

    /// Configured key, else pinned key, else the registry's published key
    /// (returned as a record to pin once the install commits).
    async fn registry_key(&self) -> Result<(Ed25519PublicKey, Option<RegistryRecord>), InstallError> {
        if let Some(key) = &self.configured_key {
            return Ok((key.clone(), None));
        }
        if let Some(pinned) = self.pinned_key().await? {
            if pinned.registry_url != self.registry_url {
                tracing::warn!(
                    pinned = %pinned.registry_url,
                    current = %self.registry_url,
                    "verifying against a key pinned for a different registry"
                );
            }
            return Ok((Ed25519PublicKey::from_hex(&pinned.public_key)?, None));
        }

        let info = self.client.license_key().await?;
        let key = Ed25519PublicKey::from_hex(&info.public_key)?;
        if key.key_id() != info.key_id {
            return Err(InstallError::RegistryKey(packreg_core::CryptoError::KeyError(
                format!("registry key id {} does not match its key", info.key_id),
            )));
        }
        let record = RegistryRecord {
            registry_url: self.registry_url.clone(),
            key_id: info.key_id,
            public_key: key.to_hex(),
            pinned_at: self.clock.now(),
        };
        Ok((key, Some(record)))
    }

    // ─── Filesystem helpers ──────────────────────────────────────────

    async fn installed_record(&self, slug: &PackSlug) -> Result<InstallRecord, InstallError> {
        let path = self.layout.install_record_path(slug);
        if !exists(&path).await? {
            return Err(InstallError::NotInstalled(slug.clone()));
        }
        read_json(&path).await
    }

    async fn installed_slugs(&self) -> Result<Vec<PackSlug>, InstallError> {
        let dir = self.layout.packs_dir();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(InstallError::io(&dir)(e)),
        };
        let mut slugs = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(InstallError::io(&dir))? {
            let is_dir = entry
                .file_type()
                .await
                .map_err(InstallError::io(entry.path()))?
                .is_dir();
            if !is_dir {
                continue;
            }
            if let Some(slug) = entry.file_name().to_str().and_then(|n| PackSlug::parse(n).ok()) {
                slugs.push(slug);
            }
        }
        slugs.sort();
        Ok(slugs)
    }

    async fn artifact_reports(&self, record: &InstallRecord) -> Result<Vec<FileReport>, InstallError> {
        let mut reports = Vec::with_capacity(record.artifacts.len());
        for artifact in &record.artifacts {
            let status = self.file_status(artifact).await?;
            reports.push(FileReport {
                path: artifact.path.clone(),
                status,
            });
        }
        Ok(reports)
    }

    async fn file_status(&self, artifact: &Artifact) -> Result<FileStatus, InstallError> {
        let path = self.layout.resolve(&artifact.path);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(FileStatus::Missing),
            Err(e) => return Err(InstallError::io(&path)(e)),
        };
        if !artifact.marked {
            let actual = sha256_hex(&bytes);
            return Ok(if actual == artifact.content_hash {
                FileStatus::Intact
            } else {
                FileStatus::Modified {
                    expected: artifact.content_hash.clone(),
                    actual,
                }
            });
        }
        Ok(match check_integrity(&bytes) {
            IntegrityStatus::Intact(_) => {
                // A rewritten marker can match an edited body; the record
                // holds the full hash of what was installed.
                let actual = sha256_hex(remove_marker(&bytes));
                if actual == artifact.content_hash {
                    FileStatus::Intact
                } else {
                    FileStatus::Modified {
                        expected: artifact.content_hash.clone(),
                        actual,
                    }
                }
            }
            IntegrityStatus::Modified { expected, actual } => FileStatus::Modified { expected, actual },
            IntegrityStatus::Unmarked => FileStatus::Unmarked,
        })
    }

    /// Delete one artifact and any directories under `.claude` it leaves
    /// empty. Already-missing files are fine.
    async fn remove_artifact(&self, rel: &str) -> Result<(), InstallError> {
        let path = self.layout.resolve(rel);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(InstallError::io(&path)(e)),
        }
        let stop = self.layout.resolve(CLAUDE_DIR);
        let mut dir = path.parent();
        while let Some(d) = dir {
            if d == stop || !d.starts_with(&stop) {
                break;
            }
            // Fails on non-empty directories, which ends the walk.
            if tokio::fs::remove_dir(d).await.is_err() {
                break;
            }
            dir = d.parent();
        }
        Ok(())
    }
}

// ─── Free helpers ────────────────────────────────────────────────────

fn parse_requested(version: Option<&str>) -> Result<Option<SemVer>, InstallError> {
    match version {
        None => Ok(None),
        Some(v) if v == LATEST_ALIAS => Ok(None),
        Some(v) => SemVer::parse(v)
            .map(Some)
            .map_err(|_| InstallError::InvalidVersion(v.to_string())),
    }
}

fn license_status(
    verifier: &LicenseVerifier,
    license: &LicenseRecord,
    record: &InstallRecord,
) -> LicenseStatus {
    match verifier.verify(&license.token) {
        Verification::Valid(claims) => match claims.check_resource(&record.pack, &record.version) {
            Ok(()) => LicenseStatus::Valid {
                expires_at: claims.expires_at().unwrap_or(license.expires_at),
            },
            Err(_) => LicenseStatus::Invalid {
                reason: "license_mismatch".into(),
            },
        },
        Verification::Invalid(reason) => LicenseStatus::Invalid {
            reason: reason.as_str().to_string(),
        },
    }
}

fn report(download: &DownloadResponse, record: &InstallRecord, removed: Vec<String>) -> InstallReport {
    InstallReport {
        pack: record.pack.clone(),
        version: record.version.clone(),
        artifacts: record.artifacts.iter().map(|a| a.path.clone()).collect(),
        removed,
        license_expires_at: download.license.expires_at,
        watermark: download.license.watermark.clone(),
    }
}

async fn exists(path: &Path) -> Result<bool, InstallError> {
    tokio::fs::try_exists(path)
        .await
        .map_err(InstallError::io(path))
}

async fn read_optional_text(path: &Path) -> Result<String, InstallError> {
    match tokio::fs::read_to_string(path).await {
        Ok(s) => Ok(s),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(InstallError::io(path)(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packreg_core::LogicalPath;

    #[test]
    fn latest_and_none_mean_latest() {
        assert_eq!(parse_requested(None).unwrap(), None);
        assert_eq!(parse_requested(Some("latest")).unwrap(), None);
        assert_eq!(
            parse_requested(Some("1.2.3")).unwrap(),
            Some(SemVer::new(1, 2, 3))
        );
        assert!(matches!(
            parse_requested(Some("1.x")),
            Err(InstallError::InvalidVersion(_))
        ));
    }

    #[test]
    fn step_names_are_stable() {
        assert_eq!(InstallStep::LicensePersisted.to_string(), "license_persisted");
        assert_eq!(InstallStep::Done.to_string(), "done");
    }

    #[test]
    fn logical_paths_route_into_records() {
        let slug = PackSlug::parse("demo").unwrap();
        let path = LogicalPath::parse("commands/ship.md").unwrap();
        let rel = ProjectLayout::route(&slug, &path);
        assert!(!ProjectLayout::in_pack_dir(&slug, &rel));
    }
}
