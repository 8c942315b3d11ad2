//! # Content-Addressed Byte Store
//!
//! Holds the authored bytes of every published pack file. Keys are derived
//! from the SHA-256 of the bytes, so:
//!
//! - writing the same bytes twice is a no-op,
//! - a publish that later fails with a version conflict cannot overwrite
//!   bytes belonging to an existing version, and
//! - every read can be verified against its key.
//!
//! ## Layout
//!
//! ```text
//! {root}/sha256/{hex[0..2]}/{hex}
//! ```
//!
//! Two backends implement [`ContentStore`]: [`FsContentStore`] for
//! deployments and [`MemoryContentStore`] for development and tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use packreg_core::ContentDigest;
use parking_lot::RwLock;
use subtle::ConstantTimeEq;
use thiserror::Error;

const KEY_PREFIX: &str = "sha256/";

// ---------------------------------------------------------------------------
// StorageKey
// ---------------------------------------------------------------------------

/// Deterministic, content-addressed storage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageKey(ContentDigest);

impl StorageKey {
    pub fn for_bytes(bytes: &[u8]) -> Self {
        Self(ContentDigest::of_bytes(bytes))
    }

    pub fn digest(&self) -> &ContentDigest {
        &self.0
    }

    /// Parse the string form `sha256/{2-hex}/{64-hex}`.
    pub fn parse(s: &str) -> Result<Self, CasError> {
        let rest = s
            .strip_prefix(KEY_PREFIX)
            .ok_or_else(|| CasError::InvalidKey(s.to_string()))?;
        let (shard, hex) = rest
            .split_once('/')
            .ok_or_else(|| CasError::InvalidKey(s.to_string()))?;
        let digest =
            ContentDigest::from_hex(hex).map_err(|_| CasError::InvalidKey(s.to_string()))?;
        if shard != &digest.to_hex()[..2] {
            return Err(CasError::InvalidKey(s.to_string()));
        }
        Ok(Self(digest))
    }

    fn relative_path(&self) -> PathBuf {
        let hex = self.0.to_hex();
        PathBuf::from("sha256").join(&hex[..2]).join(hex)
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hex = self.0.to_hex();
        write!(f, "{KEY_PREFIX}{}/{hex}", &hex[..2])
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from the content store.
#[derive(Error, Debug)]
pub enum CasError {
    /// No object stored under the key.
    #[error("content not found: {0}")]
    NotFound(String),

    /// Stored bytes no longer hash to their key.
    #[error("content at {key} is corrupted: digest {actual}")]
    Corrupted {
        /// The key that was read.
        key: String,
        /// Digest of the bytes actually found.
        actual: String,
    },

    /// Key string is malformed.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// Filesystem failure.
    #[error("content store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CasError {
    /// Whether retrying the same operation might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

// ---------------------------------------------------------------------------
// ContentStore trait
// ---------------------------------------------------------------------------

/// Byte storage keyed by content digest.
#[async_trait]
pub trait ContentStore: Send + Sync + 'static {
    /// Store bytes, returning their key. Idempotent.
    async fn put(&self, bytes: &[u8]) -> Result<StorageKey, CasError>;

    /// Fetch and verify bytes.
    async fn get(&self, key: &StorageKey) -> Result<Vec<u8>, CasError>;

    async fn contains(&self, key: &StorageKey) -> Result<bool, CasError>;
}

fn verify_bytes(key: &StorageKey, bytes: &[u8]) -> Result<(), CasError> {
    let actual = ContentDigest::of_bytes(bytes);
    if bool::from(actual.as_bytes().ct_eq(key.digest().as_bytes())) {
        Ok(())
    } else {
        Err(CasError::Corrupted {
            key: key.to_string(),
            actual: actual.to_hex(),
        })
    }
}

// ---------------------------------------------------------------------------
// Filesystem backend
// ---------------------------------------------------------------------------

/// Filesystem-backed content store.
#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    /// The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn put(&self, bytes: &[u8]) -> Result<StorageKey, CasError> {
        let key = StorageKey::for_bytes(bytes);
        let path = self.root.join(key.relative_path());
        if tokio::fs::try_exists(&path).await? {
            return Ok(key);
        }
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        // Write to a unique temp name then rename, so readers never observe
        // a partially written object.
        let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        tracing::debug!(key = %key, size = bytes.len(), "stored content object");
        Ok(key)
    }

    async fn get(&self, key: &StorageKey) -> Result<Vec<u8>, CasError> {
        let path = self.root.join(key.relative_path());
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CasError::NotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        verify_bytes(key, &bytes)?;
        Ok(bytes)
    }

    async fn contains(&self, key: &StorageKey) -> Result<bool, CasError> {
        Ok(tokio::fs::try_exists(self.root.join(key.relative_path())).await?)
    }
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// In-memory content store.
///
/// The lock is never held across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct MemoryContentStore {
    objects: Arc<RwLock<HashMap<StorageKey, Vec<u8>>>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, bytes: &[u8]) -> Result<StorageKey, CasError> {
        let key = StorageKey::for_bytes(bytes);
        self.objects
            .write()
            .entry(key)
            .or_insert_with(|| bytes.to_vec());
        Ok(key)
    }

    async fn get(&self, key: &StorageKey) -> Result<Vec<u8>, CasError> {
        let bytes = self
            .objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| CasError::NotFound(key.to_string()))?;
        verify_bytes(key, &bytes)?;
        Ok(bytes)
    }

    async fn contains(&self, key: &StorageKey) -> Result<bool, CasError> {
        Ok(self.objects.read().contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_string_roundtrip() {
        let key = StorageKey::for_bytes(b"hello");
        let s = key.to_string();
        assert!(s.starts_with("sha256/2c/2cf24dba"));
        assert_eq!(StorageKey::parse(&s).unwrap(), key);
    }

    #[test]
    fn key_parse_rejects_mismatched_shard() {
        let key = StorageKey::for_bytes(b"hello");
        let hex = key.digest().to_hex();
        assert!(StorageKey::parse(&format!("sha256/ff/{hex}")).is_err());
        assert!(StorageKey::parse(&hex).is_err());
    }

    #[tokio::test]
    async fn fs_store_put_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::new(dir.path());
        let key = store.put(b"# Skill\n").await.unwrap();
        assert!(store.contains(&key).await.unwrap());
        assert_eq!(store.get(&key).await.unwrap(), b"# Skill\n");
    }

    #[tokio::test]
    async fn fs_store_put_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::new(dir.path());
        let a = store.put(b"same").await.unwrap();
        let b = store.put(b"same").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn fs_store_detects_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::new(dir.path());
        let key = store.put(b"original").await.unwrap();
        std::fs::write(dir.path().join(key.relative_path()), b"tampered").unwrap();
        assert!(matches!(
            store.get(&key).await,
            Err(CasError::Corrupted { .. })
        ));
    }

    #[tokio::test]
    async fn fs_store_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::new(dir.path());
        let key = StorageKey::for_bytes(b"never stored");
        assert!(matches!(store.get(&key).await, Err(CasError::NotFound(_))));
        assert!(!store.contains(&key).await.unwrap());
    }

    #[tokio::test]
    async fn memory_store_put_get() {
        let store = MemoryContentStore::new();
        let key = store.put(b"bytes").await.unwrap();
        store.put(b"bytes").await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&key).await.unwrap(), b"bytes");
    }
}
