//! # Version Publisher
//!
//! Validates a publish request, writes file bytes to the content store and
//! runs the store's locked publish transaction, retrying transient failures
//! with exponential backoff.
//!
//! Bytes land in the content store before the transaction starts. Keys are
//! content-addressed, so a publish that later conflicts or times out leaves
//! only unreferenced blobs and can never overwrite bytes another version
//! points at.

use std::collections::HashSet;
use std::sync::Arc;

use packreg_core::{sha256_hex, LogicalPath, PackId, PackStatus, SemVer};
use packreg_crypto::ContentStore;
use serde_json::Value;

use crate::error::{PublishError, StoreError};
use crate::model::{NewFile, NewVersion, Pack, PublishOutcome};
use crate::retry::RetryPolicy;
use crate::store::PackStore;

/// One authored file in a publish request.
#[derive(Debug, Clone)]
pub struct PublishFile {
    pub path: String,
    pub content: Vec<u8>,
    /// Guessed from the extension when absent.
    pub mime_type: Option<String>,
}

/// Publishes versions into a [`PackStore`].
#[derive(Clone)]
pub struct VersionPublisher {
    store: Arc<dyn PackStore>,
    content: Arc<dyn ContentStore>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for VersionPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionPublisher")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl VersionPublisher {
    pub fn new(store: Arc<dyn PackStore>, content: Arc<dyn ContentStore>) -> Self {
        Self {
            store,
            content,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &Arc<dyn PackStore> {
        &self.store
    }

    /// Publish `version` of `pack_id`.
    ///
    /// # Errors
    ///
    /// - `InvalidVersion`, `InvalidManifest`, `InvalidPath`, `DuplicatePath`
    ///   before anything is written.
    /// - `Store(VersionConflict)` when the version exists; never retried.
    /// - `Store(PackNotFound)`, `Store(PackNotPublishable)`.
    /// - `Store(LockTimeout)` or `Content(Io)` after retries are exhausted.
    #[tracing::instrument(skip(self, manifest, files), fields(file_count = files.len()))]
    pub async fn publish_version(
        &self,
        pack_id: PackId,
        version: &str,
        manifest: Value,
        files: Vec<PublishFile>,
    ) -> Result<PublishOutcome, PublishError> {
        let version = SemVer::parse(version).map_err(PublishError::InvalidVersion)?;
        if !manifest.is_object() {
            return Err(PublishError::InvalidManifest(
                "manifest must be a JSON object".into(),
            ));
        }

        let mut seen = HashSet::with_capacity(files.len());
        let mut validated = Vec::with_capacity(files.len());
        for f in files {
            let path = LogicalPath::parse(&f.path).map_err(PublishError::InvalidPath)?;
            if !seen.insert(path.clone()) {
                return Err(PublishError::DuplicatePath(path.to_string()));
            }
            validated.push((path, f));
        }

        let mut new_files = Vec::with_capacity(validated.len());
        for (path, f) in validated {
            let content = &self.content;
            let bytes = f.content.as_slice();
            let storage_key = self
                .retry
                .run("content_put", PublishError::is_transient, move || async move {
                    content.put(bytes).await.map_err(PublishError::from)
                })
                .await?;
            let mime_type = f
                .mime_type
                .unwrap_or_else(|| path.guess_mime_type().to_string());
            new_files.push(NewFile {
                content_hash: sha256_hex(&f.content),
                storage_key,
                size: f.content.len() as u64,
                mime_type,
                path,
            });
        }

        let new = NewVersion {
            pack_id,
            version,
            manifest,
            files: new_files,
        };
        let outcome = self
            .retry
            .run("publish_version", StoreError::is_transient, move || {
                self.store.publish_version(new.clone())
            })
            .await?;

        tracing::info!(
            pack_id = %pack_id,
            version = %outcome.version.version,
            promoted = outcome.promoted,
            "version published"
        );
        Ok(outcome)
    }

    /// Apply a lifecycle transition.
    pub async fn transition_status(
        &self,
        pack_id: PackId,
        target: PackStatus,
    ) -> Result<Pack, StoreError> {
        let pack = self.store.transition_status(pack_id, target).await?;
        tracing::info!(pack_id = %pack_id, status = %pack.status, "pack status changed");
        Ok(pack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryPackStore;
    use crate::model::NewPack;
    use packreg_core::{PackSlug, Tier};
    use packreg_crypto::{MemoryContentStore, StorageKey};

    async fn setup() -> (VersionPublisher, MemoryContentStore, PackId) {
        let store = Arc::new(MemoryPackStore::new());
        let content = MemoryContentStore::new();
        let pack = store
            .create_pack(NewPack {
                slug: PackSlug::parse("demo").unwrap(),
                name: "Demo".into(),
                owner: "alice".into(),
                tier_required: Tier::Free,
            })
            .await
            .unwrap();
        let publisher = VersionPublisher::new(store, Arc::new(content.clone()));
        (publisher, content, pack.id)
    }

    fn file(path: &str, bytes: &[u8]) -> PublishFile {
        PublishFile {
            path: path.into(),
            content: bytes.to_vec(),
            mime_type: None,
        }
    }

    #[tokio::test]
    async fn publish_stores_bytes_and_hashes_authored_content() {
        let (publisher, content, pack_id) = setup().await;
        let outcome = publisher
            .publish_version(
                pack_id,
                "1.0.0",
                serde_json::json!({"name": "demo"}),
                vec![file("skills/demo/SKILL.md", b"# Demo\n")],
            )
            .await
            .unwrap();

        assert!(outcome.promoted);
        let f = &outcome.files[0];
        assert_eq!(f.content_hash, sha256_hex(b"# Demo\n"));
        assert_eq!(f.storage_key, StorageKey::for_bytes(b"# Demo\n"));
        assert_eq!(f.mime_type, "text/markdown");
        assert_eq!(f.size, 7);
        assert_eq!(content.get(&f.storage_key).await.unwrap(), b"# Demo\n");
    }

    #[tokio::test]
    async fn version_is_normalized() {
        let (publisher, _, pack_id) = setup().await;
        let outcome = publisher
            .publish_version(pack_id, " 1.2.3 ", serde_json::json!({}), vec![])
            .await
            .unwrap();
        assert_eq!(outcome.version.version.to_string(), "1.2.3");
    }

    #[tokio::test]
    async fn rejects_bad_input_before_writing() {
        let (publisher, content, pack_id) = setup().await;

        let err = publisher
            .publish_version(pack_id, "one", serde_json::json!({}), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::InvalidVersion(_)));

        let err = publisher
            .publish_version(pack_id, "1.0.0", serde_json::json!([1]), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::InvalidManifest(_)));

        let err = publisher
            .publish_version(
                pack_id,
                "1.0.0",
                serde_json::json!({}),
                vec![file("ok.md", b"a"), file("../escape.md", b"b")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::InvalidPath(_)));

        let err = publisher
            .publish_version(
                pack_id,
                "1.0.0",
                serde_json::json!({}),
                vec![file("a.md", b"a"), file("a.md", b"b")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::DuplicatePath(_)));

        assert!(content.is_empty());
    }

    #[tokio::test]
    async fn conflict_is_surfaced_without_retry() {
        let (publisher, _, pack_id) = setup().await;
        publisher
            .publish_version(pack_id, "1.0.0", serde_json::json!({}), vec![])
            .await
            .unwrap();
        let err = publisher
            .publish_version(pack_id, "1.0.0", serde_json::json!({}), vec![])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PublishError::Store(StoreError::VersionConflict { .. })
        ));
        assert!(!err.is_transient());
    }
}
