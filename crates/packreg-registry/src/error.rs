//! Registry error types.

use packreg_core::{PackId, PackSlug, PackStatus, SemVer, ValidationError};
use packreg_crypto::CasError;
use thiserror::Error;

/// Errors raised by a [`PackStore`](crate::store::PackStore).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("pack {0} not found")]
    PackNotFound(PackId),

    /// The version string already exists for this pack. Not retryable.
    #[error("version {version} already exists for pack {pack_id}")]
    VersionConflict { pack_id: PackId, version: SemVer },

    #[error("pack slug {0} is already taken")]
    SlugTaken(PackSlug),

    /// The pack's lifecycle status does not accept new versions.
    #[error("pack {pack_id} is {status} and does not accept new versions")]
    PackNotPublishable { pack_id: PackId, status: PackStatus },

    #[error("pack status cannot change from {from} to {to}")]
    InvalidTransition { from: PackStatus, to: PackStatus },

    /// The per-pack lock could not be acquired in time.
    #[error("timed out waiting for the lock on pack {0}")]
    LockTimeout(PackId),

    /// A persisted row could not be decoded into a domain value.
    #[error("corrupt registry row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// True for failures worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::LockTimeout(_) => true,
            Self::Database(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed
            ),
            _ => false,
        }
    }
}

/// Errors raised by [`VersionPublisher`](crate::publisher::VersionPublisher).
#[derive(Error, Debug)]
pub enum PublishError {
    #[error(transparent)]
    InvalidVersion(ValidationError),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error(transparent)]
    InvalidPath(ValidationError),

    #[error("duplicate file path {0} in publish request")]
    DuplicatePath(String),

    /// Writing file bytes to the content store failed.
    #[error("content store error: {0}")]
    Content(#[from] CasError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PublishError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Content(e) => e.is_transient(),
            Self::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}
