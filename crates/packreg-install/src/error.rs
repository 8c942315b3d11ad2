//! Installer and registry client error types.

use std::path::PathBuf;

use packreg_core::{CryptoError, PackSlug, Tier};
use packreg_license::LicenseMismatch;
use thiserror::Error;

use crate::installer::InstallStep;

/// Errors from registry HTTP calls.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },

    /// The registry refused a download on tier grounds.
    #[error("tier {current} is insufficient; {required} required (upgrade at {upgrade_url})")]
    TierInsufficient {
        current: Tier,
        required: Tier,
        upgrade_url: String,
    },

    /// The registry answered `404`.
    #[error("{endpoint}: {message}")]
    NotFound { endpoint: String, message: String },

    /// Any other non-2xx status.
    #[error("registry {endpoint} returned {status} {code}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        code: String,
        message: String,
    },

    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },

    /// Client could not be built from its configuration.
    #[error("client configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Whether the registry or network may recover on its own.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { source, .. } => source.is_timeout() || source.is_connect(),
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Errors from install, update, uninstall and verify.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    Client(ClientError),

    /// The caller's tier ranks below the pack's requirement.
    #[error("tier {current} is insufficient for this pack; {required} required. Upgrade at {upgrade_url}")]
    TierInsufficient {
        current: Tier,
        required: Tier,
        upgrade_url: String,
    },

    #[error("pack '{0}' not found")]
    PackNotFound(PackSlug),

    #[error("pack '{slug}' has no version '{version}'")]
    VersionNotFound { slug: PackSlug, version: String },

    #[error("invalid version '{0}'")]
    InvalidVersion(String),

    /// Install never overwrites; use update or uninstall.
    #[error("pack '{slug}' is already installed at {}; run update or uninstall", path.display())]
    AlreadyInstalled { slug: PackSlug, path: PathBuf },

    #[error("pack '{0}' is not installed")]
    NotInstalled(PackSlug),

    /// An artifact target already exists and is not owned by this pack.
    #[error("{} already exists; refusing to overwrite", path.display())]
    Collision { path: PathBuf },

    /// Delivered bytes do not hash to the advertised content hash.
    #[error("downloaded content for {path} does not match its hash (expected {expected}, got {actual})")]
    HashMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("downloaded content for {path} is not valid base64: {source}")]
    Decode {
        path: String,
        source: base64::DecodeError,
    },

    /// Signature, expiry or format failure.
    #[error("license rejected: {reason}")]
    LicenseInvalid { reason: String },

    #[error(transparent)]
    LicenseMismatch(#[from] LicenseMismatch),

    /// No registry key is configured or pinned for offline verification.
    #[error("no registry key pinned in {}; install a pack or set PACKREG_PUBLIC_KEY", path.display())]
    NoPinnedKey { path: PathBuf },

    #[error("registry key is invalid: {0}")]
    RegistryKey(#[from] CryptoError),

    /// Installed artifacts were edited locally.
    #[error("{} installed file(s) were modified locally: {}; rerun with --force to overwrite", paths.len(), display_paths(paths))]
    Modified { paths: Vec<PathBuf> },

    #[error("cancelled before {step}")]
    Cancelled { step: InstallStep },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed record {}: {source}", path.display())]
    Record {
        path: PathBuf,
        source: serde_json::Error,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<ClientError> for InstallError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::TierInsufficient {
                current,
                required,
                upgrade_url,
            } => Self::TierInsufficient {
                current,
                required,
                upgrade_url,
            },
            other => Self::Client(other),
        }
    }
}

impl InstallError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
