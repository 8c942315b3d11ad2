//! # Wire Types
//!
//! JSON bodies exchanged between the registry API and the installer. Both
//! sides compile against these definitions, so a field rename breaks the
//! build instead of a production install.
//!
//! File content travels as standard base64 (RFC 4648, padded).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::digest::sha256_hex;
use crate::identity::{PackId, PackSlug, VersionId};
use crate::lifecycle::PackStatus;
use crate::path::LogicalPath;
use crate::temporal::Timestamp;
use crate::tier::Tier;
use crate::version::SemVer;

/// Alias accepted in download URLs in place of a concrete version.
pub const LATEST_ALIAS: &str = "latest";

// ─── Pack Metadata ───────────────────────────────────────────────────

/// `GET /v1/packs/{slug}` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackInfo {
    pub id: PackId,
    pub slug: PackSlug,
    pub name: String,
    pub status: PackStatus,
    pub tier_required: Tier,
    pub latest_version: Option<SemVer>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// `GET /v1/account` response: who the bearer token identifies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub subject: String,
    pub tier: Tier,
}

/// `POST /v1/packs` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePackRequest {
    pub slug: String,
    pub name: String,
    pub tier_required: Tier,
}

/// `POST /v1/packs/{pack_id}/status` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangeRequest {
    pub status: PackStatus,
}

// ─── Publishing ──────────────────────────────────────────────────────

/// One file in a publish request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFile {
    pub path: String,
    /// Base64 of the authored bytes.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl UploadFile {
    pub fn from_bytes(path: &str, bytes: &[u8]) -> Self {
        Self {
            path: path.to_string(),
            content: STANDARD.encode(bytes),
            mime_type: None,
        }
    }

    pub fn decode_content(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.content.as_bytes())
    }
}

/// `POST /v1/packs/{pack_id}/versions` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishVersionRequest {
    pub version: String,
    pub manifest: serde_json::Value,
    #[serde(default)]
    pub files: Vec<UploadFile>,
}

/// File metadata as stored for a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: LogicalPath,
    /// Full SHA-256 hex of the authored bytes.
    pub content_hash: String,
    pub size: u64,
    pub mime_type: String,
}

/// A committed version, as returned by publish and version listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub id: VersionId,
    pub pack_id: PackId,
    pub version: SemVer,
    pub is_latest: bool,
    pub published_at: Timestamp,
    #[serde(default)]
    pub files: Vec<FileInfo>,
}

// ─── Download ────────────────────────────────────────────────────────

/// One delivered file. `content_hash` lets the client check transfer
/// integrity before any marker is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireFile {
    pub path: LogicalPath,
    pub content: String,
    pub mime_type: String,
    pub content_hash: String,
}

impl WireFile {
    pub fn encode(path: LogicalPath, bytes: &[u8], mime_type: &str) -> Self {
        Self {
            path,
            content: STANDARD.encode(bytes),
            mime_type: mime_type.to_string(),
            content_hash: sha256_hex(bytes),
        }
    }

    pub fn decode_content(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.content.as_bytes())
    }
}

/// License minted alongside a download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireLicense {
    pub token: String,
    pub expires_at: Timestamp,
    pub watermark: String,
}

/// `GET /v1/packs/{slug}/versions/{version}/download` response.
///
/// Content and license arrive in one body so a client never holds one
/// without the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadResponse {
    pub pack: PackSlug,
    pub version: SemVer,
    pub manifest: serde_json::Value,
    pub files: Vec<WireFile>,
    pub license: WireLicense,
}

// ─── License Key & Verification ──────────────────────────────────────

/// `GET /v1/license/key` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseKeyInfo {
    pub algorithm: String,
    pub key_id: String,
    /// Hex-encoded Ed25519 public key.
    pub public_key: String,
}

/// `POST /v1/license/verify` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyLicenseRequest {
    pub token: String,
    #[serde(default)]
    pub pack: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// `POST /v1/license/verify` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyLicenseResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<serde_json::Value>,
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Structured JSON error body used by every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable code, e.g. `TIER_INSUFFICIENT`.
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// `details` payload of a `TIER_INSUFFICIENT` error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierInsufficientDetails {
    pub current_tier: Tier,
    pub required_tier: Tier,
    pub upgrade_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_file_carries_full_hash_of_raw_bytes() {
        let path = LogicalPath::parse("skills/a/SKILL.md").unwrap();
        let f = WireFile::encode(path, b"hello", "text/markdown");
        assert_eq!(f.content, "aGVsbG8=");
        assert_eq!(f.content_hash, sha256_hex(b"hello"));
        assert_eq!(f.decode_content().unwrap(), b"hello");
    }

    #[test]
    fn upload_file_rejects_bad_base64() {
        let f = UploadFile {
            path: "a.md".into(),
            content: "***".into(),
            mime_type: None,
        };
        assert!(f.decode_content().is_err());
    }

    #[test]
    fn error_body_omits_empty_details() {
        let body = ErrorBody {
            error: ErrorDetail {
                code: "NOT_FOUND".into(),
                message: "pack not found".into(),
                details: None,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json["error"].get("details").is_none());
    }

    #[test]
    fn download_response_rejects_traversal_paths() {
        let json = serde_json::json!({
            "pack": "demo",
            "version": "1.0.0",
            "manifest": {},
            "files": [{"path": "../x", "content": "", "mime_type": "text/plain", "content_hash": ""}],
            "license": {"token": "t", "expires_at": "2026-01-01T00:00:00Z", "watermark": "wm"}
        });
        assert!(serde_json::from_value::<DownloadResponse>(json).is_err());
    }
}
