//! # License Claims and Grants
//!
//! [`LicenseGrant`] is the only input the issuer accepts. Its constructor
//! runs the tier check, so a license for a tier the subject does not hold
//! cannot be requested, let alone signed.

use packreg_core::{can_access, PackSlug, SemVer, Tier, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::{LicenseError, LicenseMismatch};

// ─── Claims ──────────────────────────────────────────────────────────

/// The signed assertion carried by a license token.
///
/// Times are Unix epoch seconds so the canonical encoding is integer-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseClaims {
    pub license_id: String,
    pub subject: String,
    pub pack: PackSlug,
    pub version: SemVer,
    pub tier: Tier,
    pub watermark: String,
    pub issued_at: i64,
    pub expires_at: i64,
    /// Id of the public key that verifies this license.
    pub key_id: String,
}

impl LicenseClaims {
    pub fn issued_at(&self) -> Option<Timestamp> {
        Timestamp::from_epoch_secs(self.issued_at).ok()
    }

    pub fn expires_at(&self) -> Option<Timestamp> {
        Timestamp::from_epoch_secs(self.expires_at).ok()
    }

    /// Valid strictly before `expires_at`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now.epoch_secs() >= self.expires_at
    }

    /// Check that this license covers the requested pack version.
    ///
    /// A mismatch is a caller-side condition, distinct from a signature or
    /// expiry failure.
    pub fn check_resource(&self, pack: &PackSlug, version: &SemVer) -> Result<(), LicenseMismatch> {
        if &self.pack == pack && &self.version == version {
            Ok(())
        } else {
            Err(LicenseMismatch {
                licensed_pack: self.pack.to_string(),
                licensed_version: self.version.to_string(),
                requested_pack: pack.to_string(),
                requested_version: version.to_string(),
            })
        }
    }
}

// ─── Grant ───────────────────────────────────────────────────────────

/// An authorized request to mint a license.
#[derive(Debug, Clone)]
pub struct LicenseGrant {
    pub(crate) subject: String,
    pub(crate) pack: PackSlug,
    pub(crate) version: SemVer,
    pub(crate) tier: Tier,
    pub(crate) watermark_seed: String,
}

impl LicenseGrant {
    /// Authorize `subject` at `subject_tier` for content requiring
    /// `required_tier`.
    ///
    /// # Errors
    ///
    /// `TierInsufficient` when `subject_tier` ranks below `required_tier`.
    pub fn authorize(
        subject: &str,
        subject_tier: Tier,
        required_tier: Tier,
        pack: &PackSlug,
        version: &SemVer,
        watermark_seed: &str,
    ) -> Result<Self, LicenseError> {
        if !can_access(subject_tier, required_tier) {
            return Err(LicenseError::TierInsufficient {
                current: subject_tier,
                required: required_tier,
            });
        }
        Ok(Self {
            subject: subject.to_string(),
            pack: pack.clone(),
            version: version.clone(),
            tier: subject_tier,
            watermark_seed: watermark_seed.to_string(),
        })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn pack(&self) -> &PackSlug {
        &self.pack
    }

    pub fn version(&self) -> &SemVer {
        &self.version
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }
}
