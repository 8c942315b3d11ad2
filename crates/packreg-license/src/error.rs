//! License subsystem errors.

use packreg_core::{CanonicalizationError, Tier};
use thiserror::Error;

/// Errors raised while authorizing or minting a license.
#[derive(Error, Debug)]
pub enum LicenseError {
    /// The subject's tier ranks below the pack's required tier.
    #[error("tier {current} is insufficient; {required} required")]
    TierInsufficient {
        /// Tier the subject holds.
        current: Tier,
        /// Tier the pack requires.
        required: Tier,
    },

    /// Claims could not be canonicalized for signing.
    #[error("license claims could not be canonicalized: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

/// A valid license presented for a different pack or version.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "license does not match requested resource: licensed {licensed_pack}@{licensed_version}, \
     requested {requested_pack}@{requested_version}"
)]
pub struct LicenseMismatch {
    pub licensed_pack: String,
    pub licensed_version: String,
    pub requested_pack: String,
    pub requested_version: String,
}
