//! # packreg-license — License Issuer and Verifier
//!
//! Stateless given a key. The issuer mints a compact signed token for every
//! successful download; any holder of the public key can verify it offline
//! until it expires. Licenses are never revoked server-side: short expiry and
//! re-issuance take that role.
//!
//! ```text
//! LicenseGrant::authorize(tier check) ─▶ LicenseIssuer::issue ─▶ token
//!                                                                 │
//!                      LicenseVerifier::verify ◀──────────────────┘
//!                        Valid(claims) | Invalid(expired | invalid_signature | malformed)
//! ```
//!
//! The signing key is injected at construction; there is no global key.

pub mod claims;
pub mod clock;
pub mod error;
pub mod token;
pub mod watermark;

pub use claims::{LicenseClaims, LicenseGrant};
pub use clock::{Clock, MockClock, SystemClock};
pub use error::{LicenseError, LicenseMismatch};
pub use token::{
    InvalidReason, IssuedLicense, LicenseIssuer, LicenseVerifier, Verification, DEFAULT_TTL_SECS,
};
pub use watermark::derive_watermark;
