//! # License Tokens
//!
//! ## Format
//!
//! ```text
//! base64url(canonical claims JSON) "." base64url(Ed25519 signature)
//! ```
//!
//! Both parts use the URL-safe alphabet without padding. The signature
//! covers the payload bytes exactly as transmitted, and those bytes must be
//! in canonical (JCS) form.
//!
//! ## Verification order
//!
//! 1. Split and decode. Failure is `Malformed`.
//! 2. Look up the key named by `key_id`. Unknown keys are `InvalidSignature`.
//! 3. Verify the signature. Failure is `InvalidSignature`.
//! 4. Check `now < expires_at`. Failure is `Expired`.
//!
//! Claims are never trusted before step 3 succeeds. No step needs the
//! registry, so installed clients verify offline.

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use packreg_core::{CanonicalBytes, Timestamp};
use packreg_crypto::{verify_with_public_key, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
use serde::Deserialize;

use crate::claims::{LicenseClaims, LicenseGrant};
use crate::clock::{Clock, SystemClock};
use crate::error::LicenseError;
use crate::watermark::derive_watermark;

/// Default validity window: 30 days.
pub const DEFAULT_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// A freshly minted license.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedLicense {
    pub token: String,
    pub expires_at: Timestamp,
    pub watermark: String,
    pub claims: LicenseClaims,
}

// ─── Issuer ──────────────────────────────────────────────────────────

/// Mints signed license tokens with an injected key.
pub struct LicenseIssuer {
    key: Ed25519KeyPair,
    ttl_secs: i64,
    clock: Arc<dyn Clock>,
}

impl LicenseIssuer {
    pub fn new(key: Ed25519KeyPair) -> Self {
        Self {
            key,
            ttl_secs: DEFAULT_TTL_SECS,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_ttl_secs(mut self, ttl_secs: i64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        self.key.public_key()
    }

    pub fn key_id(&self) -> String {
        self.key.public_key().key_id()
    }

    /// A verifier that trusts this issuer's key and shares its clock.
    pub fn verifier(&self) -> LicenseVerifier {
        LicenseVerifier::new(self.public_key()).with_clock(self.clock.clone())
    }

    /// Mint a license valid for the configured TTL.
    pub fn issue(&self, grant: &LicenseGrant) -> Result<IssuedLicense, LicenseError> {
        let expires_at = self.clock.now().plus_secs(self.ttl_secs);
        self.issue_until(grant, expires_at)
    }

    /// Mint a license with an explicit expiry.
    pub fn issue_until(
        &self,
        grant: &LicenseGrant,
        expires_at: Timestamp,
    ) -> Result<IssuedLicense, LicenseError> {
        let watermark = derive_watermark(
            &grant.watermark_seed,
            &grant.subject,
            grant.pack.as_str(),
        )?;
        let claims = LicenseClaims {
            license_id: uuid::Uuid::new_v4().to_string(),
            subject: grant.subject.clone(),
            pack: grant.pack.clone(),
            version: grant.version.clone(),
            tier: grant.tier,
            watermark: watermark.clone(),
            issued_at: self.clock.now().epoch_secs(),
            expires_at: expires_at.epoch_secs(),
            key_id: self.key_id(),
        };
        let payload = CanonicalBytes::new(&claims)?;
        let signature = self.key.sign(&payload);
        let token = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload.as_bytes()),
            URL_SAFE_NO_PAD.encode(signature.as_bytes())
        );
        tracing::debug!(
            license_id = %claims.license_id,
            pack = %claims.pack,
            version = %claims.version,
            tier = %claims.tier,
            "issued license"
        );
        Ok(IssuedLicense {
            token,
            expires_at,
            watermark,
            claims,
        })
    }
}

impl std::fmt::Debug for LicenseIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseIssuer")
            .field("key_id", &self.key_id())
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

// ─── Verification result ─────────────────────────────────────────────

/// Why a token failed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    /// Signature was valid but `now >= expires_at`.
    Expired { expired_at: i64 },
    /// Signature did not verify, or the key is unknown.
    InvalidSignature,
    /// Token could not be decoded.
    Malformed(String),
}

impl InvalidReason {
    /// Stable reason string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expired { .. } => "expired",
            Self::InvalidSignature => "invalid_signature",
            Self::Malformed(_) => "malformed",
        }
    }
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured outcome of [`LicenseVerifier::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Valid(LicenseClaims),
    Invalid(InvalidReason),
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn claims(&self) -> Option<&LicenseClaims> {
        match self {
            Self::Valid(c) => Some(c),
            Self::Invalid(_) => None,
        }
    }

    pub fn reason(&self) -> Option<&InvalidReason> {
        match self {
            Self::Valid(_) => None,
            Self::Invalid(r) => Some(r),
        }
    }
}

// ─── Verifier ────────────────────────────────────────────────────────

/// Only `key_id` is read before the signature is checked.
#[derive(Deserialize)]
struct KeyIdProbe {
    key_id: String,
}

/// Verifies license tokens against one or more trusted public keys.
#[derive(Clone)]
pub struct LicenseVerifier {
    keys: HashMap<String, Ed25519PublicKey>,
    clock: Arc<dyn Clock>,
}

impl LicenseVerifier {
    pub fn new(key: Ed25519PublicKey) -> Self {
        Self::with_keys([key])
    }

    /// Trust several keys, e.g. the current and previous key during rotation.
    pub fn with_keys(keys: impl IntoIterator<Item = Ed25519PublicKey>) -> Self {
        Self {
            keys: keys.into_iter().map(|k| (k.key_id(), k)).collect(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn add_key(&mut self, key: Ed25519PublicKey) {
        self.keys.insert(key.key_id(), key);
    }

    pub fn verify(&self, token: &str) -> Verification {
        self.verify_at(token, self.clock.now())
    }

    /// Verify as of an explicit instant.
    pub fn verify_at(&self, token: &str, now: Timestamp) -> Verification {
        let malformed = |msg: &str| Verification::Invalid(InvalidReason::Malformed(msg.into()));

        let Some((payload_b64, sig_b64)) = token.trim().split_once('.') else {
            return malformed("token must have two dot-separated parts");
        };
        if sig_b64.contains('.') {
            return malformed("token must have two dot-separated parts");
        }
        let Ok(payload) = URL_SAFE_NO_PAD.decode(payload_b64) else {
            return malformed("payload is not base64url");
        };
        let Ok(sig_bytes) = URL_SAFE_NO_PAD.decode(sig_b64) else {
            return malformed("signature is not base64url");
        };
        let Ok(probe) = serde_json::from_slice::<KeyIdProbe>(&payload) else {
            return malformed("payload does not name a key");
        };
        let Some(key) = self.keys.get(&probe.key_id) else {
            return Verification::Invalid(InvalidReason::InvalidSignature);
        };
        let Ok(signature) = Ed25519Signature::from_slice(&sig_bytes) else {
            return Verification::Invalid(InvalidReason::InvalidSignature);
        };
        let Ok(canonical) = CanonicalBytes::from_canonical_slice(&payload) else {
            return Verification::Invalid(InvalidReason::InvalidSignature);
        };
        if verify_with_public_key(&canonical, &signature, key).is_err() {
            return Verification::Invalid(InvalidReason::InvalidSignature);
        }
        let claims: LicenseClaims = match serde_json::from_slice(&payload) {
            Ok(c) => c,
            Err(_) => return malformed("signed payload is not a license"),
        };
        if claims.is_expired_at(now) {
            return Verification::Invalid(InvalidReason::Expired {
                expired_at: claims.expires_at,
            });
        }
        Verification::Valid(claims)
    }
}

impl std::fmt::Debug for LicenseVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&String> = self.keys.keys().collect();
        ids.sort();
        f.debug_struct("LicenseVerifier").field("key_ids", &ids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use packreg_core::{PackSlug, SemVer, Tier};

    fn grant() -> LicenseGrant {
        LicenseGrant::authorize(
            "alice",
            Tier::Pro,
            Tier::Pro,
            &PackSlug::parse("demo").unwrap(),
            &SemVer::new(1, 0, 0),
            "seed",
        )
        .unwrap()
    }

    fn fixed_clock() -> Arc<MockClock> {
        Arc::new(MockClock::new(
            Timestamp::parse("2026-05-01T00:00:00Z").unwrap(),
        ))
    }

    #[test]
    fn fresh_token_verifies_with_claims() {
        let issuer = LicenseIssuer::new(Ed25519KeyPair::generate());
        let issued = issuer.issue(&grant()).unwrap();
        match issuer.verifier().verify(&issued.token) {
            Verification::Valid(claims) => {
                assert_eq!(claims.subject, "alice");
                assert_eq!(claims.pack.as_str(), "demo");
                assert_eq!(claims.version.to_string(), "1.0.0");
                assert_eq!(claims.tier, Tier::Pro);
                assert_eq!(claims.watermark, issued.watermark);
                assert_eq!(claims, issued.claims);
            }
            other => panic!("expected valid, got {other:?}"),
        }
    }

    #[test]
    fn token_expiring_one_hour_ahead_verifies() {
        let clock = fixed_clock();
        let issuer = LicenseIssuer::new(Ed25519KeyPair::generate()).with_clock(clock.clone());
        let issued = issuer
            .issue_until(&grant(), clock.now().plus_secs(3600))
            .unwrap();
        assert!(issuer.verifier().verify(&issued.token).is_valid());
    }

    #[test]
    fn token_expired_one_second_ago_is_expired() {
        let clock = fixed_clock();
        let issuer = LicenseIssuer::new(Ed25519KeyPair::generate()).with_clock(clock.clone());
        let issued = issuer
            .issue_until(&grant(), clock.now().plus_secs(-1))
            .unwrap();
        let result = issuer.verifier().verify(&issued.token);
        assert_eq!(result.reason().map(|r| r.as_str()), Some("expired"));
    }

    #[test]
    fn default_ttl_applies() {
        let clock = fixed_clock();
        let issuer = LicenseIssuer::new(Ed25519KeyPair::generate()).with_clock(clock.clone());
        let issued = issuer.issue(&grant()).unwrap();
        assert_eq!(
            issued.expires_at.epoch_secs() - clock.now().epoch_secs(),
            DEFAULT_TTL_SECS
        );
        clock.advance_secs(DEFAULT_TTL_SECS);
        assert!(!issuer.verifier().verify(&issued.token).is_valid());
    }

    #[test]
    fn foreign_key_is_invalid_signature() {
        let issuer = LicenseIssuer::new(Ed25519KeyPair::generate());
        let other = LicenseVerifier::new(Ed25519KeyPair::generate().public_key());
        let issued = issuer.issue(&grant()).unwrap();
        assert_eq!(
            other.verify(&issued.token).reason(),
            Some(&InvalidReason::InvalidSignature)
        );
    }

    #[test]
    fn tampered_payload_is_invalid_signature() {
        let issuer = LicenseIssuer::new(Ed25519KeyPair::generate());
        let issued = issuer.issue(&grant()).unwrap();
        let (payload, sig) = issued.token.split_once('.').unwrap();
        let json = URL_SAFE_NO_PAD.decode(payload).unwrap();
        let forged = String::from_utf8(json)
            .unwrap()
            .replace("\"tier\":\"pro\"", "\"tier\":\"enterprise\"");
        let token = format!("{}.{sig}", URL_SAFE_NO_PAD.encode(forged));
        assert_eq!(
            issuer.verifier().verify(&token).reason(),
            Some(&InvalidReason::InvalidSignature)
        );
    }

    #[test]
    fn expired_and_forged_reports_signature_first() {
        let clock = fixed_clock();
        let issuer = LicenseIssuer::new(Ed25519KeyPair::generate()).with_clock(clock.clone());
        let issued = issuer
            .issue_until(&grant(), clock.now().plus_secs(-10))
            .unwrap();
        let (payload, _) = issued.token.split_once('.').unwrap();
        let token = format!("{payload}.{}", URL_SAFE_NO_PAD.encode([0u8; 64]));
        assert_eq!(
            issuer.verifier().verify(&token).reason(),
            Some(&InvalidReason::InvalidSignature)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let verifier = LicenseVerifier::new(Ed25519KeyPair::generate().public_key());
        for token in ["", "abc", "a.b.c", "!!!.???", "e30.AAAA"] {
            let reason = verifier.verify(token).reason().cloned();
            assert!(
                matches!(reason, Some(InvalidReason::Malformed(_))),
                "{token:?} gave {reason:?}"
            );
        }
    }

    #[test]
    fn rotation_accepts_old_and_new_keys() {
        let old = LicenseIssuer::new(Ed25519KeyPair::generate());
        let new = LicenseIssuer::new(Ed25519KeyPair::generate());
        let verifier = LicenseVerifier::with_keys([old.public_key(), new.public_key()]);
        assert!(verifier.verify(&old.issue(&grant()).unwrap().token).is_valid());
        assert!(verifier.verify(&new.issue(&grant()).unwrap().token).is_valid());
    }

    #[test]
    fn each_issue_has_a_fresh_license_id_but_same_watermark() {
        let issuer = LicenseIssuer::new(Ed25519KeyPair::generate());
        let a = issuer.issue(&grant()).unwrap();
        let b = issuer.issue(&grant()).unwrap();
        assert_ne!(a.claims.license_id, b.claims.license_id);
        assert_eq!(a.watermark, b.watermark);
    }
}
