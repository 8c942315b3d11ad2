//! # License API
//!
//! Publishes the license signing key and offers server-side verification.
//! Clients normally verify offline with the published key; the verify
//! endpoint exists for tooling that cannot.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use packreg_core::wire::{LicenseKeyInfo, VerifyLicenseRequest, VerifyLicenseResponse};
use packreg_core::{PackSlug, SemVer};
use packreg_license::Verification;

use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

/// Reason reported when a valid license names another pack or version.
pub const LICENSE_MISMATCH: &str = "license_mismatch";

impl Validate for VerifyLicenseRequest {
    fn validate(&self) -> Result<(), String> {
        if self.token.trim().is_empty() {
            return Err("token must not be empty".to_string());
        }
        if self.pack.is_some() != self.version.is_some() {
            return Err("pack and version must be given together".to_string());
        }
        Ok(())
    }
}

/// Unauthenticated: the key is public by definition.
pub fn key_router() -> Router<AppState> {
    Router::new().route("/v1/license/key", get(license_key))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/license/verify", post(verify_license))
}

/// GET /v1/license/key — The Ed25519 key that verifies issued licenses.
async fn license_key(State(state): State<AppState>) -> Json<LicenseKeyInfo> {
    Json(LicenseKeyInfo {
        algorithm: "ed25519".to_string(),
        key_id: state.issuer.key_id(),
        public_key: state.issuer.public_key().to_hex(),
    })
}

/// POST /v1/license/verify — Structured `{valid, reason?, claims?}`.
///
/// An invalid license is a `200` with `valid: false`; only a malformed
/// request is an error.
async fn verify_license(
    State(state): State<AppState>,
    body: Result<Json<VerifyLicenseRequest>, JsonRejection>,
) -> Result<Json<VerifyLicenseResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let resource = match (&req.pack, &req.version) {
        (Some(pack), Some(version)) => Some((PackSlug::parse(pack)?, SemVer::parse(version)?)),
        _ => None,
    };

    let response = match state.verifier.verify(&req.token) {
        Verification::Invalid(reason) => VerifyLicenseResponse {
            valid: false,
            reason: Some(reason.as_str().to_string()),
            claims: None,
        },
        Verification::Valid(claims) => {
            let mismatch = resource
                .as_ref()
                .and_then(|(pack, version)| claims.check_resource(pack, version).err());
            let claims_json = serde_json::to_value(&claims)
                .map_err(|e| AppError::Internal(e.to_string()))?;
            match mismatch {
                Some(m) => {
                    tracing::debug!(error = %m, "license presented for another resource");
                    VerifyLicenseResponse {
                        valid: false,
                        reason: Some(LICENSE_MISMATCH.to_string()),
                        claims: Some(claims_json),
                    }
                }
                None => VerifyLicenseResponse {
                    valid: true,
                    reason: None,
                    claims: Some(claims_json),
                },
            }
        }
    };
    Ok(Json(response))
}
