//! # Authentication Middleware
//!
//! Bearer token middleware that resolves the caller's subject and
//! subscription tier. Health probes, metrics and the license key endpoint
//! are unauthenticated.
//!
//! ## Token Format
//!
//! ```text
//! Bearer {tier}:{subject}:{secret}
//! ```
//!
//! `secret` must equal the configured shared secret (constant-time
//! comparison). Account and billing systems sit outside this service; the
//! token is the only source of tier information.
//!
//! ## CallerIdentity
//!
//! Every authenticated request gets a [`CallerIdentity`] in its
//! extensions. Handlers take it as an extractor argument.

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use packreg_core::wire::{ErrorBody, ErrorDetail};
use packreg_core::Tier;
use subtle::ConstantTimeEq;

use crate::error::AppError;

/// Subject used when authentication is disabled.
pub const DEV_SUBJECT: &str = "dev";

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub subject: String,
    pub tier: Tier,
}

impl CallerIdentity {
    /// Identity injected when no secret is configured.
    pub fn dev() -> Self {
        Self {
            subject: DEV_SUBJECT.to_string(),
            tier: Tier::Enterprise,
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

/// Only the pack's owner may publish to it or change its status.
pub fn require_owner(caller: &CallerIdentity, owner: &str) -> Result<(), AppError> {
    if caller.subject == owner {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "only the pack owner may perform this operation (caller '{}')",
            caller.subject
        )))
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Auth configuration injected into request extensions.
///
/// Custom `Debug` redacts the secret.
#[derive(Clone)]
pub struct AuthConfig {
    pub secret: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

/// Constant-time comparison of bearer secrets.
///
/// When lengths differ, performs a dummy comparison so timing does not
/// depend on where the mismatch is.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse `{tier}:{subject}:{secret}`.
pub fn parse_bearer_token(provided: &str, expected_secret: &str) -> Result<CallerIdentity, String> {
    let parts: Vec<&str> = provided.splitn(3, ':').collect();
    let [tier, subject, secret] = parts.as_slice() else {
        return Err("invalid token format, expected {tier}:{subject}:{secret}".into());
    };
    if !constant_time_token_eq(secret, expected_secret) {
        return Err("invalid bearer token".into());
    }
    let tier: Tier = tier.parse().map_err(|e| format!("{e}"))?;
    if subject.is_empty() {
        return Err("bearer token subject must not be empty".into());
    }
    Ok(CallerIdentity {
        subject: subject.to_string(),
        tier,
    })
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Validate the bearer token and inject [`CallerIdentity`].
///
/// With no secret configured every request runs as [`CallerIdentity::dev`].
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let secret = request
        .extensions()
        .get::<AuthConfig>()
        .and_then(|c| c.secret.clone());

    let Some(expected) = secret else {
        request.extensions_mut().insert(CallerIdentity::dev());
        return next.run(request).await;
    };

    if request.headers().get(axum::http::header::AUTHORIZATION).is_none() {
        tracing::warn!("authentication failed: missing authorization header");
        return unauthorized_response("missing authorization header");
    }
    let Some(Authorization(bearer)) = request.headers().typed_get::<Authorization<Bearer>>()
    else {
        tracing::warn!("authentication failed: non-Bearer authorization scheme");
        return unauthorized_response("authorization header must use Bearer scheme");
    };

    match parse_bearer_token(bearer.token(), &expected) {
        Ok(identity) => {
            tracing::debug!(subject = %identity.subject, tier = %identity.tier, "authenticated");
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(msg) => {
            tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
            unauthorized_response(&msg)
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
