//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps registry, license and validation errors to HTTP status codes with a
//! JSON body of the form `{"error": {"code", "message", "details?"}}`.
//! Internal error details are logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use packreg_core::wire::{ErrorBody, ErrorDetail, TierInsufficientDetails};
use packreg_core::{Tier, ValidationError};
use packreg_crypto::CasError;
use packreg_registry::{PublishError, StoreError};
use thiserror::Error;

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid bearer token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not permitted (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Subscription tier below the pack's requirement (403).
    #[error("tier {current} is insufficient; {required} required")]
    TierInsufficient {
        current: Tier,
        required: Tier,
        upgrade_url: String,
    },

    /// Conflict with current resource state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The version string already exists for the pack (409).
    #[error("version conflict: {0}")]
    VersionConflict(String),

    /// The pack lock could not be acquired in time (503).
    #[error("lock timeout: {0}")]
    LockTimeout(String),

    /// A dependency is temporarily unavailable (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error (500). Message is logged but not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::TierInsufficient { .. } => (StatusCode::FORBIDDEN, "TIER_INSUFFICIENT"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::VersionConflict(_) => (StatusCode::CONFLICT, "VERSION_CONFLICT"),
            Self::LockTimeout(_) => (StatusCode::SERVICE_UNAVAILABLE, "LOCK_TIMEOUT"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::TierInsufficient {
                current,
                required,
                upgrade_url,
            } => serde_json::to_value(TierInsufficientDetails {
                current_tier: *current,
                required_tier: *required,
                upgrade_url: upgrade_url.clone(),
            })
            .ok(),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::LockTimeout(_) | Self::ServiceUnavailable(_) => {
                tracing::warn!(error = %self, "request failed on a transient condition")
            }
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::PackNotFound(_) => Self::NotFound(err.to_string()),
            StoreError::VersionConflict { .. } => Self::VersionConflict(err.to_string()),
            StoreError::SlugTaken(_)
            | StoreError::PackNotPublishable { .. }
            | StoreError::InvalidTransition { .. } => Self::Conflict(err.to_string()),
            StoreError::LockTimeout(_) => Self::LockTimeout(err.to_string()),
            StoreError::Database(_) if err.is_transient() => {
                Self::ServiceUnavailable("registry database unavailable".into())
            }
            StoreError::Database(_) | StoreError::Corrupt(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<CasError> for AppError {
    fn from(err: CasError) -> Self {
        if err.is_transient() {
            tracing::warn!(error = %err, "content store unavailable");
            Self::ServiceUnavailable("content store unavailable".into())
        } else {
            Self::Internal(err.to_string())
        }
    }
}

impl From<PublishError> for AppError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::InvalidVersion(e) | PublishError::InvalidPath(e) => e.into(),
            PublishError::InvalidManifest(_) | PublishError::DuplicatePath(_) => {
                Self::Validation(err.to_string())
            }
            PublishError::Content(e) => e.into(),
            PublishError::Store(e) => e.into(),
        }
    }
}
