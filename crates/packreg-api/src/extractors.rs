//! # Request Extractors
//!
//! JSON body extraction that maps Axum's rejection into [`AppError`] so
//! malformed bodies get the same error envelope as every other failure.

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Field-level checks run after deserialization.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// Unwrap a JSON body, turning a parse failure into `BadRequest`.
pub fn extract_json<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(v)| v)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

/// [`extract_json`] followed by [`Validate::validate`], which maps to
/// `Validation` (422).
pub fn extract_validated_json<T: Validate>(
    body: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(body)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}
