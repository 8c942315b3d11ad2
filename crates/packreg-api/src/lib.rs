//! # packreg-api — Registry HTTP Service
//!
//! Serves pack metadata, accepts version publishes, and hands out content
//! with a freshly minted license once the caller's tier has been checked.
//!
//! ## API Surface
//!
//! | Route                                              | Auth | Module               |
//! |----------------------------------------------------|------|----------------------|
//! | `POST /v1/packs`                                   | yes  | [`routes::packs`]    |
//! | `GET  /v1/packs/{slug}`                            | yes  | [`routes::packs`]    |
//! | `POST /v1/packs/{pack_id}/status`                  | yes  | [`routes::packs`]    |
//! | `GET  /v1/packs/{slug}/versions`                   | yes  | [`routes::versions`] |
//! | `POST /v1/packs/{pack_id}/versions`                | yes  | [`routes::versions`] |
//! | `GET  /v1/packs/{slug}/versions/{version}/download`| yes  | [`routes::versions`] |
//! | `POST /v1/license/verify`                          | yes  | [`routes::license`]  |
//! | `GET  /v1/account`                                 | yes  | [`routes::account`]  |
//! | `GET  /v1/license/key`                             | no   | [`routes::license`]  |
//! | `GET  /health/liveness`, `/health/readiness`       | no   |                      |
//! | `GET  /metrics`                                    | no   | [`metrics`]          |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → AuthMiddleware → Handler
//! ```
//!
//! All errors map to `{"error": {"code", "message", "details?"}}` via
//! [`AppError`].

pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod metrics;
pub mod routes;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;

pub use error::AppError;
pub use state::{ApiConfig, AppState};

/// Publish bodies carry base64 file content.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Assemble the application router.
///
/// Health probes, `/metrics` and the license key are mounted outside the
/// auth middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        secret: state.config.auth_secret.clone(),
    };

    let api = Router::new()
        .merge(routes::packs::router())
        .merge(routes::versions::router())
        .merge(routes::license::router())
        .merge(routes::account::router())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(from_fn(auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    let unauthenticated = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness))
        .route("/metrics", axum::routing::get(prometheus_metrics))
        .merge(routes::license::key_router())
        .with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// GET /metrics — Prometheus text exposition.
async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// Liveness probe — always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe — 200 "ready", or 503 when the database is configured
/// and unreachable.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }
    (StatusCode::OK, "ready").into_response()
}
