//! # Pack API
//!
//! Pack creation, metadata lookup and lifecycle transitions.
//!
//! Draft and rejected packs are visible to their owner only; everyone else
//! gets `404`, the same answer as for a slug that was never registered.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use packreg_core::wire::{CreatePackRequest, PackInfo, StatusChangeRequest};
use packreg_core::{PackId, PackSlug};
use packreg_registry::{NewPack, Pack};

use crate::auth::{require_owner, CallerIdentity};
use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json, Validate};
use crate::state::AppState;

const MAX_NAME_LEN: usize = 200;

impl Validate for CreatePackRequest {
    fn validate(&self) -> Result<(), String> {
        PackSlug::parse(&self.slug).map_err(|e| e.to_string())?;
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.name.len() > MAX_NAME_LEN {
            return Err(format!("name must not exceed {MAX_NAME_LEN} characters"));
        }
        Ok(())
    }
}

/// Build the packs router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/packs", post(create_pack))
        .route("/v1/packs/{pack}", get(get_pack))
        .route("/v1/packs/{pack}/status", post(change_status))
}

// ─── Lookup helpers ──────────────────────────────────────────────────

/// Resolve `slug` to a pack the caller may see.
pub(crate) async fn visible_pack(
    state: &AppState,
    slug: &str,
    caller: &CallerIdentity,
) -> Result<Pack, AppError> {
    let not_found = || AppError::NotFound(format!("pack '{slug}' not found"));
    let slug = PackSlug::parse(slug).map_err(|_| not_found())?;
    let pack = state.store.pack_by_slug(&slug).await?.ok_or_else(not_found)?;
    if !pack.status.is_downloadable() && pack.owner != caller.subject {
        return Err(not_found());
    }
    Ok(pack)
}

/// Resolve a pack id from the path. Unlike [`visible_pack`] this is used
/// by owner-only writes, so ownership is checked by the caller.
pub(crate) async fn pack_by_id(state: &AppState, raw: &str) -> Result<Pack, AppError> {
    let not_found = || AppError::NotFound(format!("pack '{raw}' not found"));
    let id = uuid::Uuid::parse_str(raw).map_err(|_| not_found())?;
    state
        .store
        .pack_by_id(PackId(id))
        .await?
        .ok_or_else(not_found)
}

pub(crate) async fn pack_info(state: &AppState, pack: &Pack) -> Result<PackInfo, AppError> {
    let latest = state.store.latest_version(pack.id).await?;
    Ok(pack.to_info(latest.map(|v| v.version)))
}

// ─── Handlers ────────────────────────────────────────────────────────

/// POST /v1/packs — Register a draft pack owned by the caller.
async fn create_pack(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreatePackRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PackInfo>), AppError> {
    let req = extract_validated_json(body)?;
    let pack = state
        .store
        .create_pack(NewPack {
            slug: PackSlug::parse(&req.slug)?,
            name: req.name.trim().to_string(),
            owner: caller.subject.clone(),
            tier_required: req.tier_required,
        })
        .await?;
    tracing::info!(pack_id = %pack.id, slug = %pack.slug, owner = %pack.owner, "pack created");
    Ok((StatusCode::CREATED, Json(pack.to_info(None))))
}

/// GET /v1/packs/{slug} — Pack metadata with its latest version.
async fn get_pack(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(slug): Path<String>,
) -> Result<Json<PackInfo>, AppError> {
    let pack = visible_pack(&state, &slug, &caller).await?;
    Ok(Json(pack_info(&state, &pack).await?))
}

/// POST /v1/packs/{pack_id}/status — Owner-requested lifecycle change.
async fn change_status(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(pack_id): Path<String>,
    body: Result<Json<StatusChangeRequest>, JsonRejection>,
) -> Result<Json<PackInfo>, AppError> {
    let req = extract_json(body)?;
    let pack = pack_by_id(&state, &pack_id).await?;
    require_owner(&caller, &pack.owner)?;
    let pack = state.publisher.transition_status(pack.id, req.status).await?;
    Ok(Json(pack_info(&state, &pack).await?))
}
