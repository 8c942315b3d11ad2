//! # Version API
//!
//! Publishing, listing and the tier-gated download. A download returns the
//! version's files together with a freshly minted license; nothing is read
//! from the content store until the caller's tier has been checked.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use packreg_core::wire::{
    DownloadResponse, PublishVersionRequest, VersionInfo, WireFile, WireLicense, LATEST_ALIAS,
};
use packreg_core::{sha256_hex, SemVer};
use packreg_license::{LicenseError, LicenseGrant};
use packreg_registry::{Pack, PackVersion, PublishError, PublishFile, StoreError};

use crate::auth::{require_owner, CallerIdentity};
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::metrics;
use crate::routes::packs::{pack_by_id, visible_pack};
use crate::state::AppState;

/// Build the versions router.
///
/// `{pack}` is a slug on reads and a pack id on publish.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/packs/{pack}/versions",
            get(list_versions).post(publish_version),
        )
        .route(
            "/v1/packs/{pack}/versions/{version}/download",
            get(download),
        )
}

/// GET /v1/packs/{slug}/versions — All versions, highest first.
async fn list_versions(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(slug): Path<String>,
) -> Result<Json<Vec<VersionInfo>>, AppError> {
    let pack = visible_pack(&state, &slug, &caller).await?;
    let versions = state.store.list_versions(pack.id).await?;
    let mut out = Vec::with_capacity(versions.len());
    for v in &versions {
        let files = state.store.files(v.id).await?;
        out.push(v.to_info(&files));
    }
    Ok(Json(out))
}

/// POST /v1/packs/{pack_id}/versions — Publish a version (owner only).
async fn publish_version(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(pack_id): Path<String>,
    body: Result<Json<PublishVersionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<VersionInfo>), AppError> {
    let req = extract_json(body)?;
    let pack = pack_by_id(&state, &pack_id).await?;
    require_owner(&caller, &pack.owner)?;

    let mut files = Vec::with_capacity(req.files.len());
    for f in req.files {
        let content = f.decode_content().map_err(|e| {
            AppError::Validation(format!("content of '{}' is not valid base64: {e}", f.path))
        })?;
        files.push(PublishFile {
            path: f.path,
            content,
            mime_type: f.mime_type,
        });
    }

    match state
        .publisher
        .publish_version(pack.id, &req.version, req.manifest, files)
        .await
    {
        Ok(outcome) => {
            metrics::record_version_published(outcome.promoted);
            Ok((
                StatusCode::CREATED,
                Json(outcome.version.to_info(&outcome.files)),
            ))
        }
        Err(e) => {
            if matches!(e, PublishError::Store(StoreError::VersionConflict { .. })) {
                metrics::record_publish_conflict();
            }
            Err(e.into())
        }
    }
}

async fn resolve_version(
    state: &AppState,
    pack: &Pack,
    requested: &str,
) -> Result<PackVersion, AppError> {
    let found = if requested == LATEST_ALIAS {
        state.store.latest_version(pack.id).await?
    } else {
        let version = SemVer::parse(requested)?;
        state.store.version(pack.id, &version).await?
    };
    found.ok_or_else(|| {
        AppError::NotFound(format!("version '{requested}' of pack '{}' not found", pack.slug))
    })
}

/// GET /v1/packs/{slug}/versions/{version}/download — Files plus license.
///
/// `version` may be `latest`.
async fn download(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((slug, version)): Path<(String, String)>,
) -> Result<Json<DownloadResponse>, AppError> {
    let pack = visible_pack(&state, &slug, &caller).await?;
    if !pack.status.is_downloadable() {
        return Err(AppError::NotFound(format!(
            "pack '{}' has no downloadable versions",
            pack.slug
        )));
    }
    let resolved = resolve_version(&state, &pack, &version).await?;

    let grant = match LicenseGrant::authorize(
        &caller.subject,
        caller.tier,
        pack.tier_required,
        &pack.slug,
        &resolved.version,
        &state.watermark_seed,
    ) {
        Ok(grant) => grant,
        Err(LicenseError::TierInsufficient { current, required }) => {
            metrics::record_download_denied("tier_insufficient");
            tracing::info!(
                pack = %pack.slug,
                subject = %caller.subject,
                current = %current,
                required = %required,
                "download refused: tier insufficient"
            );
            return Err(AppError::TierInsufficient {
                current,
                required,
                upgrade_url: state.config.pricing_url.clone(),
            });
        }
        Err(e) => return Err(AppError::Internal(e.to_string())),
    };

    let files = state.store.files(resolved.id).await?;
    let mut wire = Vec::with_capacity(files.len());
    for f in &files {
        let bytes = state.content.get(&f.storage_key).await?;
        if sha256_hex(&bytes) != f.content_hash {
            return Err(AppError::Internal(format!(
                "stored bytes for {} do not match the recorded content hash",
                f.path
            )));
        }
        wire.push(WireFile::encode(f.path.clone(), &bytes, &f.mime_type));
    }

    let issued = state
        .issuer
        .issue(&grant)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    metrics::record_license_issued(grant.tier());
    tracing::info!(
        pack = %pack.slug,
        version = %resolved.version,
        subject = %caller.subject,
        license_id = %issued.claims.license_id,
        file_count = wire.len(),
        "download served"
    );

    Ok(Json(DownloadResponse {
        pack: pack.slug,
        version: resolved.version,
        manifest: resolved.manifest,
        files: wire,
        license: WireLicense {
            token: issued.token,
            expires_at: issued.expires_at,
            watermark: issued.watermark,
        },
    }))
}
