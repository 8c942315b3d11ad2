//! # packreg-api — Binary Entry Point
//!
//! Starts the registry HTTP server. Configuration comes from `PACKREG_*`
//! environment variables and `DATABASE_URL`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use packreg_api::state::{ApiConfig, AppState};
use packreg_crypto::FsContentStore;
use packreg_license::LicenseIssuer;
use packreg_registry::{MemoryPackStore, PackStore, PgPackStore};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("PACKREG_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ApiConfig::from_env().context("reading configuration")?;
    tracing::debug!(?config, "configuration loaded");

    let db_pool = packreg_api::db::init_pool().await.map_err(|e| {
        tracing::error!("database initialization failed: {e}");
        e
    })?;

    let store: Arc<dyn PackStore> = match &db_pool {
        Some(pool) => Arc::new(PgPackStore::new(pool.clone()).with_lock_timeout(config.lock_timeout)),
        None => Arc::new(MemoryPackStore::new().with_lock_timeout(config.lock_timeout)),
    };
    let content = Arc::new(FsContentStore::new(config.content_dir.clone()));
    tracing::info!(content_dir = %config.content_dir.display(), "content store ready");

    let issuer = LicenseIssuer::new(config.license_key().context("loading license key")?)
        .with_ttl_secs(config.license_ttl_secs);
    tracing::info!(key_id = %issuer.key_id(), "license signing key loaded");

    let seed = config.watermark_seed();
    let port = config.port;
    let mut state = AppState::new(config, store, content, issuer, seed);
    match packreg_api::metrics::install_recorder() {
        Ok(handle) => state = state.with_metrics(handle),
        Err(e) => tracing::warn!("metrics recorder not installed: {e}"),
    }
    if let Some(pool) = db_pool {
        state = state.with_db_pool(pool);
    }

    let app = packreg_api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("packreg API listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
