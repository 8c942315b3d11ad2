//! # Application State
//!
//! Configuration read from the environment and the shared services every
//! handler reaches through `State<AppState>`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;
use packreg_core::digest::to_hex;
use packreg_crypto::{ContentStore, Ed25519KeyPair, MemoryContentStore};
use packreg_license::{LicenseIssuer, LicenseVerifier, DEFAULT_TTL_SECS};
use packreg_registry::{MemoryPackStore, PackStore, VersionPublisher, DEFAULT_LOCK_TIMEOUT};
use thiserror::Error;

/// Default upgrade link returned with `TIER_INSUFFICIENT`.
pub const DEFAULT_PRICING_URL: &str = "https://packreg.dev/pricing";

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Server configuration.
///
/// Custom `Debug` redacts every secret.
#[derive(Clone)]
pub struct ApiConfig {
    pub port: u16,
    /// Shared bearer secret. `None` disables authentication.
    pub auth_secret: Option<String>,
    pub content_dir: PathBuf,
    /// Hex-encoded 32-byte Ed25519 seed for license signing.
    pub license_key_hex: Option<String>,
    pub license_ttl_secs: i64,
    pub pricing_url: String,
    pub lock_timeout: Duration,
    /// Secret mixed into every watermark.
    pub watermark_seed: Option<String>,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("ApiConfig")
            .field("port", &self.port)
            .field("auth_secret", &redact(&self.auth_secret))
            .field("content_dir", &self.content_dir)
            .field("license_key_hex", &redact(&self.license_key_hex))
            .field("license_ttl_secs", &self.license_ttl_secs)
            .field("pricing_url", &self.pricing_url)
            .field("lock_timeout", &self.lock_timeout)
            .field("watermark_seed", &redact(&self.watermark_seed))
            .finish()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_secret: None,
            content_dir: PathBuf::from("./content"),
            license_key_hex: None,
            license_ttl_secs: DEFAULT_TTL_SECS,
            pricing_url: DEFAULT_PRICING_URL.to_string(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            watermark_seed: None,
        }
    }
}

impl ApiConfig {
    /// Read configuration from `PACKREG_*` environment variables.
    /// `DATABASE_URL` is read separately by [`crate::db::init_pool`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match non_empty("PACKREG_PORT") {
            Some(v) => v.trim().parse().map_err(|e| ConfigError::Invalid {
                var: "PACKREG_PORT",
                reason: format!("{e}"),
            })?,
            None => defaults.port,
        };
        let license_ttl_secs = match non_empty("PACKREG_LICENSE_TTL_SECS") {
            Some(v) => {
                let secs: i64 = v.trim().parse().map_err(|e| ConfigError::Invalid {
                    var: "PACKREG_LICENSE_TTL_SECS",
                    reason: format!("{e}"),
                })?;
                if secs <= 0 {
                    return Err(ConfigError::Invalid {
                        var: "PACKREG_LICENSE_TTL_SECS",
                        reason: "must be positive".into(),
                    });
                }
                secs
            }
            None => defaults.license_ttl_secs,
        };
        let lock_timeout = match non_empty("PACKREG_LOCK_TIMEOUT_MS") {
            Some(v) => Duration::from_millis(v.trim().parse().map_err(|e| {
                ConfigError::Invalid {
                    var: "PACKREG_LOCK_TIMEOUT_MS",
                    reason: format!("{e}"),
                }
            })?),
            None => defaults.lock_timeout,
        };

        Ok(Self {
            port,
            auth_secret: non_empty("PACKREG_AUTH_SECRET"),
            content_dir: non_empty("PACKREG_CONTENT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.content_dir),
            license_key_hex: non_empty("PACKREG_LICENSE_KEY_HEX"),
            license_ttl_secs,
            pricing_url: non_empty("PACKREG_PRICING_URL").unwrap_or(defaults.pricing_url),
            lock_timeout,
            watermark_seed: non_empty("PACKREG_WATERMARK_SEED"),
        })
    }

    /// The configured signing key, or a fresh one with a warning.
    pub fn license_key(&self) -> Result<Ed25519KeyPair, ConfigError> {
        match &self.license_key_hex {
            Some(hex) => {
                Ed25519KeyPair::from_seed_hex(hex.trim()).map_err(|e| ConfigError::Invalid {
                    var: "PACKREG_LICENSE_KEY_HEX",
                    reason: e.to_string(),
                })
            }
            None => {
                tracing::warn!(
                    "PACKREG_LICENSE_KEY_HEX not set; using an ephemeral signing key. \
                     Licenses will not verify after a restart."
                );
                Ok(Ed25519KeyPair::generate())
            }
        }
    }

    /// The configured watermark seed, or a random per-process one.
    pub fn watermark_seed(&self) -> String {
        match &self.watermark_seed {
            Some(seed) => seed.clone(),
            None => {
                tracing::warn!(
                    "PACKREG_WATERMARK_SEED not set; watermarks will change on restart"
                );
                let bytes: [u8; 32] = rand::random();
                to_hex(&bytes)
            }
        }
    }
}

// ─── Shared State ────────────────────────────────────────────────────

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub store: Arc<dyn PackStore>,
    pub content: Arc<dyn ContentStore>,
    pub publisher: VersionPublisher,
    pub issuer: Arc<LicenseIssuer>,
    pub verifier: LicenseVerifier,
    pub watermark_seed: Arc<str>,
    /// Present when a Prometheus recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// Checked by the readiness probe when the store is Postgres-backed.
    pub db_pool: Option<sqlx::PgPool>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("key_id", &self.issuer.key_id())
            .field("metrics", &self.metrics.is_some())
            .field("database", &self.db_pool.is_some())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Assemble state from explicit parts.
    pub fn new(
        config: ApiConfig,
        store: Arc<dyn PackStore>,
        content: Arc<dyn ContentStore>,
        issuer: LicenseIssuer,
        watermark_seed: String,
    ) -> Self {
        let publisher = VersionPublisher::new(store.clone(), content.clone());
        let verifier = issuer.verifier();
        Self {
            config: Arc::new(config),
            store,
            content,
            publisher,
            issuer: Arc::new(issuer),
            verifier,
            watermark_seed: Arc::from(watermark_seed),
            metrics: None,
            db_pool: None,
        }
    }

    /// In-memory store and content, for development and tests.
    pub fn in_memory(config: ApiConfig) -> Result<Self, ConfigError> {
        let store = Arc::new(MemoryPackStore::new().with_lock_timeout(config.lock_timeout));
        let content = Arc::new(MemoryContentStore::new());
        let issuer = LicenseIssuer::new(config.license_key()?).with_ttl_secs(config.license_ttl_secs);
        let seed = config.watermark_seed();
        Ok(Self::new(config, store, content, issuer, seed))
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn with_db_pool(mut self, pool: sqlx::PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }
}
