//! Client configuration.

use std::path::PathBuf;

/// Upgrade link used when the client refuses a download locally, before
/// the registry has had a chance to supply its own.
pub const DEFAULT_UPGRADE_URL: &str = "https://packreg.dev/pricing";

/// Default registry endpoint.
pub const DEFAULT_REGISTRY_URL: &str = "http://localhost:8080";

/// Where the installer talks to and writes into.
///
/// Custom `Debug` redacts the token.
#[derive(Clone)]
pub struct ClientConfig {
    pub registry_url: String,
    /// Bearer token `{tier}:{subject}:{secret}`.
    pub token: Option<String>,
    pub project_dir: PathBuf,
    /// Hex Ed25519 key that overrides the pinned registry key.
    pub public_key: Option<String>,
    pub upgrade_url: String,
    /// Request timeout in seconds (default: 30).
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("registry_url", &self.registry_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("project_dir", &self.project_dir)
            .field("public_key", &self.public_key)
            .field("upgrade_url", &self.upgrade_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(registry_url: impl Into<String>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry_url: registry_url.into(),
            token: None,
            project_dir: project_dir.into(),
            public_key: None,
            upgrade_url: DEFAULT_UPGRADE_URL.to_string(),
            timeout_secs: 30,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_public_key(mut self, hex: impl Into<String>) -> Self {
        self.public_key = Some(hex.into());
        self
    }
}
