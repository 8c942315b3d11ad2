//! Registry and project options shared by every pack subcommand.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use packreg_install::{ClientConfig, Installer, DEFAULT_REGISTRY_URL};
use tokio_util::sync::CancellationToken;

#[derive(Args, Clone)]
pub struct ConnectionArgs {
    /// Registry base URL.
    #[arg(long = "registry", env = "PACKREG_URL", default_value = DEFAULT_REGISTRY_URL, global = true)]
    pub registry: String,

    /// Bearer token, `{tier}:{subject}:{secret}`.
    #[arg(long, env = "PACKREG_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Project directory (default: current directory).
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,

    /// Hex Ed25519 key used instead of the pinned registry key.
    #[arg(long, env = "PACKREG_PUBLIC_KEY", global = true)]
    pub public_key: Option<String>,
}

impl std::fmt::Debug for ConnectionArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionArgs")
            .field("registry", &self.registry)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("project", &self.project)
            .field("public_key", &self.public_key)
            .finish()
    }
}

impl ConnectionArgs {
    pub fn client_config(&self) -> Result<ClientConfig> {
        let project = match &self.project {
            Some(p) => p.clone(),
            None => std::env::current_dir().context("failed to resolve current directory")?,
        };
        let mut config = ClientConfig::new(&self.registry, project);
        if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
            config = config.with_token(token);
        }
        if let Some(key) = self.public_key.as_deref().filter(|k| !k.is_empty()) {
            config = config.with_public_key(key);
        }
        Ok(config)
    }

    pub fn installer(&self, cancel: CancellationToken) -> Result<Installer> {
        let config = self.client_config()?;
        tracing::debug!(?config, "connecting");
        let installer = Installer::connect(&config)
            .with_context(|| format!("failed to set up client for {}", config.registry_url))?;
        Ok(installer.with_cancellation(cancel))
    }
}
