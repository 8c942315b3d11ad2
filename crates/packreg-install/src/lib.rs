//! # packreg-install — Client-Side Pack Installer
//!
//! Places a pack into a project safely:
//!
//! 1. Refuse early when the caller's tier is too low, before any content
//!    is transferred.
//! 2. Download files and license together; verify the license offline
//!    against the registry key and check every file's hash.
//! 3. Route each file under `.claude/`, prepend provenance markers to text
//!    files, and refuse to overwrite anything not owned by this pack.
//! 4. Persist the license and an install record next to the pack so
//!    `verify` works without network access.
//! 5. Keep a per-pack section in `.gitignore`.
//!
//! The registry is reached through the [`RegistryClient`] trait; the HTTP
//! implementation retries transport failures with backoff.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use packreg_core::PackSlug;
//! use packreg_install::{ClientConfig, Installer};
//!
//! let config = ClientConfig::new("https://registry.example", ".").with_token("pro:alice:secret");
//! let installer = Installer::connect(&config)?;
//! let slug = PackSlug::parse("demo")?;
//! installer.install(&slug, None).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod ignore;
pub mod installer;
pub mod layout;
pub mod record;
mod retry;

pub use client::{HttpRegistryClient, RegistryClient};
pub use config::{ClientConfig, DEFAULT_REGISTRY_URL, DEFAULT_UPGRADE_URL};
pub use error::{ClientError, InstallError};
pub use installer::{
    FileReport, FileStatus, InstallReport, InstallStep, InstalledPack, Installer, LicenseStatus,
    VerifyReport,
};
pub use layout::ProjectLayout;
