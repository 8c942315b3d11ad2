//! # packreg-cli — Command-Line Client
//!
//! Provides the `packreg` binary.
//!
//! ## Subcommands
//!
//! - `packreg install <slug> [version]` — tier check, download, verify, write.
//! - `packreg update <slug> [version] [--force]` — replace an installed pack.
//! - `packreg uninstall <slug>` — remove a pack and its `.gitignore` section.
//! - `packreg verify [slug]` — offline license and file integrity check.
//! - `packreg list` — installed packs with license expiry.
//! - `packreg keygen` — generate a registry license signing key.
//!
//! ```bash
//! export PACKREG_URL=https://registry.example
//! export PACKREG_TOKEN=pro:alice:secret
//! packreg install code-review
//! packreg verify
//! ```

pub mod connection;
pub mod keygen;
pub mod pack;

/// Exit code when verification found problems.
pub const EXIT_VERIFY_FAILED: u8 = 2;
