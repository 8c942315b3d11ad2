//! # packreg CLI entry point
//!
//! Parses arguments, sets up logging from `-v` flags, wires Ctrl-C to the
//! installer's cancellation token and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use packreg_cli::connection::ConnectionArgs;
use packreg_cli::keygen::{run_keygen, KeygenArgs};
use packreg_cli::pack::{run_install, run_list, run_uninstall, run_update, run_verify};

/// Install and verify licensed packs from a packreg registry.
#[derive(Parser, Debug)]
#[command(name = "packreg", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install a pack into the project.
    Install {
        slug: String,
        /// SemVer version or `latest` (default).
        version: Option<String>,
    },

    /// Replace an installed pack with another version.
    Update {
        slug: String,
        /// SemVer version or `latest` (default).
        version: Option<String>,
        /// Overwrite files that were edited locally.
        #[arg(long)]
        force: bool,
    },

    /// Remove an installed pack.
    Uninstall { slug: String },

    /// Check licenses and file integrity offline.
    Verify { slug: Option<String> },

    /// List installed packs.
    List,

    /// Generate a license signing key for a registry.
    Keygen(KeygenArgs),
}

fn log_filter(verbose: u8) -> EnvFilter {
    match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping at the next step");
            on_signal.cancel();
        }
    });

    let result = match cli.command {
        Commands::Keygen(args) => run_keygen(&args),
        command => run_pack_command(&cli.connection, command, cancel).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run_pack_command(
    connection: &ConnectionArgs,
    command: Commands,
    cancel: CancellationToken,
) -> anyhow::Result<u8> {
    let installer = connection.installer(cancel)?;
    match command {
        Commands::Install { slug, version } => {
            run_install(&installer, &slug, version.as_deref()).await
        }
        Commands::Update {
            slug,
            version,
            force,
        } => run_update(&installer, &slug, version.as_deref(), force).await,
        Commands::Uninstall { slug } => run_uninstall(&installer, &slug).await,
        Commands::Verify { slug } => run_verify(&installer, slug.as_deref()).await,
        Commands::List => run_list(&installer).await,
        Commands::Keygen(args) => run_keygen(&args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_install_with_version() {
        let cli = Cli::try_parse_from(["packreg", "install", "demo", "1.2.0"]).unwrap();
        match cli.command {
            Commands::Install { slug, version } => {
                assert_eq!(slug, "demo");
                assert_eq!(version.as_deref(), Some("1.2.0"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parse_update_force_and_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "packreg",
            "update",
            "demo",
            "--force",
            "--registry",
            "http://r.test",
            "--project",
            "/work",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Update { force: true, .. }));
        assert_eq!(cli.connection.registry, "http://r.test");
        assert_eq!(cli.connection.project.as_deref(), Some(std::path::Path::new("/work")));
    }

    #[test]
    fn parse_verify_without_slug() {
        let cli = Cli::try_parse_from(["packreg", "verify"]).unwrap();
        assert!(matches!(cli.command, Commands::Verify { slug: None }));
    }

    #[test]
    fn verbosity_count() {
        let cli = Cli::try_parse_from(["packreg", "-vv", "list"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn install_requires_a_slug() {
        assert!(Cli::try_parse_from(["packreg", "install"]).is_err());
    }
}
