//! # Keygen Subcommand
//!
//! Generates the Ed25519 key a registry signs licenses with. The seed goes
//! into `PACKREG_LICENSE_KEY_HEX` on the server; the public key can be
//! handed to clients as `PACKREG_PUBLIC_KEY`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use packreg_crypto::Ed25519KeyPair;

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Write the seed to this file instead of printing it.
    #[arg(long)]
    pub seed_out: Option<PathBuf>,
}

pub fn run_keygen(args: &KeygenArgs) -> Result<u8> {
    let key = Ed25519KeyPair::generate();
    let public = key.public_key();

    match &args.seed_out {
        Some(path) => {
            std::fs::write(path, format!("{}\n", key.seed_hex()))
                .with_context(|| format!("failed to write seed: {}", path.display()))?;
            println!("seed:       written to {}", path.display());
        }
        None => println!("seed:       {}", key.seed_hex()),
    }
    println!("public key: {}", public.to_hex());
    println!("key id:     {}", public.key_id());
    Ok(0)
}
