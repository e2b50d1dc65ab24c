//! # dotbox — ephemeral chroot sandbox
//!
//! Builds a throwaway, read-only view of the host for one shell session,
//! confined to a private mount namespace, and removes every trace of itself
//! on exit.

use std::path::PathBuf;

use clap::Parser;

/// Run your login shell in an ephemeral, read-only sandbox of the host.
#[derive(Parser, Debug)]
#[command(name = dotbox_common::constants::BIN_NAME, version, about, long_about = None)]
struct Cli {
    /// Directory to bind over the sandboxed home. Without it, the home
    /// directory is whatever the fixed read-only mounts happen to expose.
    home: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let status = dotbox_core::lifecycle::run(cli.home)?;
    std::process::exit(status);
}
