//! Tollgate Server Binary

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use tollgate_server::{
    config::{load_config, validate_config},
    Server,
};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "tollgate-server", version, about = "Tollgate API server")]
struct Args {
    /// Configuration file (TOML). Falls back to $TOLLGATE_CONFIG.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON file of users to load into the directory.
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Validate configuration and the roles table, then exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    dotenvy::dotenv().ok();
    let mut config = load_config(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        config.directory.seed_path = Some(seed);
    }

    if let Err(errors) = validate_config(&config) {
        let details = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        bail!("Invalid configuration: {details}");
    }

    tollgate_common_log::init(&config.logging)?;

    info!("Starting Tollgate Server v{}", env!("CARGO_PKG_VERSION"));

    // Builds the role registry and directory, so --check covers both.
    let server = Server::new(config)?;
    if args.check {
        info!(addr = %server.addr()?, "Configuration OK");
        return Ok(());
    }

    server.run().await?;

    info!("Server shutdown complete");
    Ok(())
}
