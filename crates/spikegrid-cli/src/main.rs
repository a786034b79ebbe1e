//! # spikegrid CLI
//!
//! Command-line runner for grid-structured spiking network scenarios.

use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use spikegrid_cli::config::CliConfig;
use spikegrid_cli::error::CliResult;
use spikegrid_cli::SpikegridCli;

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = SpikegridCli::parse();

    // RUST_LOG wins, then --verbose, then the configured level
    let default_level = if cli.verbose {
        "debug".to_string()
    } else {
        CliConfig::load(cli.config.as_deref())
            .ok()
            .and_then(|c| c.log_level)
            .unwrap_or_else(|| "info".to_string())
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    if let Err(err) = cli.execute().await {
        error!("Command failed: {}", err);
        std::process::exit(1);
    }

    Ok(())
}
