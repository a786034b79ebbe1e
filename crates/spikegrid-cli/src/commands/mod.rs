//! CLI command implementations for spikegrid

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::CliConfig;
use crate::error::CliResult;

pub mod run;
pub mod scenario;

/// spikegrid - run grid-structured spiking network scenarios
#[derive(Parser, Debug)]
#[command(
    name = "spikegrid",
    version,
    about = "Run grid-structured spiking network scenarios",
    long_about = "spikegrid builds spiking networks of Izhikevich neurons laid out on 3D \
                  lattices, drives them with Poisson inputs, and reports monitor summaries. \
                  Without a scenario file it runs the two-layer hello-world network."
)]
pub struct SpikegridCli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build and run a scenario
    Run(run::RunCommand),

    /// Write the built-in scenario as TOML
    #[command(alias = "init")]
    Scenario(scenario::ScenarioCommand),
}

impl SpikegridCli {
    /// Execute the CLI command
    pub async fn execute(self) -> CliResult<()> {
        let config = CliConfig::load(self.config.as_deref())?;

        match self.command {
            Commands::Run(cmd) => cmd.execute(&config, self.verbose).await,
            Commands::Scenario(cmd) => cmd.execute().await,
        }
    }
}
