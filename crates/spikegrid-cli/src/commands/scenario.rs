//! Scenario template command

use clap::Args;
use std::path::PathBuf;
use tracing::info;

use crate::error::{CliError, CliResult};
use crate::scenario::Scenario;

/// Write the built-in hello-world scenario
#[derive(Args, Debug)]
pub struct ScenarioCommand {
    /// Output file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

impl ScenarioCommand {
    pub async fn execute(self) -> CliResult<()> {
        if self.output.exists() && !self.force {
            return Err(CliError::invalid_args(format!(
                "{} already exists (use --force to overwrite)",
                self.output.display()
            )));
        }
        let text = Scenario::hello_world().to_toml_string()?;
        if let Some(parent) = self.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.output, text)?;
        info!("Scenario written to {}", self.output.display());
        Ok(())
    }
}
