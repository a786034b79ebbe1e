//! Scenario run command

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::scenario::{RunSummary, Scenario};

/// Seed used when neither the flag, the scenario, nor the config sets one
const FALLBACK_SEED: u64 = 42;

/// Build and run a scenario
#[derive(Args, Debug)]
pub struct RunCommand {
    /// Scenario file (.toml); the built-in hello-world network when omitted
    #[arg(short, long)]
    pub scenario: Option<PathBuf>,

    /// Total ticks (ms) to simulate
    #[arg(long)]
    pub steps: Option<u32>,

    /// Ticks per step call
    #[arg(long)]
    pub step_size: Option<u32>,

    /// Rate of every generator group (Hz)
    #[arg(long)]
    pub rate: Option<f32>,

    /// Random seed
    #[arg(long, env = "SPIKEGRID_SEED")]
    pub seed: Option<u64>,

    /// Use current-based synapses
    #[arg(long)]
    pub cuba: bool,

    /// Write a JSON summary to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl RunCommand {
    pub async fn execute(self, config: &CliConfig, verbose: bool) -> CliResult<()> {
        let mut scenario = match self.scenario.as_ref().or(config.default_scenario.as_ref()) {
            Some(path) => {
                info!("Loading scenario {}", path.display());
                Scenario::load(path)?
            }
            None => Scenario::hello_world(),
        };

        if let Some(steps) = self.steps {
            scenario.session.steps = steps;
        }
        if let Some(step_size) = self.step_size {
            scenario.session.step_size = step_size;
        }
        if let Some(rate) = self.rate {
            scenario.override_rate(rate);
        }
        if self.cuba {
            scenario.session.conductances = false;
        }
        if verbose {
            scenario.session.logger = "developer".to_string();
        }
        let seed = self
            .seed
            .or(scenario.session.seed)
            .or(config.default_seed)
            .unwrap_or(FALLBACK_SEED);

        let progress = if config.show_progress && !self.no_progress {
            let pb = ProgressBar::new(scenario.session.steps as u64);
            let style = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ms ({eta})")
                .map_err(|e| CliError::Generic(anyhow::anyhow!(e)))?
                .progress_chars("#>-");
            pb.set_style(style);
            pb
        } else {
            ProgressBar::hidden()
        };

        let started = Instant::now();
        let pb = progress.clone();
        let summary = tokio::task::spawn_blocking(move || {
            scenario.run(seed, |done| pb.set_position(done))
        })
        .await??;
        progress.finish_and_clear();

        print_summary(&summary, started.elapsed().as_millis());

        if let Some(path) = &self.output {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, serde_json::to_string_pretty(&summary)?)?;
            info!("Summary written to {}", path.display());
        }

        if summary.total_spikes == 0 {
            warn!("No spikes were emitted; check the input rates");
        }
        Ok(())
    }
}

fn print_summary(summary: &RunSummary, wall_ms: u128) {
    println!(
        "Scenario '{}': simulated {} ms in {} ms wall clock (seed {})",
        summary.scenario, summary.sim_time_ms, wall_ms, summary.config.seed
    );
    println!(
        "  {} neurons, {} synapses, {} spikes",
        summary.num_neurons, summary.num_synapses, summary.total_spikes
    );
    for group in &summary.groups {
        println!(
            "  group {:<12} {:>5} neurons {:>8} spikes {:>8.2} Hz ({} windows)",
            group.name, group.neurons, group.spikes, group.mean_rate_hz, group.windows
        );
    }
    for conn in &summary.connections {
        println!(
            "  connection {:<16} {:>6} synapses {:>8} events, mean weight {:.4}",
            conn.label, conn.synapses, conn.spikes_transmitted, conn.mean_weight
        );
    }
}
