//! Network scenarios described in TOML
//!
//! A scenario lists groups, connections, and run settings. The built-in
//! scenario is the two-layer hello-world network: a 13x9 Poisson input
//! layer projecting through a Gaussian receptive field onto a 3x3 layer of
//! regular-spiking neurons.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use spikegrid_runtime::{
    ConnectRule, Grid3D, GroupId, IzhikevichParams, LoggerMode, MonitorMode, NeuronType, Pattern,
    PoissonRate, RadiusRF, RangeDelay, RangeWeight, Session, SessionConfig, StepReport,
};

use crate::error::{CliError, CliResult};

/// Full scenario file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Session and run settings
    pub session: SessionSection,
    /// Groups in creation order
    #[serde(default)]
    pub groups: Vec<GroupSection>,
    /// Connections in creation order
    #[serde(default)]
    pub connections: Vec<ConnectionSection>,
}

/// `[session]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSection {
    /// Session name, also used in log output
    pub name: String,
    /// Random seed; the CLI flag or config default applies when absent
    #[serde(default)]
    pub seed: Option<u64>,
    /// Log verbosity: user, developer, showtime or silent
    #[serde(default = "default_logger")]
    pub logger: String,
    /// Conductance-based synapses; current-based when false
    #[serde(default = "default_true")]
    pub conductances: bool,
    /// Total ticks to simulate
    pub steps: u32,
    /// Ticks per `step` call
    #[serde(default = "default_step_size")]
    pub step_size: u32,
    /// Close monitor windows after every call
    #[serde(default = "default_true")]
    pub report: bool,
}

/// `[[groups]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSection {
    /// Unique group name, referenced by connections
    pub name: String,
    /// `generator` or `izhikevich`
    pub kind: String,
    /// `excitatory` or `inhibitory`
    #[serde(default = "default_neuron_type")]
    pub neuron_type: String,
    /// Lattice extent `[x, y, z]`
    pub grid: [u32; 3],
    /// Poisson rate of every neuron (generators)
    #[serde(default)]
    pub rate_hz: Option<f32>,
    /// Izhikevich parameters (computational groups)
    #[serde(default)]
    pub params: Option<ParamsSection>,
    /// Spike monitor mode, none when absent
    #[serde(default)]
    pub monitor: Option<String>,
}

/// Izhikevich parameters with optional spread
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamsSection {
    /// Recovery time scale
    pub a: f32,
    /// Recovery sensitivity
    pub b: f32,
    /// Reset potential (mV)
    pub c: f32,
    /// Recovery increment after a spike
    pub d: f32,
    /// Standard deviation of `a`
    #[serde(default)]
    pub a_sd: f32,
    /// Standard deviation of `b`
    #[serde(default)]
    pub b_sd: f32,
    /// Standard deviation of `c`
    #[serde(default)]
    pub c_sd: f32,
    /// Standard deviation of `d`
    #[serde(default)]
    pub d_sd: f32,
}

impl ParamsSection {
    fn to_params(self) -> CliResult<IzhikevichParams> {
        Ok(IzhikevichParams::with_spread(
            self.a, self.a_sd, self.b, self.b_sd, self.c, self.c_sd, self.d, self.d_sd,
        )?)
    }
}

/// `[[connections]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSection {
    /// Pre-synaptic group name
    pub source: String,
    /// Post-synaptic group name
    pub destination: String,
    /// full, full-no-direct, one-to-one, random or gaussian
    pub pattern: String,
    /// Initial synaptic weight
    pub weight: f32,
    /// Connection probability for random and gaussian patterns
    #[serde(default = "default_probability")]
    pub probability: f32,
    /// Delay range `[min, max]` in ms
    #[serde(default = "default_delay")]
    pub delay: [u8; 2],
    /// Receptive field; negative axes are unbounded
    #[serde(default = "default_radius")]
    pub radius: [f32; 3],
    /// Connection monitor mode, none when absent
    #[serde(default)]
    pub monitor: Option<String>,
}

fn default_logger() -> String {
    "user".to_string()
}

fn default_true() -> bool {
    true
}

fn default_step_size() -> u32 {
    1
}

fn default_neuron_type() -> String {
    "excitatory".to_string()
}

fn default_probability() -> f32 {
    1.0
}

fn default_delay() -> [u8; 2] {
    [1, 1]
}

fn default_radius() -> [f32; 3] {
    [-1.0, -1.0, -1.0]
}

/// Per-group results of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    /// Group name
    pub name: String,
    /// Neurons in the group
    pub neurons: usize,
    /// Spikes over the whole run
    pub spikes: u64,
    /// Mean per-neuron rate over the run (Hz)
    pub mean_rate_hz: f32,
    /// Closed monitor windows
    pub windows: usize,
}

/// Per-connection results of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSummary {
    /// `source->destination`
    pub label: String,
    /// Synapses in the connection
    pub synapses: usize,
    /// Synaptic events delivered over the run
    pub spikes_transmitted: u64,
    /// Mean weight at the last window close
    pub mean_weight: f32,
    /// Closed monitor windows
    pub windows: usize,
}

/// Results of a whole scenario run, written by `run --output`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Scenario name
    pub scenario: String,
    /// Session configuration, including the seed actually used
    pub config: SessionConfig,
    /// Simulated time (ms)
    pub sim_time_ms: u64,
    /// Spikes over all groups
    pub total_spikes: u64,
    /// Neurons over all groups
    pub num_neurons: usize,
    /// Synapses over all connections
    pub num_synapses: usize,
    /// Outcome of the final step call
    pub last_step: Option<StepReport>,
    /// Monitored groups
    pub groups: Vec<GroupSummary>,
    /// Monitored connections
    pub connections: Vec<ConnectionSummary>,
}

impl Scenario {
    /// The two-layer hello-world network
    pub fn hello_world() -> Self {
        Self {
            session: SessionSection {
                name: "hello world".to_string(),
                seed: None,
                logger: default_logger(),
                conductances: true,
                steps: 1000,
                step_size: 1,
                report: true,
            },
            groups: vec![
                GroupSection {
                    name: "input".to_string(),
                    kind: "generator".to_string(),
                    neuron_type: default_neuron_type(),
                    grid: [13, 9, 1],
                    rate_hz: Some(30.0),
                    params: None,
                    monitor: Some("default".to_string()),
                },
                GroupSection {
                    name: "output".to_string(),
                    kind: "izhikevich".to_string(),
                    neuron_type: default_neuron_type(),
                    grid: [3, 3, 1],
                    rate_hz: None,
                    params: Some(ParamsSection {
                        a: 0.02,
                        b: 0.2,
                        c: -65.0,
                        d: 8.0,
                        a_sd: 0.0,
                        b_sd: 0.0,
                        c_sd: 0.0,
                        d_sd: 0.0,
                    }),
                    monitor: Some("default".to_string()),
                },
            ],
            connections: vec![ConnectionSection {
                source: "input".to_string(),
                destination: "output".to_string(),
                pattern: "gaussian".to_string(),
                weight: 0.05,
                probability: 1.0,
                delay: [1, 1],
                radius: [3.0, 3.0, 1.0],
                monitor: Some("default".to_string()),
            }],
        }
    }

    /// Parse a scenario from TOML text
    pub fn from_toml_str(text: &str) -> CliResult<Self> {
        toml::from_str(text).map_err(|e| CliError::config(format!("Invalid scenario: {}", e)))
    }

    /// Load a scenario file
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> CliResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Set the rate of every generator group
    pub fn override_rate(&mut self, rate_hz: f32) {
        for group in self.groups.iter_mut().filter(|g| g.kind == "generator") {
            group.rate_hz = Some(rate_hz);
        }
    }

    /// Create, connect, and build a session; attach monitors and inputs
    pub fn build_session(&self, seed: u64) -> CliResult<Session> {
        let logger: LoggerMode = self.session.logger.parse()?;
        let config = SessionConfig::new(self.session.name.clone())
            .with_logger(logger)
            .with_seed(seed);
        let mut sim = Session::new(config)?;

        let mut handles: Vec<GroupId> = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            let grid = Grid3D::new(group.grid[0], group.grid[1], group.grid[2])?;
            let neuron_type: NeuronType = group.neuron_type.parse()?;
            let id = match group.kind.as_str() {
                "generator" => sim.create_spike_generator_group(&group.name, grid, neuron_type)?,
                "izhikevich" => {
                    let id = sim.create_group(&group.name, grid, neuron_type)?;
                    let params = group.params.ok_or_else(|| {
                        CliError::config(format!("group '{}' needs [groups.params]", group.name))
                    })?;
                    sim.set_neuron_parameters(id, params.to_params()?)?;
                    id
                }
                other => {
                    return Err(CliError::config(format!(
                        "group '{}' has unknown kind '{}' (expected generator | izhikevich)",
                        group.name, other
                    )))
                }
            };
            handles.push(id);
        }

        let lookup = |name: &str| {
            sim.group_id(name)
                .ok_or_else(|| CliError::config(format!("connection refers to unknown group '{}'", name)))
        };
        let mut links = Vec::with_capacity(self.connections.len());
        for conn in &self.connections {
            let src = lookup(&conn.source)?;
            let dst = lookup(&conn.destination)?;
            let pattern: Pattern = conn.pattern.parse()?;
            let rule = ConnectRule::new(pattern)
                .with_weight(RangeWeight::fixed(conn.weight))
                .with_probability(conn.probability)
                .with_delay(RangeDelay::new(conn.delay[0], conn.delay[1]))
                .with_radius(RadiusRF::new(conn.radius[0], conn.radius[1], conn.radius[2]));
            links.push((src, dst, rule));
        }
        for (src, dst, rule) in links {
            sim.connect(src, dst, rule)?;
        }

        sim.set_conductances(self.session.conductances)?;
        sim.build()?;

        for (group, &id) in self.groups.iter().zip(&handles) {
            if let Some(mode) = &group.monitor {
                sim.set_spike_monitor(id, mode.parse::<MonitorMode>()?)?;
            }
            if let Some(rate_hz) = group.rate_hz {
                let mut rates = PoissonRate::new(sim.group_num_neurons(id)?)?;
                rates.set_rates(rate_hz)?;
                sim.set_spike_rate(id, rates)?;
            }
        }
        for conn in &self.connections {
            if let Some(mode) = &conn.monitor {
                let (src, dst) = match (sim.group_id(&conn.source), sim.group_id(&conn.destination)) {
                    (Some(src), Some(dst)) => (src, dst),
                    _ => continue,
                };
                sim.set_connection_monitor(src, dst, mode.parse::<MonitorMode>()?)?;
            }
        }

        debug!(
            "Scenario '{}' built: {} neurons, {} synapses",
            self.session.name,
            sim.num_neurons(),
            sim.num_synapses()
        );
        Ok(sim)
    }

    /// Build and run the scenario, reporting progress in ticks
    pub fn run<F: FnMut(u64)>(&self, seed: u64, mut progress: F) -> CliResult<RunSummary> {
        let steps = self.session.steps;
        let step_size = self.session.step_size;
        if steps == 0 || step_size == 0 {
            return Err(CliError::invalid_args("steps and step_size must be positive"));
        }

        let mut sim = self.build_session(seed)?;
        info!(
            "Running '{}' for {} ms in steps of {} ms",
            self.session.name, steps, step_size
        );

        let mut done = 0u32;
        let mut total_spikes = 0u64;
        let mut last_step = None;
        while done < steps {
            let n = step_size.min(steps - done);
            // The final call always reports so monitors hold a closed window
            let report = self.session.report || done + n == steps;
            let outcome = sim.step(n, report)?;
            total_spikes += outcome.spike_count;
            last_step = Some(outcome);
            done += n;
            progress(done as u64);
        }

        Ok(self.summarize(&sim, total_spikes, last_step))
    }

    fn summarize(&self, sim: &Session, total_spikes: u64, last_step: Option<StepReport>) -> RunSummary {
        let groups = self
            .groups
            .iter()
            .filter_map(|g| sim.group_id(&g.name))
            .filter_map(|id| sim.spike_monitor(id))
            .map(|m| GroupSummary {
                name: m.group_name().to_string(),
                neurons: m.num_neurons(),
                spikes: m.total_spike_count(),
                mean_rate_hz: m.mean_rate_hz(),
                windows: m.num_windows(),
            })
            .collect();

        let connections = self
            .connections
            .iter()
            .filter_map(|c| Some((sim.group_id(&c.source)?, sim.group_id(&c.destination)?)))
            .filter_map(|(src, dst)| sim.connection_monitor(src, dst))
            .map(|m| ConnectionSummary {
                label: m.label().to_string(),
                synapses: m.num_synapses(),
                spikes_transmitted: m.windows().iter().map(|w| w.spikes_transmitted).sum(),
                mean_weight: m.windows().last().map_or(0.0, |w| w.mean_weight),
                windows: m.num_windows(),
            })
            .collect();

        RunSummary {
            scenario: self.session.name.clone(),
            config: sim.config().clone(),
            sim_time_ms: sim.sim_time_ms(),
            total_spikes,
            num_neurons: sim.num_neurons(),
            num_synapses: sim.num_synapses(),
            last_step,
            groups,
            connections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_hello_world() -> Scenario {
        let mut scenario = Scenario::hello_world();
        scenario.session.logger = "silent".to_string();
        scenario
    }

    #[test]
    fn default_scenario_survives_toml() {
        let scenario = Scenario::hello_world();
        let text = scenario.to_toml_string().unwrap();
        assert_eq!(Scenario::from_toml_str(&text).unwrap(), scenario);
    }

    #[test]
    fn minimal_file_uses_defaults() {
        let text = r#"
            [session]
            name = "tiny"
            steps = 10

            [[groups]]
            name = "in"
            kind = "generator"
            grid = [2, 2, 1]
            rate_hz = 50.0

            [[groups]]
            name = "out"
            kind = "izhikevich"
            grid = [1, 1, 1]
            params = { a = 0.1, b = 0.2, c = -65.0, d = 2.0 }

            [[connections]]
            source = "in"
            destination = "out"
            pattern = "full"
            weight = 2.0
        "#;
        let scenario = Scenario::from_toml_str(text).unwrap();
        assert_eq!(scenario.session.step_size, 1);
        assert!(scenario.session.conductances);
        assert_eq!(scenario.connections[0].delay, [1, 1]);

        let sim = scenario.build_session(1).unwrap();
        assert_eq!(sim.num_neurons(), 5);
        assert_eq!(sim.num_synapses(), 4);
    }

    #[test]
    fn hello_world_builds() {
        let sim = quiet_hello_world().build_session(42).unwrap();
        assert_eq!(sim.num_groups(), 2);
        assert_eq!(sim.num_neurons(), 126);
        assert!(sim.num_synapses() > 0);
    }

    #[test]
    fn run_reports_progress_and_windows() {
        let mut scenario = quiet_hello_world();
        scenario.session.steps = 25;
        scenario.session.step_size = 10;

        let mut ticks = Vec::new();
        let summary = scenario.run(5, |done| ticks.push(done)).unwrap();
        assert_eq!(ticks, vec![10, 20, 25]);
        assert_eq!(summary.sim_time_ms, 25);
        assert_eq!(summary.groups.len(), 2);
        assert!(summary.groups.iter().all(|g| g.windows == 3));
        assert_eq!(summary.connections.len(), 1);
        assert_eq!(summary.config.seed, 5);
    }

    #[test]
    fn unreported_run_still_closes_final_window() {
        let mut scenario = quiet_hello_world();
        scenario.session.steps = 20;
        scenario.session.step_size = 5;
        scenario.session.report = false;
        let summary = scenario.run(1, |_| {}).unwrap();
        assert!(summary.groups.iter().all(|g| g.windows == 1));
    }

    #[test]
    fn bad_references_rejected() {
        let mut scenario = quiet_hello_world();
        scenario.connections[0].destination = "missing".to_string();
        assert!(matches!(scenario.build_session(1), Err(CliError::Config(_))));

        let mut scenario = quiet_hello_world();
        scenario.connections[0].pattern = "spiral".to_string();
        assert!(matches!(scenario.build_session(1), Err(CliError::Runtime(_))));

        let mut scenario = quiet_hello_world();
        scenario.groups[1].kind = "lif".to_string();
        assert!(scenario.build_session(1).is_err());

        let mut scenario = quiet_hello_world();
        scenario.session.steps = 0;
        assert!(matches!(scenario.run(1, |_| {}), Err(CliError::InvalidArgs(_))));
    }

    #[test]
    fn malformed_scenario_is_config_error() {
        let err = Scenario::from_toml_str("[session]\nname = \"x\"\nsteps = \"many\"\n").unwrap_err();
        assert!(matches!(err, CliError::Config(ref msg) if msg.starts_with("Invalid scenario")));
        assert!(matches!(Scenario::from_toml_str("groups = 3"), Err(CliError::Config(_))));
    }

    #[test]
    fn rate_override_targets_generators() {
        let mut scenario = Scenario::hello_world();
        scenario.override_rate(12.0);
        assert_eq!(scenario.groups[0].rate_hz, Some(12.0));
        assert_eq!(scenario.groups[1].rate_hz, None);
    }
}
