//! Simulation session: configuration, build, and stepping

use core::fmt;
use core::str::FromStr;

use crate::{
    connectivity::ConnectRule,
    engine::{CpuEngine, Engine, EngineInputs},
    error::*,
    ids::{ConnectionId, GroupId},
    input::PoissonRate,
    monitor::{ConnectionMonitor, MonitorMode, SpikeMonitor},
    network::{GroupRole, GroupSpec, NetworkBlueprint},
    neuron::{ConductanceParams, IzhikevichParams, NeuronType},
    topology::Grid3D,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Where the simulation is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ComputeMode {
    /// Host CPU
    #[default]
    Cpu,
    /// Accelerator device; no backend is available in this build
    Gpu,
}

impl fmt::Display for ComputeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "CPU"),
            Self::Gpu => write!(f, "GPU"),
        }
    }
}

impl FromStr for ComputeMode {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CPU" | "CPU_MODE" => Ok(Self::Cpu),
            "GPU" | "GPU_MODE" => Ok(Self::Gpu),
            other => Err(RuntimeError::invalid_parameter("mode", other, "CPU | GPU")),
        }
    }
}

/// How chatty the session is on the `log` facade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LoggerMode {
    /// Lifecycle events and monitor summaries
    #[default]
    User,
    /// Everything `User` shows plus per-step detail at debug level
    Developer,
    /// Lifecycle events only
    Showtime,
    /// Nothing
    Silent,
}

impl LoggerMode {
    fn shows_lifecycle(&self) -> bool {
        !matches!(self, Self::Silent)
    }

    fn shows_summaries(&self) -> bool {
        matches!(self, Self::User | Self::Developer)
    }

    fn shows_detail(&self) -> bool {
        matches!(self, Self::Developer)
    }
}

impl FromStr for LoggerMode {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "USER" => Ok(Self::User),
            "DEVELOPER" | "DEV" => Ok(Self::Developer),
            "SHOWTIME" => Ok(Self::Showtime),
            "SILENT" => Ok(Self::Silent),
            other => Err(RuntimeError::invalid_parameter(
                "logger",
                other,
                "USER | DEVELOPER | SHOWTIME | SILENT",
            )),
        }
    }
}

/// Session construction parameters
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SessionConfig {
    /// Label used in log output
    pub name: String,
    /// Execution target
    pub mode: ComputeMode,
    /// Log verbosity
    pub logger: LoggerMode,
    /// Device ordinal (ignored on CPU)
    pub device_index: u32,
    /// Seed for every random draw the engine makes
    pub seed: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: "spikegrid".to_string(),
            mode: ComputeMode::Cpu,
            logger: LoggerMode::User,
            device_index: 0,
            seed: 42,
        }
    }
}

impl SessionConfig {
    /// Default configuration with a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the execution target
    pub fn with_mode(mut self, mode: ComputeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set log verbosity
    pub fn with_logger(mut self, logger: LoggerMode) -> Self {
        self.logger = logger;
        self
    }

    /// Set the device ordinal
    pub fn with_device(mut self, device_index: u32) -> Self {
        self.device_index = device_index;
        self
    }

    /// Set the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Groups and connections may still be added
    Configuring,
    /// Network instantiated; monitors and stepping available
    Built,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuring => write!(f, "configuring"),
            Self::Built => write!(f, "built"),
        }
    }
}

/// Outcome of one `step` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepReport {
    /// Simulated time before the call (ms)
    pub start_ms: u64,
    /// Simulated time after the call (ms)
    pub end_ms: u64,
    /// Spikes emitted by all groups during the call
    pub spike_count: u64,
    /// Monitor windows closed at the end of the call
    pub windows_closed: usize,
}

/// Handle owning a network, its monitors, and its input sources
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    state: SessionState,
    blueprint: NetworkBlueprint,
    engine: Box<dyn Engine>,
    rates: Vec<Option<PoissonRate>>,
    spike_monitors: Vec<Option<SpikeMonitor>>,
    connection_monitors: Vec<Option<ConnectionMonitor>>,
}

impl Session {
    /// Create a session backed by the reference CPU engine
    pub fn new(config: SessionConfig) -> Result<Self> {
        if config.mode == ComputeMode::Gpu {
            return Err(RuntimeError::resource_exhausted(
                format!("GPU device {}", config.device_index),
                "no accelerator backend available",
            ));
        }
        Ok(Self::with_engine(config, Box::new(CpuEngine::new())))
    }

    /// Create a session backed by a caller-supplied engine
    pub fn with_engine(config: SessionConfig, engine: Box<dyn Engine>) -> Self {
        if config.logger.shows_lifecycle() {
            log::info!(
                "Session '{}' created ({} mode, {} engine, seed {})",
                config.name,
                config.mode,
                engine.name(),
                config.seed
            );
        }
        Self {
            config,
            state: SessionState::Configuring,
            blueprint: NetworkBlueprint::new(),
            engine,
            rates: Vec::new(),
            spike_monitors: Vec::new(),
            connection_monitors: Vec::new(),
        }
    }

    /// Session name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Construction parameters
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether `build` has succeeded
    pub fn is_built(&self) -> bool {
        self.state == SessionState::Built
    }

    fn require_configuring(&self, operation: &str) -> Result<()> {
        match self.state {
            SessionState::Configuring => Ok(()),
            state => Err(RuntimeError::precondition(operation, state.to_string())),
        }
    }

    fn require_built(&self, operation: &str) -> Result<()> {
        match self.state {
            SessionState::Built => Ok(()),
            state => Err(RuntimeError::precondition(operation, state.to_string())),
        }
    }

    fn add_group(
        &mut self,
        operation: &str,
        name: &str,
        role: GroupRole,
        grid: Grid3D,
        neuron_type: NeuronType,
    ) -> Result<GroupId> {
        self.require_configuring(operation)?;
        let id = self.blueprint.add_group(name, role, neuron_type, grid)?;
        self.rates.push(None);
        if self.config.logger.shows_detail() {
            log::debug!("Created {} group {} '{}' ({}, {})", role, id, name, grid, neuron_type);
        }
        Ok(id)
    }

    /// Create a group of Izhikevich neurons
    pub fn create_group(&mut self, name: &str, grid: Grid3D, neuron_type: NeuronType) -> Result<GroupId> {
        self.add_group("create_group", name, GroupRole::Computational, grid, neuron_type)
    }

    /// Create a group whose spikes come from a rate source
    pub fn create_spike_generator_group(
        &mut self,
        name: &str,
        grid: Grid3D,
        neuron_type: NeuronType,
    ) -> Result<GroupId> {
        self.add_group(
            "create_spike_generator_group",
            name,
            GroupRole::Generator,
            grid,
            neuron_type,
        )
    }

    /// Assign Izhikevich parameters to a computational group
    pub fn set_neuron_parameters(&mut self, group: GroupId, params: IzhikevichParams) -> Result<()> {
        self.require_configuring("set_neuron_parameters")?;
        self.blueprint.set_neuron_parameters(group, params)
    }

    /// Connect two groups with a rule expanded at build
    pub fn connect(&mut self, source: GroupId, destination: GroupId, rule: ConnectRule) -> Result<ConnectionId> {
        self.require_configuring("connect")?;
        let id = self.blueprint.add_connection(source, destination, rule)?;
        if self.config.logger.shows_detail() {
            log::debug!("Connection {}: {} -> {}", id, source, destination);
        }
        Ok(id)
    }

    /// Switch between conductance-based and current-based synapses
    pub fn set_conductances(&mut self, enabled: bool) -> Result<()> {
        self.set_conductances_with(enabled, ConductanceParams::default())
    }

    /// Like [`Session::set_conductances`] with explicit time constants
    pub fn set_conductances_with(&mut self, enabled: bool, params: ConductanceParams) -> Result<()> {
        self.require_configuring("set_conductances")?;
        self.blueprint.set_conductances(enabled.then_some(params))
    }

    /// Instantiate the network; on failure the session stays configuring
    pub fn build(&mut self) -> Result<()> {
        self.require_configuring("build")?;
        self.blueprint.validate()?;
        self.engine.build(&self.blueprint, self.config.seed)?;

        self.spike_monitors = vec![None; self.blueprint.groups().len()];
        self.connection_monitors = vec![None; self.blueprint.connections().len()];
        self.state = SessionState::Built;

        if self.config.logger.shows_lifecycle() {
            log::info!(
                "Session '{}' built: {} groups, {} neurons, {} connections, {} synapses ({})",
                self.config.name,
                self.num_groups(),
                self.num_neurons(),
                self.num_connections(),
                self.engine.num_synapses(),
                if self.blueprint.conductances().is_some() {
                    "COBA"
                } else {
                    "CUBA"
                }
            );
        }
        Ok(())
    }

    /// Attach a spike monitor to a group
    pub fn set_spike_monitor(&mut self, group: GroupId, mode: MonitorMode) -> Result<&SpikeMonitor> {
        self.require_built("set_spike_monitor")?;
        let spec = self.blueprint.group(group)?;
        let slot = self
            .spike_monitors
            .get_mut(group.index())
            .ok_or(RuntimeError::UnknownGroup { group })?;
        if slot.is_some() {
            return Err(RuntimeError::invalid_config(format!(
                "group '{}' already has a spike monitor",
                spec.name
            )));
        }
        let now = self.engine.time_ms();
        Ok(slot.insert(SpikeMonitor::new(group, spec.name.clone(), spec.num_neurons(), mode, now)))
    }

    /// Attach a connection monitor to the connection between two groups
    pub fn set_connection_monitor(
        &mut self,
        source: GroupId,
        destination: GroupId,
        mode: MonitorMode,
    ) -> Result<&ConnectionMonitor> {
        self.require_built("set_connection_monitor")?;
        let src = self.blueprint.group(source)?;
        let dst = self.blueprint.group(destination)?;
        let conn = self.blueprint.find_connection(source, destination).ok_or_else(|| {
            RuntimeError::invalid_config(format!(
                "groups '{}' and '{}' are not connected",
                src.name, dst.name
            ))
        })?;
        let id = conn.id;
        let synapses = self.engine.connection_synapses(id)?;
        let label = format!("{}->{}", src.name, dst.name);
        let (num_pre, num_post) = (src.num_neurons(), dst.num_neurons());

        let slot = self
            .connection_monitors
            .get_mut(id.index())
            .ok_or_else(|| RuntimeError::invalid_config(format!("connection {} does not exist", id)))?;
        if slot.is_some() {
            return Err(RuntimeError::invalid_config(format!(
                "connection '{}' already has a monitor",
                label
            )));
        }
        let now = self.engine.time_ms();
        Ok(slot.insert(ConnectionMonitor::new(
            id,
            source,
            destination,
            label,
            num_pre,
            num_post,
            mode,
            now,
            &synapses,
        )))
    }

    /// Attach (or replace) the rate source driving a generator group
    ///
    /// Allowed in any state so rates can change between steps.
    pub fn set_spike_rate(&mut self, group: GroupId, rates: PoissonRate) -> Result<()> {
        let spec = self.blueprint.group(group)?;
        if !spec.is_generator() {
            return Err(RuntimeError::invalid_config(format!(
                "group '{}' is not a spike generator",
                spec.name
            )));
        }
        if rates.len() != spec.num_neurons() {
            return Err(RuntimeError::invalid_config(format!(
                "rate source has {} entries but group '{}' has {} neurons",
                rates.len(),
                spec.name,
                spec.num_neurons()
            )));
        }
        let slot = self
            .rates
            .get_mut(group.index())
            .ok_or(RuntimeError::UnknownGroup { group })?;
        *slot = Some(rates);
        Ok(())
    }

    /// Rate source attached to a group
    pub fn spike_rate(&self, group: GroupId) -> Option<&PoissonRate> {
        self.rates.get(group.index()).and_then(Option::as_ref)
    }

    /// Mutable access to a group's rate source; its length cannot change
    pub fn spike_rate_mut(&mut self, group: GroupId) -> Option<&mut PoissonRate> {
        self.rates.get_mut(group.index()).and_then(Option::as_mut)
    }

    /// Advance the simulation by `num_steps` ticks of 1 ms
    ///
    /// With `report` set, every monitor closes its current window at the end
    /// of the call.
    pub fn step(&mut self, num_steps: u32, report: bool) -> Result<StepReport> {
        self.require_built("step")?;
        if num_steps == 0 {
            return Err(RuntimeError::invalid_parameter("num_steps", "0", "> 0"));
        }

        let start_ms = self.engine.time_ms();
        let mut spike_count = 0u64;
        for _ in 0..num_steps {
            let events = self.engine.tick(&EngineInputs { rates: &self.rates })?;
            spike_count += events.spikes.len() as u64;
            for spike in &events.spikes {
                if let Some(Some(monitor)) = self.spike_monitors.get_mut(spike.group.index()) {
                    monitor.record(spike.neuron, spike.time_ms);
                }
            }
            for (index, &count) in events.transmitted.iter().enumerate() {
                if count == 0 {
                    continue;
                }
                if let Some(Some(monitor)) = self.connection_monitors.get_mut(index) {
                    monitor.record_transmissions(count);
                }
            }
        }
        let end_ms = self.engine.time_ms();

        let windows_closed = if report { self.close_windows(end_ms)? } else { 0 };

        if self.config.logger.shows_detail() {
            log::debug!(
                "Stepped {} ticks [{}, {}) ms: {} spikes",
                num_steps,
                start_ms,
                end_ms,
                spike_count
            );
        }

        Ok(StepReport {
            start_ms,
            end_ms,
            spike_count,
            windows_closed,
        })
    }

    /// Run for `secs` seconds plus `ms` milliseconds
    pub fn run(&mut self, secs: u32, ms: u32, report: bool) -> Result<StepReport> {
        let total = secs
            .checked_mul(1000)
            .and_then(|t| t.checked_add(ms))
            .ok_or_else(|| {
                RuntimeError::invalid_parameter("duration", format!("{}s {}ms", secs, ms), "fits in u32 ms")
            })?;
        self.step(total, report)
    }

    fn close_windows(&mut self, end_ms: u64) -> Result<usize> {
        let summaries = self.config.logger.shows_summaries();
        let mut closed = 0;

        for monitor in self.spike_monitors.iter_mut().flatten() {
            let window = monitor.close_window(end_ms).clone();
            closed += 1;
            if summaries && monitor.mode().logs_windows() {
                log::info!("Spike monitor '{}': {}", monitor.group_name(), window);
            }
        }

        let plastic = self.engine.is_plastic();
        for monitor in self.connection_monitors.iter_mut().flatten() {
            let synapses = if plastic {
                Some(self.engine.connection_synapses(monitor.connection())?)
            } else {
                None
            };
            let window = monitor.close_window(end_ms, synapses.as_deref()).clone();
            closed += 1;
            if summaries && monitor.mode().logs_windows() {
                log::info!("Connection monitor '{}': {}", monitor.label(), window);
            }
        }

        Ok(closed)
    }

    /// Number of groups created so far
    pub fn num_groups(&self) -> usize {
        self.blueprint.groups().len()
    }

    /// Number of connections created so far
    pub fn num_connections(&self) -> usize {
        self.blueprint.connections().len()
    }

    /// Neurons over all groups
    pub fn num_neurons(&self) -> usize {
        self.blueprint.num_neurons()
    }

    /// Synapses instantiated by build (zero before)
    pub fn num_synapses(&self) -> usize {
        self.engine.num_synapses()
    }

    /// Description of a group
    pub fn group_info(&self, group: GroupId) -> Result<&GroupSpec> {
        self.blueprint.group(group)
    }

    /// Handle of a group by name
    pub fn group_id(&self, name: &str) -> Option<GroupId> {
        self.blueprint.group_by_name(name)
    }

    /// Neuron count of a group
    pub fn group_num_neurons(&self, group: GroupId) -> Result<usize> {
        self.blueprint.group(group).map(GroupSpec::num_neurons)
    }

    /// Simulated time (ms)
    pub fn sim_time_ms(&self) -> u64 {
        self.engine.time_ms()
    }

    /// Spike monitor of a group, if attached
    pub fn spike_monitor(&self, group: GroupId) -> Option<&SpikeMonitor> {
        self.spike_monitors.get(group.index()).and_then(Option::as_ref)
    }

    /// Monitor of the connection between two groups, if attached
    pub fn connection_monitor(&self, source: GroupId, destination: GroupId) -> Option<&ConnectionMonitor> {
        let conn = self.blueprint.find_connection(source, destination)?;
        self.connection_monitors.get(conn.id.index()).and_then(Option::as_ref)
    }
}
