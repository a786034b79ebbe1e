//! Engine boundary
//!
//! A [`Session`](crate::Session) validates calls and tracks lifecycle; the
//! numbers are produced by an [`Engine`]. Engines receive a finished
//! [`NetworkBlueprint`] at build time and are then driven one tick at a time.

use core::fmt;

use crate::{
    error::*,
    ids::{ConnectionId, GroupId, Spike},
    input::PoissonRate,
    network::NetworkBlueprint,
};

mod cpu;
mod kernel;

pub use cpu::CpuEngine;

/// Read-only view of one synapse, indices local to the connected groups
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynapseView {
    /// Pre-synaptic neuron index within the source group
    pub pre: u32,
    /// Post-synaptic neuron index within the destination group
    pub post: u32,
    /// Weight magnitude
    pub weight: f32,
    /// Delay in ticks
    pub delay: u8,
}

/// External drive available to the engine during one tick
#[derive(Debug, Clone, Copy)]
pub struct EngineInputs<'a> {
    /// Rate sources indexed by group position; `None` for undriven groups
    pub rates: &'a [Option<PoissonRate>],
}

impl<'a> EngineInputs<'a> {
    /// Inputs with no rate sources at all
    pub fn none() -> Self {
        Self { rates: &[] }
    }

    /// Rate source attached to a group
    pub fn rate_for(&self, group: GroupId) -> Option<&'a PoissonRate> {
        self.rates.get(group.index()).and_then(Option::as_ref)
    }
}

/// Everything that happened during one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickEvents {
    /// Tick that was simulated (ms)
    pub time_ms: u64,
    /// Spikes emitted during the tick
    pub spikes: Vec<Spike>,
    /// Synaptic events delivered per connection, indexed by connection position
    pub transmitted: Vec<u64>,
}

/// Simulation kernel behind a session
pub trait Engine: fmt::Debug + Send {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Instantiate neurons and synapses; must leave the engine untouched on error
    fn build(&mut self, blueprint: &NetworkBlueprint, seed: u64) -> Result<()>;

    /// Whether `build` has succeeded
    fn is_built(&self) -> bool;

    /// Advance by one tick
    fn tick(&mut self, inputs: &EngineInputs<'_>) -> Result<TickEvents>;

    /// Ticks simulated so far
    fn time_ms(&self) -> u64;

    /// Number of synapses over all connections
    fn num_synapses(&self) -> usize;

    /// Current synapses of one connection
    fn connection_synapses(&self, connection: ConnectionId) -> Result<Vec<SynapseView>>;

    /// Whether synaptic weights can change after build
    ///
    /// Monitors re-read weights at every window close only when this holds.
    fn is_plastic(&self) -> bool {
        false
    }
}
