//! Simulation session for grid-structured spiking neural networks
//!
//! This crate exposes a small, strongly-typed configuration surface for
//! spiking networks: populations laid out on 3D lattices, declarative
//! connectivity rules, Poisson rate inputs, passive monitors, and a
//! fixed-step execution loop. The numerical kernel sits behind the
//! [`Engine`] trait; [`CpuEngine`] is the bundled reference implementation.
//!
//! ```rust
//! use spikegrid_runtime::{
//!     ConnectRule, Grid3D, IzhikevichParams, MonitorMode, NeuronType, Pattern,
//!     PoissonRate, RadiusRF, RangeDelay, RangeWeight, Session, SessionConfig,
//! };
//!
//! let mut sim = Session::new(SessionConfig::new("doc").with_seed(7)).unwrap();
//! let grid_in = Grid3D::new(4, 4, 1).unwrap();
//! let grid_out = Grid3D::new(2, 2, 1).unwrap();
//! let gin = sim.create_spike_generator_group("input", grid_in, NeuronType::Excitatory).unwrap();
//! let gout = sim.create_group("output", grid_out, NeuronType::Excitatory).unwrap();
//! sim.set_neuron_parameters(gout, IzhikevichParams::regular_spiking()).unwrap();
//! let rule = ConnectRule::new(Pattern::Gaussian)
//!     .with_weight(RangeWeight::fixed(0.05))
//!     .with_delay(RangeDelay::fixed(1))
//!     .with_radius(RadiusRF::new(3.0, 3.0, 1.0));
//! sim.connect(gin, gout, rule).unwrap();
//! sim.build().unwrap();
//!
//! sim.set_spike_monitor(gout, MonitorMode::Silent).unwrap();
//! let mut rates = PoissonRate::new(grid_in.num_neurons()).unwrap();
//! rates.set_rates(30.0).unwrap();
//! sim.set_spike_rate(gin, rates).unwrap();
//! sim.step(10, true).unwrap();
//! assert_eq!(sim.sim_time_ms(), 10);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod error;
pub mod ids;
pub mod topology;
pub mod neuron;
pub mod connectivity;
pub mod input;
pub mod monitor;
pub mod network;
pub mod engine;
pub mod session;

// Re-export essential types
pub use error::{Result, RuntimeError};
pub use ids::{ConnectionId, GroupId, Spike};
pub use topology::Grid3D;
pub use neuron::{ConductanceParams, IzhikevichParams, NeuronType, SynapseModel};
pub use connectivity::{ConnectRule, Pattern, RadiusRF, RangeDelay, RangeWeight};
pub use input::PoissonRate;
pub use monitor::{ConnectionMonitor, MonitorMode, SpikeMonitor, SpikeWindow, WeightWindow};
pub use network::{ConnectionSpec, GroupRole, GroupSpec, NetworkBlueprint};
pub use engine::{CpuEngine, Engine, EngineInputs, SynapseView, TickEvents};
pub use session::{ComputeMode, LoggerMode, Session, SessionConfig, SessionState, StepReport};

/// Length of one simulation tick in milliseconds
pub const TICK_MS: f32 = 1.0;

/// Longest synaptic delay (in ticks) a connection may request
pub const MAX_SYN_DELAY: u8 = 20;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_integration() {
        let params = IzhikevichParams::regular_spiking();
        assert!(params.validate().is_ok());

        let cond = ConductanceParams::default();
        assert!(cond.tau_ampa > 0.0);

        let config = SessionConfig::default();
        assert_eq!(config.mode, ComputeMode::Cpu);
    }
}
