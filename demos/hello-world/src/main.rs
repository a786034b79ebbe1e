use anyhow::Result;
use spikegrid_runtime::{
    ComputeMode, ConnectRule, Grid3D, IzhikevichParams, LoggerMode, MonitorMode, NeuronType,
    Pattern, PoissonRate, RadiusRF, RangeDelay, RangeWeight, Session, SessionConfig,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Runtime logs go through the `log` facade; tracing-subscriber picks them up
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    // Keep a handle to the network
    let config = SessionConfig::new("hello world")
        .with_mode(ComputeMode::Cpu)
        .with_logger(LoggerMode::User);
    let mut sim = Session::new(config)?;

    // Configure the network: a 13x9 input layer and a 3x3 output layer
    let grid_in = Grid3D::new(13, 9, 1)?;
    let grid_out = Grid3D::new(3, 3, 1)?;
    let gin = sim.create_spike_generator_group("input", grid_in, NeuronType::Excitatory)?;
    let gout = sim.create_group("output", grid_out, NeuronType::Excitatory)?;
    sim.set_neuron_parameters(gout, IzhikevichParams::new(0.02, 0.2, -65.0, 8.0)?)?;

    // Gaussian receptive field: each output neuron sees a 3x3 patch of input
    let rule = ConnectRule::new(Pattern::Gaussian)
        .with_weight(RangeWeight::fixed(0.05))
        .with_probability(1.0)
        .with_delay(RangeDelay::fixed(1))
        .with_radius(RadiusRF::new(3.0, 3.0, 1.0));
    sim.connect(gin, gout, rule)?;
    sim.set_conductances(true)?;

    // Build the network
    sim.build()?;

    // Set some monitors
    sim.set_spike_monitor(gin, MonitorMode::Default)?;
    sim.set_spike_monitor(gout, MonitorMode::Default)?;
    sim.set_connection_monitor(gin, gout, MonitorMode::Default)?;

    // Set up Poisson input at 30 Hz on every input neuron
    let mut input = PoissonRate::new(grid_in.num_neurons())?;
    input.set_rates(30.0)?;
    sim.set_spike_rate(gin, input)?;

    // Run for 1000 ms, one tick at a time, reporting after every tick
    for _ in 0..1000 {
        sim.step(1, true)?;
    }

    if let Some(monitor) = sim.spike_monitor(gout) {
        println!(
            "output: {} spikes over {} windows ({:.2} Hz)",
            monitor.total_spike_count(),
            monitor.num_windows(),
            monitor.mean_rate_hz()
        );
    }
    Ok(())
}
