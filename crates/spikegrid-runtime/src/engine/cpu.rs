//! Reference single-host engine

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::{kernel, Engine, EngineInputs, SynapseView, TickEvents};
use crate::{
    error::*,
    ids::{ConnectionId, GroupId, Spike},
    network::{GroupRole, NetworkBlueprint},
    neuron::{IzhikevichNeuron, IzhikevichParams, SynapseModel},
    MAX_SYN_DELAY, TICK_MS,
};

/// Slots in the delay ring; a spike scheduled `MAX_SYN_DELAY` ticks ahead
/// never lands in the slot being drained
const RING_SLOTS: usize = MAX_SYN_DELAY as usize + 1;

#[derive(Debug, Clone)]
struct GroupLayout {
    id: GroupId,
    role: GroupRole,
    /// First global neuron index
    offset: usize,
    len: usize,
    /// First index into the neuron state vector (computational groups)
    first_state: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct Synapse {
    connection: u32,
    pre: u32,
    post: u32,
    /// Index into the neuron state vector of the target
    target: usize,
    weight: f32,
    delay: u8,
    inhibitory: bool,
}

/// Instantiated network, replaced wholesale by a successful build
#[derive(Debug)]
struct Network {
    groups: Vec<GroupLayout>,
    neurons: Vec<IzhikevichNeuron>,
    /// (group position, local index) for every entry of `neurons`
    state_owner: Vec<(usize, u32)>,
    synapses: Vec<Synapse>,
    /// Synapse range per connection position
    connection_ranges: Vec<std::ops::Range<usize>>,
    /// Outgoing synapse indices per global neuron index
    outgoing: Vec<Vec<u32>>,
    model: SynapseModel,
}

/// Izhikevich network integrated on the host CPU with a fixed 1 ms tick
#[derive(Debug, Default)]
pub struct CpuEngine {
    network: Option<Network>,
    ring: Vec<Vec<u32>>,
    rng: Option<ChaCha8Rng>,
    time_ms: u64,
}

impl CpuEngine {
    /// Create an engine with nothing built
    pub fn new() -> Self {
        Self::default()
    }

    fn network(&self) -> Result<&Network> {
        self.network
            .as_ref()
            .ok_or_else(|| RuntimeError::precondition("engine access", "not built"))
    }
}

fn draw_neuron<R: Rng + ?Sized>(params: &IzhikevichParams, rng: &mut R) -> IzhikevichNeuron {
    if !params.is_heterogeneous() {
        return IzhikevichNeuron::from_params(params);
    }
    let mut spread = |mean: f32, sd: f32| {
        if sd > 0.0 {
            let z: f32 = StandardNormal.sample(&mut *rng);
            mean + sd * z
        } else {
            mean
        }
    };
    let a = spread(params.a, params.a_sd);
    let b = spread(params.b, params.b_sd);
    let c = spread(params.c, params.c_sd);
    let d = spread(params.d, params.d_sd);
    IzhikevichNeuron::new(a, b, c, d)
}

impl Engine for CpuEngine {
    fn name(&self) -> &str {
        "cpu"
    }

    fn build(&mut self, blueprint: &NetworkBlueprint, seed: u64) -> Result<()> {
        if self.network.is_some() {
            return Err(RuntimeError::precondition("build", "built"));
        }
        blueprint.validate()?;

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut groups = Vec::with_capacity(blueprint.groups().len());
        let mut neurons = Vec::new();
        let mut state_owner = Vec::new();
        let mut offset = 0usize;

        for (pos, spec) in blueprint.groups().iter().enumerate() {
            let len = spec.num_neurons();
            // `validate` guarantees every computational group has parameters
            let first_state = match (spec.role, &spec.params) {
                (GroupRole::Computational, Some(params)) => {
                    let first = neurons.len();
                    for local in 0..len {
                        neurons.push(draw_neuron(params, &mut rng));
                        state_owner.push((pos, local as u32));
                    }
                    Some(first)
                }
                _ => None,
            };
            groups.push(GroupLayout {
                id: spec.id,
                role: spec.role,
                offset,
                len,
                first_state,
            });
            offset += len;
        }

        let mut synapses: Vec<Synapse> = Vec::new();
        let mut connection_ranges = Vec::with_capacity(blueprint.connections().len());
        let mut outgoing = vec![Vec::new(); offset];

        for conn in blueprint.connections() {
            let src = blueprint.group(conn.source)?;
            let dst = blueprint.group(conn.destination)?;
            let src_layout = &groups[conn.source.index()];
            let first_target = groups[conn.destination.index()].first_state.ok_or_else(|| {
                RuntimeError::invalid_config(format!(
                    "connection {} targets generator group '{}'",
                    conn.id, dst.name
                ))
            })?;

            let drafts = kernel::expand(
                &conn.rule,
                &src.grid,
                &dst.grid,
                conn.source == conn.destination,
                &mut rng,
            );
            let start = synapses.len();
            if start + drafts.len() > u32::MAX as usize {
                return Err(RuntimeError::resource_exhausted(
                    "synapses",
                    u32::MAX.to_string(),
                ));
            }

            for draft in drafts {
                let index = synapses.len() as u32;
                outgoing[src_layout.offset + draft.pre as usize].push(index);
                synapses.push(Synapse {
                    connection: conn.id.raw(),
                    pre: draft.pre,
                    post: draft.post,
                    target: first_target + draft.post as usize,
                    weight: draft.weight,
                    delay: draft.delay,
                    inhibitory: src.neuron_type.is_inhibitory(),
                });
            }
            log::debug!(
                "Connection {} ({} -> {}, {}): {} synapses",
                conn.id,
                src.name,
                dst.name,
                conn.rule.pattern,
                synapses.len() - start
            );
            connection_ranges.push(start..synapses.len());
        }

        log::debug!(
            "Built {} groups, {} neurons ({} integrated), {} synapses",
            groups.len(),
            offset,
            neurons.len(),
            synapses.len()
        );

        self.network = Some(Network {
            groups,
            neurons,
            state_owner,
            synapses,
            connection_ranges,
            outgoing,
            model: blueprint.synapse_model(),
        });
        self.ring = vec![Vec::new(); RING_SLOTS];
        self.rng = Some(rng);
        self.time_ms = 0;
        Ok(())
    }

    fn is_built(&self) -> bool {
        self.network.is_some()
    }

    fn tick(&mut self, inputs: &EngineInputs<'_>) -> Result<TickEvents> {
        let now = self.time_ms;
        let network = self
            .network
            .as_mut()
            .ok_or_else(|| RuntimeError::precondition("tick", "not built"))?;
        let rng = self
            .rng
            .as_mut()
            .ok_or_else(|| RuntimeError::precondition("tick", "not built"))?;
        let slot = (now % RING_SLOTS as u64) as usize;
        let mut transmitted = vec![0u64; network.connection_ranges.len()];

        // Deliver everything due this tick
        let due = std::mem::take(&mut self.ring[slot]);
        for &index in &due {
            let syn = network.synapses[index as usize];
            network.neurons[syn.target].receive(syn.weight, syn.inhibitory, &network.model);
            transmitted[syn.connection as usize] += 1;
        }
        // Keep the slot's allocation for reuse
        self.ring[slot] = due;
        self.ring[slot].clear();

        let mut fired: Vec<usize> = Vec::new();
        let mut spikes = Vec::new();

        // Generators draw from their rate source
        for layout in network.groups.iter().filter(|g| g.role == GroupRole::Generator) {
            let Some(rates) = inputs.rate_for(layout.id) else {
                continue;
            };
            if rates.len() != layout.len {
                return Err(RuntimeError::simulation_step(
                    now,
                    format!(
                        "rate source for {} has {} entries, group has {} neurons",
                        layout.id,
                        rates.len(),
                        layout.len
                    ),
                ));
            }
            for local in 0..layout.len {
                let p = rates.spike_probability(local, TICK_MS);
                if p > 0.0 && rng.gen::<f32>() < p {
                    fired.push(layout.offset + local);
                    spikes.push(Spike::new(layout.id, local as u32, now));
                }
            }
        }

        // Integrate computational neurons
        let model = network.model;
        #[cfg(feature = "parallel")]
        let updates: Result<Vec<bool>> = network
            .neurons
            .par_iter_mut()
            .map(|neuron| neuron.update(&model))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let updates: Result<Vec<bool>> = network
            .neurons
            .iter_mut()
            .map(|neuron| neuron.update(&model))
            .collect();

        let updates = updates.map_err(|e| RuntimeError::simulation_step(now, e.to_string()))?;
        for (state, did_fire) in updates.into_iter().enumerate() {
            if !did_fire {
                continue;
            }
            let (pos, local) = network.state_owner[state];
            let layout = &network.groups[pos];
            fired.push(layout.offset + local as usize);
            spikes.push(Spike::new(layout.id, local, now));
        }

        // Schedule deliveries
        for global in fired {
            for &index in &network.outgoing[global] {
                let delay = network.synapses[index as usize].delay as u64;
                let target_slot = ((now + delay) % RING_SLOTS as u64) as usize;
                self.ring[target_slot].push(index);
            }
        }

        self.time_ms += 1;
        Ok(TickEvents {
            time_ms: now,
            spikes,
            transmitted,
        })
    }

    fn time_ms(&self) -> u64 {
        self.time_ms
    }

    fn num_synapses(&self) -> usize {
        self.network.as_ref().map_or(0, |n| n.synapses.len())
    }

    fn connection_synapses(&self, connection: ConnectionId) -> Result<Vec<SynapseView>> {
        let network = self.network()?;
        let range = network
            .connection_ranges
            .get(connection.index())
            .cloned()
            .ok_or_else(|| {
                RuntimeError::invalid_config(format!("connection {} does not exist", connection))
            })?;
        Ok(network.synapses[range]
            .iter()
            .map(|s| SynapseView {
                pre: s.pre,
                post: s.post,
                weight: s.weight,
                delay: s.delay,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        connectivity::{ConnectRule, Pattern, RangeDelay, RangeWeight},
        input::PoissonRate,
        neuron::NeuronType,
        topology::Grid3D,
    };

    fn relay(delay: u8, weight: f32) -> NetworkBlueprint {
        let mut bp = NetworkBlueprint::new();
        let gen = bp
            .add_group("in", GroupRole::Generator, NeuronType::Excitatory, Grid3D::new(1, 1, 1).unwrap())
            .unwrap();
        let out = bp
            .add_group("out", GroupRole::Computational, NeuronType::Excitatory, Grid3D::new(1, 1, 1).unwrap())
            .unwrap();
        bp.set_neuron_parameters(out, IzhikevichParams::regular_spiking()).unwrap();
        let rule = ConnectRule::new(Pattern::OneToOne)
            .with_weight(RangeWeight::fixed(weight))
            .with_delay(RangeDelay::fixed(delay));
        bp.add_connection(gen, out, rule).unwrap();
        bp
    }

    #[test]
    fn test_tick_requires_build() {
        let mut engine = CpuEngine::new();
        assert!(!engine.is_built());
        assert!(engine.tick(&EngineInputs::none()).is_err());
        assert_eq!(engine.num_synapses(), 0);
    }

    #[test]
    fn test_build_once() {
        let bp = relay(1, 1.0);
        let mut engine = CpuEngine::new();
        engine.build(&bp, 1).unwrap();
        assert!(engine.is_built());
        assert_eq!(engine.num_synapses(), 1);
        let err = engine.build(&bp, 1).unwrap_err();
        assert!(err.is_precondition_violation());
    }

    #[test]
    fn test_failed_build_leaves_engine_empty() {
        let mut bp = NetworkBlueprint::new();
        bp.add_group("out", GroupRole::Computational, NeuronType::Excitatory, Grid3D::new(2, 2, 1).unwrap())
            .unwrap();
        let mut engine = CpuEngine::new();
        let err = engine.build(&bp, 1).unwrap_err();
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("no neuron parameters"));
        assert!(!engine.is_built());
        assert_eq!(engine.num_synapses(), 0);
    }

    #[test]
    fn test_delay_is_respected() {
        let delay = 5;
        let bp = relay(delay, 2.0);
        let mut engine = CpuEngine::new();
        engine.build(&bp, 3).unwrap();

        let mut rate = PoissonRate::new(1).unwrap();
        rate.set_rates(1000.0).unwrap();
        let rates = vec![Some(rate), None];
        let inputs = EngineInputs { rates: &rates };

        let first = engine.tick(&inputs).unwrap();
        assert_eq!(first.time_ms, 0);
        assert_eq!(first.spikes.len(), 1);
        assert_eq!(first.transmitted, vec![0]);

        // Silence the generator and wait for the one spike to arrive
        let silent = vec![None, None];
        let inputs = EngineInputs { rates: &silent };
        for t in 1..delay as u64 {
            assert_eq!(engine.tick(&inputs).unwrap().transmitted, vec![0], "tick {}", t);
        }
        let arrival = engine.tick(&inputs).unwrap();
        assert_eq!(arrival.time_ms, delay as u64);
        assert_eq!(arrival.transmitted, vec![1]);
        assert_eq!(engine.time_ms(), delay as u64 + 1);
    }

    #[test]
    fn test_rate_length_mismatch_fails_tick() {
        let bp = relay(1, 1.0);
        let mut engine = CpuEngine::new();
        engine.build(&bp, 3).unwrap();
        let rates = vec![Some(PoissonRate::new(4).unwrap()), None];
        let err = engine.tick(&EngineInputs { rates: &rates }).unwrap_err();
        assert!(matches!(err, RuntimeError::SimulationStep { .. }));
    }

    #[test]
    fn test_strong_drive_makes_output_fire() {
        let bp = relay(1, 20.0);
        let mut engine = CpuEngine::new();
        engine.build(&bp, 11).unwrap();
        let mut rate = PoissonRate::new(1).unwrap();
        rate.set_rates(1000.0).unwrap();
        let rates = vec![Some(rate), None];
        let inputs = EngineInputs { rates: &rates };

        let out_spikes: usize = (0..100)
            .map(|_| engine.tick(&inputs).unwrap())
            .map(|ev| ev.spikes.iter().filter(|s| s.group == GroupId::new(1)).count())
            .sum();
        assert!(out_spikes > 0);
    }

    #[test]
    fn test_heterogeneous_parameters_drawn() {
        let mut bp = NetworkBlueprint::new();
        let g = bp
            .add_group("pop", GroupRole::Computational, NeuronType::Excitatory, Grid3D::new(10, 1, 1).unwrap())
            .unwrap();
        let params = IzhikevichParams::with_spread(0.02, 0.0, 0.2, 0.0, -65.0, 5.0, 8.0, 0.0).unwrap();
        bp.set_neuron_parameters(g, params).unwrap();
        let mut engine = CpuEngine::new();
        engine.build(&bp, 5).unwrap();
        let network = engine.network().unwrap();
        let resets: Vec<f32> = network.neurons.iter().map(|n| n.c).collect();
        assert!(resets.iter().any(|&c| c != resets[0]));
        assert!(network.neurons.iter().all(|n| n.a == 0.02));
    }

    #[test]
    fn test_connection_synapses_view() {
        let bp = relay(3, 0.5);
        let mut engine = CpuEngine::new();
        engine.build(&bp, 1).unwrap();
        let view = engine.connection_synapses(ConnectionId::new(0)).unwrap();
        assert_eq!(
            view,
            vec![SynapseView {
                pre: 0,
                post: 0,
                weight: 0.5,
                delay: 3
            }]
        );
        assert!(engine.connection_synapses(ConnectionId::new(4)).is_err());
    }
}
