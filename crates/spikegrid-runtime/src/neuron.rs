//! Neuron and synapse models used by the reference engine

use core::fmt;
use core::str::FromStr;

use crate::error::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Membrane potential at which a spike is registered (mV)
pub const SPIKE_PEAK_MV: f32 = 30.0;

/// Number of sub-steps the membrane equation is split into per tick
const HALF_STEPS: usize = 2;

/// Sign of the synapses a group projects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NeuronType {
    /// Projects excitatory (AMPA/NMDA) synapses
    Excitatory,
    /// Projects inhibitory (GABAa/GABAb) synapses
    Inhibitory,
}

impl NeuronType {
    /// Whether the group's outgoing synapses are inhibitory
    pub fn is_inhibitory(&self) -> bool {
        matches!(self, Self::Inhibitory)
    }
}

impl fmt::Display for NeuronType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Excitatory => write!(f, "excitatory"),
            Self::Inhibitory => write!(f, "inhibitory"),
        }
    }
}

impl FromStr for NeuronType {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "excitatory" | "excitatory_neuron" => Ok(Self::Excitatory),
            "inhibitory" | "inhibitory_neuron" => Ok(Self::Inhibitory),
            other => Err(RuntimeError::invalid_parameter(
                "neuron_type",
                other,
                "excitatory | inhibitory",
            )),
        }
    }
}

/// Parameters of the Izhikevich (2003) model
///
/// Each `*_sd` field is the standard deviation of a per-neuron Gaussian
/// spread around the mean; zero gives a homogeneous population.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IzhikevichParams {
    /// Recovery time scale
    pub a: f32,
    /// Spread of `a`
    pub a_sd: f32,
    /// Recovery sensitivity to the membrane potential
    pub b: f32,
    /// Spread of `b`
    pub b_sd: f32,
    /// After-spike reset potential (mV)
    pub c: f32,
    /// Spread of `c`
    pub c_sd: f32,
    /// After-spike recovery increment
    pub d: f32,
    /// Spread of `d`
    pub d_sd: f32,
}

impl Default for IzhikevichParams {
    fn default() -> Self {
        Self::regular_spiking()
    }
}

impl IzhikevichParams {
    /// Create homogeneous parameters with validation
    pub fn new(a: f32, b: f32, c: f32, d: f32) -> Result<Self> {
        Self::with_spread(a, 0.0, b, 0.0, c, 0.0, d, 0.0)
    }

    /// Create parameters with a per-neuron spread
    #[allow(clippy::too_many_arguments)]
    pub fn with_spread(
        a: f32,
        a_sd: f32,
        b: f32,
        b_sd: f32,
        c: f32,
        c_sd: f32,
        d: f32,
        d_sd: f32,
    ) -> Result<Self> {
        let params = Self {
            a,
            a_sd,
            b,
            b_sd,
            c,
            c_sd,
            d,
            d_sd,
        };
        params.validate()?;
        Ok(params)
    }

    /// Regular-spiking excitatory cortical cell
    pub const fn regular_spiking() -> Self {
        Self {
            a: 0.02,
            a_sd: 0.0,
            b: 0.2,
            b_sd: 0.0,
            c: -65.0,
            c_sd: 0.0,
            d: 8.0,
            d_sd: 0.0,
        }
    }

    /// Fast-spiking inhibitory interneuron
    pub const fn fast_spiking() -> Self {
        Self {
            a: 0.1,
            a_sd: 0.0,
            b: 0.2,
            b_sd: 0.0,
            c: -65.0,
            c_sd: 0.0,
            d: 2.0,
            d_sd: 0.0,
        }
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        let means = [("izh_a", self.a), ("izh_b", self.b), ("izh_c", self.c), ("izh_d", self.d)];
        for (name, value) in means {
            if !value.is_finite() {
                return Err(RuntimeError::invalid_parameter(name, value.to_string(), "finite"));
            }
        }
        let spreads = [
            ("izh_a_sd", self.a_sd),
            ("izh_b_sd", self.b_sd),
            ("izh_c_sd", self.c_sd),
            ("izh_d_sd", self.d_sd),
        ];
        for (name, value) in spreads {
            if !value.is_finite() || value < 0.0 {
                return Err(RuntimeError::invalid_parameter(name, value.to_string(), ">= 0.0"));
            }
        }
        Ok(())
    }

    /// Whether any parameter has a non-zero spread
    pub fn is_heterogeneous(&self) -> bool {
        self.a_sd > 0.0 || self.b_sd > 0.0 || self.c_sd > 0.0 || self.d_sd > 0.0
    }
}

/// Decay time constants of the conductance-based synapse model (ms)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConductanceParams {
    /// AMPA decay
    pub tau_ampa: f32,
    /// NMDA decay
    pub tau_nmda: f32,
    /// GABAa decay
    pub tau_gabaa: f32,
    /// GABAb decay
    pub tau_gabab: f32,
}

impl Default for ConductanceParams {
    fn default() -> Self {
        Self {
            tau_ampa: 5.0,
            tau_nmda: 150.0,
            tau_gabaa: 6.0,
            tau_gabab: 150.0,
        }
    }
}

impl ConductanceParams {
    /// Create conductance parameters with validation
    pub fn new(tau_ampa: f32, tau_nmda: f32, tau_gabaa: f32, tau_gabab: f32) -> Result<Self> {
        let params = Self {
            tau_ampa,
            tau_nmda,
            tau_gabaa,
            tau_gabab,
        };
        params.validate()?;
        Ok(params)
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        let taus = [
            ("tau_ampa", self.tau_ampa),
            ("tau_nmda", self.tau_nmda),
            ("tau_gabaa", self.tau_gabaa),
            ("tau_gabab", self.tau_gabab),
        ];
        for (name, tau) in taus {
            // A tau below one tick would flip the sign of the decay factor
            if !tau.is_finite() || tau < 1.0 {
                return Err(RuntimeError::invalid_parameter(name, tau.to_string(), ">= 1.0 ms"));
            }
        }
        Ok(())
    }

    /// Per-tick decay multipliers
    pub fn synapse_model(&self) -> SynapseModel {
        SynapseModel::ConductanceBased {
            ampa: 1.0 - 1.0 / self.tau_ampa,
            nmda: 1.0 - 1.0 / self.tau_nmda,
            gabaa: 1.0 - 1.0 / self.tau_gabaa,
            gabab: 1.0 - 1.0 / self.tau_gabab,
        }
    }
}

/// How arriving spikes turn into membrane current
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SynapseModel {
    /// Weights add directly to the input current for one tick
    CurrentBased,
    /// Weights open conductances that decay by the given factor each tick
    ConductanceBased {
        /// AMPA decay factor
        ampa: f32,
        /// NMDA decay factor
        nmda: f32,
        /// GABAa decay factor
        gabaa: f32,
        /// GABAb decay factor
        gabab: f32,
    },
}

/// Runtime state of one Izhikevich neuron
#[derive(Debug, Clone, PartialEq)]
pub struct IzhikevichNeuron {
    /// Drawn parameters (spread already applied)
    pub a: f32,
    /// See [`IzhikevichParams::b`]
    pub b: f32,
    /// See [`IzhikevichParams::c`]
    pub c: f32,
    /// See [`IzhikevichParams::d`]
    pub d: f32,
    /// Membrane potential (mV)
    pub v: f32,
    /// Recovery variable
    pub u: f32,
    /// Current accumulator (current-based model)
    pub i_syn: f32,
    /// AMPA conductance
    pub g_ampa: f32,
    /// NMDA conductance
    pub g_nmda: f32,
    /// GABAa conductance
    pub g_gabaa: f32,
    /// GABAb conductance
    pub g_gabab: f32,
}

impl IzhikevichNeuron {
    /// Create a neuron at its reset potential
    pub fn new(a: f32, b: f32, c: f32, d: f32) -> Self {
        Self {
            a,
            b,
            c,
            d,
            v: c,
            u: b * c,
            i_syn: 0.0,
            g_ampa: 0.0,
            g_nmda: 0.0,
            g_gabaa: 0.0,
            g_gabab: 0.0,
        }
    }

    /// Create a neuron from the mean parameters
    pub fn from_params(params: &IzhikevichParams) -> Self {
        Self::new(params.a, params.b, params.c, params.d)
    }

    /// Deliver one synaptic event of the given weight
    pub fn receive(&mut self, weight: f32, inhibitory: bool, model: &SynapseModel) {
        match (model, inhibitory) {
            (SynapseModel::CurrentBased, false) => self.i_syn += weight,
            (SynapseModel::CurrentBased, true) => self.i_syn -= weight,
            (SynapseModel::ConductanceBased { .. }, false) => {
                self.g_ampa += weight;
                self.g_nmda += weight;
            }
            (SynapseModel::ConductanceBased { .. }, true) => {
                self.g_gabaa += weight;
                self.g_gabab += weight;
            }
        }
    }

    /// Synaptic current at the present membrane potential
    pub fn input_current(&self, model: &SynapseModel) -> f32 {
        match model {
            SynapseModel::CurrentBased => self.i_syn,
            SynapseModel::ConductanceBased { .. } => {
                let v = self.v;
                let x = ((v + 80.0) / 60.0).powi(2);
                let nmda_gate = x / (1.0 + x);
                -(self.g_ampa * v
                    + self.g_nmda * nmda_gate * v
                    + self.g_gabaa * (v + 70.0)
                    + self.g_gabab * (v + 90.0))
            }
        }
    }

    /// Advance the neuron by one tick; returns whether it fired
    pub fn update(&mut self, model: &SynapseModel) -> Result<bool> {
        for _ in 0..HALF_STEPS {
            let current = self.input_current(model);
            self.v += 0.5 * (0.04 * self.v * self.v + 5.0 * self.v + 140.0 - self.u + current);
            if self.v >= SPIKE_PEAK_MV {
                self.v = SPIKE_PEAK_MV;
                break;
            }
        }
        self.u += self.a * (self.b * self.v - self.u);

        if !self.v.is_finite() || !self.u.is_finite() {
            return Err(RuntimeError::numerical(format!(
                "membrane state diverged (v={}, u={})",
                self.v, self.u
            )));
        }

        let fired = self.v >= SPIKE_PEAK_MV;
        if fired {
            self.v = self.c;
            self.u += self.d;
        }
        self.decay(model);
        Ok(fired)
    }

    fn decay(&mut self, model: &SynapseModel) {
        match model {
            SynapseModel::CurrentBased => self.i_syn = 0.0,
            SynapseModel::ConductanceBased {
                ampa,
                nmda,
                gabaa,
                gabab,
            } => {
                self.g_ampa *= ampa;
                self.g_nmda *= nmda;
                self.g_gabaa *= gabaa;
                self.g_gabab *= gabab;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_validation() {
        assert!(IzhikevichParams::new(0.02, 0.2, -65.0, 8.0).is_ok());
        assert!(IzhikevichParams::new(f32::NAN, 0.2, -65.0, 8.0).is_err());
        let err = IzhikevichParams::with_spread(0.02, -0.1, 0.2, 0.0, -65.0, 0.0, 8.0, 0.0)
            .unwrap_err();
        assert!(err.is_configuration_error());
        assert!(!IzhikevichParams::regular_spiking().is_heterogeneous());
    }

    #[test]
    fn test_conductance_validation() {
        assert!(ConductanceParams::default().validate().is_ok());
        assert!(ConductanceParams::new(0.5, 150.0, 6.0, 150.0).is_err());
        assert!(ConductanceParams::new(5.0, 150.0, 6.0, 150.0).is_ok());
    }

    #[test]
    fn test_neuron_type_parsing() {
        assert_eq!("EXCITATORY_NEURON".parse::<NeuronType>().unwrap(), NeuronType::Excitatory);
        assert_eq!("inhibitory".parse::<NeuronType>().unwrap(), NeuronType::Inhibitory);
        assert!("mixed".parse::<NeuronType>().is_err());
    }

    #[test]
    fn test_initial_state() {
        let neuron = IzhikevichNeuron::from_params(&IzhikevichParams::regular_spiking());
        assert_eq!(neuron.v, -65.0);
        assert!((neuron.u - (-13.0)).abs() < 1e-5);
    }

    #[test]
    fn test_quiescent_without_input() {
        let model = SynapseModel::CurrentBased;
        let mut neuron = IzhikevichNeuron::from_params(&IzhikevichParams::regular_spiking());
        for _ in 0..200 {
            assert!(!neuron.update(&model).unwrap());
        }
        assert!(neuron.v < -60.0);
    }

    #[test]
    fn test_current_drive_fires_and_resets() {
        let model = SynapseModel::CurrentBased;
        let mut neuron = IzhikevichNeuron::from_params(&IzhikevichParams::regular_spiking());
        let mut fired_at = None;
        for t in 0..100 {
            neuron.receive(15.0, false, &model);
            if neuron.update(&model).unwrap() {
                fired_at = Some(t);
                break;
            }
        }
        assert!(fired_at.is_some());
        assert_eq!(neuron.v, -65.0);
        assert_eq!(neuron.i_syn, 0.0);
    }

    #[test]
    fn test_conductance_drive_and_decay() {
        let model = ConductanceParams::default().synapse_model();
        let mut neuron = IzhikevichNeuron::from_params(&IzhikevichParams::regular_spiking());
        neuron.receive(0.05, false, &model);
        assert_eq!(neuron.g_ampa, 0.05);
        assert_eq!(neuron.g_nmda, 0.05);
        neuron.update(&model).unwrap();
        assert!((neuron.g_ampa - 0.05 * 0.8).abs() < 1e-6);
        assert_eq!(neuron.g_gabaa, 0.0);

        let mut driven = IzhikevichNeuron::from_params(&IzhikevichParams::regular_spiking());
        let mut fired = false;
        for _ in 0..50 {
            driven.receive(1.0, false, &model);
            if driven.update(&model).unwrap() {
                fired = true;
                break;
            }
        }
        assert!(fired);
    }

    #[test]
    fn test_inhibition_keeps_neuron_silent() {
        let model = ConductanceParams::default().synapse_model();
        let mut neuron = IzhikevichNeuron::from_params(&IzhikevichParams::regular_spiking());
        for _ in 0..100 {
            neuron.receive(0.01, true, &model);
            assert!(!neuron.update(&model).unwrap());
        }
        assert!(neuron.g_gabaa > 0.0);
    }
}
