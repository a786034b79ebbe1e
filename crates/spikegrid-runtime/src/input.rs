//! Rate-based input for spike generator groups

use crate::error::*;

/// Per-neuron mean firing rates (Hz) consumed by a generator group
///
/// The reference engine treats each neuron as an independent Poisson
/// process sampled once per tick, so a neuron fires at most once per tick.
#[derive(Debug, Clone, PartialEq)]
pub struct PoissonRate {
    rates: Vec<f32>,
}

impl PoissonRate {
    /// Create a source for `num_neurons` neurons, all silent
    pub fn new(num_neurons: usize) -> Result<Self> {
        if num_neurons == 0 {
            return Err(RuntimeError::invalid_parameter("num_neurons", "0", "> 0"));
        }
        Ok(Self {
            rates: vec![0.0; num_neurons],
        })
    }

    /// Number of neurons this source drives
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Always false; a source drives at least one neuron
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Broadcast one rate to every neuron
    pub fn set_rates(&mut self, rate: f32) -> Result<()> {
        check_rate(rate)?;
        self.rates.iter_mut().for_each(|r| *r = rate);
        Ok(())
    }

    /// Assign one rate per neuron
    pub fn set_rates_from(&mut self, rates: &[f32]) -> Result<()> {
        if rates.len() != self.rates.len() {
            return Err(RuntimeError::invalid_config(format!(
                "rate vector has {} entries, source drives {} neurons",
                rates.len(),
                self.rates.len()
            )));
        }
        for &rate in rates {
            check_rate(rate)?;
        }
        self.rates.copy_from_slice(rates);
        Ok(())
    }

    /// Set the rate of a single neuron
    pub fn set_rate(&mut self, neuron: usize, rate: f32) -> Result<()> {
        check_rate(rate)?;
        let len = self.rates.len();
        let slot = self.rates.get_mut(neuron).ok_or_else(|| {
            RuntimeError::invalid_parameter("neuron", neuron.to_string(), format!("< {}", len))
        })?;
        *slot = rate;
        Ok(())
    }

    /// Rate of a single neuron
    pub fn rate(&self, neuron: usize) -> Option<f32> {
        self.rates.get(neuron).copied()
    }

    /// All rates in neuron order
    pub fn rates(&self) -> &[f32] {
        &self.rates
    }

    /// Probability that neuron `neuron` fires during a tick of `dt_ms`
    pub fn spike_probability(&self, neuron: usize, dt_ms: f32) -> f32 {
        self.rates
            .get(neuron)
            .map(|rate| (rate * dt_ms / 1000.0).min(1.0))
            .unwrap_or(0.0)
    }
}

fn check_rate(rate: f32) -> Result<()> {
    if !rate.is_finite() || rate < 0.0 {
        return Err(RuntimeError::invalid_parameter("rate", rate.to_string(), ">= 0.0 Hz"));
    }
    Ok(())
}
