//! Declarative connectivity rules between two groups
//!
//! A [`ConnectRule`] only describes *what* should be connected. Turning a
//! rule into concrete synapses is the engine's job; see
//! [`crate::engine::CpuEngine`] for the reference kernel.

use core::fmt;
use core::str::FromStr;

use crate::{error::*, MAX_SYN_DELAY};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Connection pattern between the neurons of two groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Pattern {
    /// Every pre neuron to every post neuron
    Full,
    /// Like `Full`, but without `i -> i` pairs inside one group
    FullNoDirect,
    /// Pre neuron `i` to post neuron `i`
    OneToOne,
    /// Each pair independently with the rule's probability
    Random,
    /// Distance-weighted pairs inside the receptive field
    Gaussian,
}

impl Pattern {
    /// Canonical lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::FullNoDirect => "full-no-direct",
            Self::OneToOne => "one-to-one",
            Self::Random => "random",
            Self::Gaussian => "gaussian",
        }
    }

    /// Whether the rule's connection probability is consulted
    pub fn is_probabilistic(&self) -> bool {
        matches!(self, Self::Random | Self::Gaussian)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Pattern {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "full" => Ok(Self::Full),
            "full-no-direct" => Ok(Self::FullNoDirect),
            "one-to-one" => Ok(Self::OneToOne),
            "random" => Ok(Self::Random),
            "gaussian" => Ok(Self::Gaussian),
            other => Err(RuntimeError::invalid_config(format!(
                "unknown connection pattern '{}'",
                other
            ))),
        }
    }
}

/// Bounds and initial value of synaptic weight magnitudes
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RangeWeight {
    /// Lower bound
    pub min: f32,
    /// Initial value
    pub init: f32,
    /// Upper bound
    pub max: f32,
}

impl RangeWeight {
    /// Weight fixed at `w` (bounds `0..=w`)
    pub const fn fixed(w: f32) -> Self {
        Self {
            min: 0.0,
            init: w,
            max: w,
        }
    }

    /// Explicit bounds
    pub const fn new(min: f32, init: f32, max: f32) -> Self {
        Self { min, init, max }
    }

    /// Validate bounds
    pub fn validate(&self) -> Result<()> {
        if !(self.min.is_finite() && self.init.is_finite() && self.max.is_finite()) {
            return Err(RuntimeError::invalid_parameter(
                "weight",
                format!("{:?}", self),
                "finite bounds",
            ));
        }
        if self.min < 0.0 || self.min > self.init || self.init > self.max {
            return Err(RuntimeError::invalid_parameter(
                "weight",
                format!("min={} init={} max={}", self.min, self.init, self.max),
                "0 <= min <= init <= max",
            ));
        }
        Ok(())
    }
}

/// Bounds of synaptic delays in ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RangeDelay {
    /// Shortest delay
    pub min: u8,
    /// Longest delay
    pub max: u8,
}

impl RangeDelay {
    /// Every synapse gets the same delay
    pub const fn fixed(delay: u8) -> Self {
        Self {
            min: delay,
            max: delay,
        }
    }

    /// Delays drawn uniformly from `min..=max`
    pub const fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    /// Validate bounds
    pub fn validate(&self) -> Result<()> {
        if self.min < 1 || self.min > self.max || self.max > MAX_SYN_DELAY {
            return Err(RuntimeError::invalid_parameter(
                "delay",
                format!("min={} max={}", self.min, self.max),
                format!("1 <= min <= max <= {}", MAX_SYN_DELAY),
            ));
        }
        Ok(())
    }
}

/// Receptive field semi-axes
///
/// Per axis: a negative value leaves the axis unbounded, zero only admits
/// pairs at the same coordinate, a positive value is the ellipsoid
/// semi-axis length.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RadiusRF {
    /// Semi-axis along x
    pub x: f32,
    /// Semi-axis along y
    pub y: f32,
    /// Semi-axis along z
    pub z: f32,
}

impl Default for RadiusRF {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl RadiusRF {
    /// Explicit semi-axes
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// No spatial restriction
    pub const fn unbounded() -> Self {
        Self::new(-1.0, -1.0, -1.0)
    }

    /// Validate semi-axes
    pub fn validate(&self) -> Result<()> {
        if !(self.x.is_finite() && self.y.is_finite() && self.z.is_finite()) {
            return Err(RuntimeError::invalid_parameter(
                "radius",
                format!("{:?}", self),
                "finite semi-axes",
            ));
        }
        Ok(())
    }

    /// Squared normalized distance between two positions, or `None` when
    /// the post position lies outside the receptive field of the pre one
    pub fn normalized_distance(&self, pre: (f32, f32, f32), post: (f32, f32, f32)) -> Option<f32> {
        let axes = [
            (self.x, pre.0 - post.0),
            (self.y, pre.1 - post.1),
            (self.z, pre.2 - post.2),
        ];
        let mut dist = 0.0;
        for (radius, delta) in axes {
            if radius < 0.0 {
                continue;
            }
            if radius == 0.0 {
                if delta.abs() > f32::EPSILON {
                    return None;
                }
                continue;
            }
            dist += (delta / radius).powi(2);
        }
        (dist <= 1.0).then_some(dist)
    }
}

/// Full description of a connection request
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConnectRule {
    /// Pattern deciding which pairs are candidates
    pub pattern: Pattern,
    /// Weight bounds
    pub weight: RangeWeight,
    /// Connection probability for probabilistic patterns
    pub probability: f32,
    /// Delay bounds
    pub delay: RangeDelay,
    /// Spatial restriction
    pub radius: RadiusRF,
}

impl ConnectRule {
    /// Rule with unit weight, probability 1, delay 1 and no spatial bound
    pub fn new(pattern: Pattern) -> Self {
        Self {
            pattern,
            weight: RangeWeight::fixed(1.0),
            probability: 1.0,
            delay: RangeDelay::fixed(1),
            radius: RadiusRF::unbounded(),
        }
    }

    /// Set weight bounds
    pub fn with_weight(mut self, weight: RangeWeight) -> Self {
        self.weight = weight;
        self
    }

    /// Set connection probability
    pub fn with_probability(mut self, probability: f32) -> Self {
        self.probability = probability;
        self
    }

    /// Set delay bounds
    pub fn with_delay(mut self, delay: RangeDelay) -> Self {
        self.delay = delay;
        self
    }

    /// Set receptive field
    pub fn with_radius(mut self, radius: RadiusRF) -> Self {
        self.radius = radius;
        self
    }

    /// Validate every component of the rule
    pub fn validate(&self) -> Result<()> {
        self.weight.validate()?;
        self.delay.validate()?;
        self.radius.validate()?;
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(RuntimeError::invalid_parameter(
                "probability",
                self.probability.to_string(),
                "within [0, 1]",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_parsing() {
        assert_eq!("gaussian".parse::<Pattern>().unwrap(), Pattern::Gaussian);
        assert_eq!("FULL_NO_DIRECT".parse::<Pattern>().unwrap(), Pattern::FullNoDirect);
        assert_eq!("one-to-one".parse::<Pattern>().unwrap(), Pattern::OneToOne);
        let err = "mexican-hat".parse::<Pattern>().unwrap_err();
        assert!(err.is_configuration_error());
        assert_eq!(Pattern::Random.to_string(), "random");
    }

    #[test]
    fn test_weight_validation() {
        assert!(RangeWeight::fixed(0.05).validate().is_ok());
        assert!(RangeWeight::new(0.0, 0.5, 1.0).validate().is_ok());
        assert!(RangeWeight::new(0.5, 0.1, 1.0).validate().is_err());
        assert!(RangeWeight::new(-0.1, 0.1, 1.0).validate().is_err());
        assert!(RangeWeight::fixed(f32::INFINITY).validate().is_err());
    }

    #[test]
    fn test_delay_validation() {
        assert!(RangeDelay::fixed(1).validate().is_ok());
        assert!(RangeDelay::new(1, MAX_SYN_DELAY).validate().is_ok());
        assert!(RangeDelay::fixed(0).validate().is_err());
        assert!(RangeDelay::new(4, 2).validate().is_err());
        assert!(RangeDelay::fixed(MAX_SYN_DELAY + 1).validate().is_err());
    }

    #[test]
    fn test_probability_validation() {
        let rule = ConnectRule::new(Pattern::Random).with_probability(1.5);
        assert!(rule.validate().is_err());
        let rule = ConnectRule::new(Pattern::Random).with_probability(0.1);
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn test_receptive_field() {
        let rf = RadiusRF::new(3.0, 3.0, 1.0);
        assert_eq!(rf.normalized_distance((0.0, 0.0, 0.0), (0.0, 0.0, 0.0)), Some(0.0));
        let d = rf.normalized_distance((3.0, 0.0, 0.0), (0.0, 0.0, 0.0)).unwrap();
        assert!((d - 1.0).abs() < 1e-6);
        assert_eq!(rf.normalized_distance((3.0, 1.0, 0.0), (0.0, 0.0, 0.0)), None);

        let same_plane = RadiusRF::new(-1.0, -1.0, 0.0);
        assert_eq!(same_plane.normalized_distance((10.0, -4.0, 1.0), (0.0, 0.0, 1.0)), Some(0.0));
        assert_eq!(same_plane.normalized_distance((0.0, 0.0, 1.0), (0.0, 0.0, 0.0)), None);

        let open = RadiusRF::unbounded();
        assert_eq!(open.normalized_distance((100.0, 5.0, 2.0), (-3.0, 0.0, 0.0)), Some(0.0));
    }
}
