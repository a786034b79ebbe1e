//! Network description assembled before build

use core::fmt;
use std::collections::HashMap;

use crate::{
    connectivity::{ConnectRule, Pattern},
    error::*,
    ids::{ConnectionId, GroupId},
    neuron::{ConductanceParams, IzhikevichParams, NeuronType, SynapseModel},
    topology::Grid3D,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What a group does during a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GroupRole {
    /// Emits spikes from a rate source, has no dynamics
    Generator,
    /// Integrates synaptic input with a neuron model
    Computational,
}

impl fmt::Display for GroupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generator => write!(f, "generator"),
            Self::Computational => write!(f, "computational"),
        }
    }
}

/// Group as configured by the caller
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpec {
    /// Handle returned to the caller
    pub id: GroupId,
    /// Unique name
    pub name: String,
    /// Generator or computational
    pub role: GroupRole,
    /// Sign of outgoing synapses
    pub neuron_type: NeuronType,
    /// Lattice layout
    pub grid: Grid3D,
    /// Neuron parameters (computational groups only)
    pub params: Option<IzhikevichParams>,
}

impl GroupSpec {
    /// Number of neurons in the group
    pub fn num_neurons(&self) -> usize {
        self.grid.num_neurons()
    }

    /// Whether the group emits spikes from a rate source
    pub fn is_generator(&self) -> bool {
        self.role == GroupRole::Generator
    }
}

/// Connection as configured by the caller
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSpec {
    /// Handle returned to the caller
    pub id: ConnectionId,
    /// Pre-synaptic group
    pub source: GroupId,
    /// Post-synaptic group
    pub destination: GroupId,
    /// Rule to expand at build
    pub rule: ConnectRule,
}

/// Everything an engine needs to instantiate a network
#[derive(Debug, Clone, Default)]
pub struct NetworkBlueprint {
    groups: Vec<GroupSpec>,
    connections: Vec<ConnectionSpec>,
    names: HashMap<String, GroupId>,
    conductances: Option<ConductanceParams>,
}

impl NetworkBlueprint {
    /// Create an empty blueprint
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a group; names must be unique
    pub fn add_group(
        &mut self,
        name: &str,
        role: GroupRole,
        neuron_type: NeuronType,
        grid: Grid3D,
    ) -> Result<GroupId> {
        if name.trim().is_empty() {
            return Err(RuntimeError::invalid_config("group name must not be empty"));
        }
        if self.names.contains_key(name) {
            return Err(RuntimeError::invalid_config(format!(
                "group '{}' already exists",
                name
            )));
        }
        let id = GroupId::new(self.groups.len() as u32);
        self.groups.push(GroupSpec {
            id,
            name: name.to_string(),
            role,
            neuron_type,
            grid,
            params: None,
        });
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    /// Look up a group by handle
    pub fn group(&self, id: GroupId) -> Result<&GroupSpec> {
        self.groups
            .get(id.index())
            .ok_or(RuntimeError::UnknownGroup { group: id })
    }

    /// Look up a group by name
    pub fn group_by_name(&self, name: &str) -> Option<GroupId> {
        self.names.get(name).copied()
    }

    /// Assign neuron parameters to a computational group
    pub fn set_neuron_parameters(&mut self, id: GroupId, params: IzhikevichParams) -> Result<()> {
        params.validate()?;
        let group = self
            .groups
            .get_mut(id.index())
            .ok_or(RuntimeError::UnknownGroup { group: id })?;
        if group.is_generator() {
            return Err(RuntimeError::invalid_config(format!(
                "group '{}' is a spike generator and has no neuron parameters",
                group.name
            )));
        }
        group.params = Some(params);
        Ok(())
    }

    /// Add a connection between two existing groups
    pub fn add_connection(
        &mut self,
        source: GroupId,
        destination: GroupId,
        rule: ConnectRule,
    ) -> Result<ConnectionId> {
        rule.validate()?;
        let src = self.group(source)?;
        let dst = self.group(destination)?;

        if dst.is_generator() {
            return Err(RuntimeError::invalid_config(format!(
                "cannot connect into spike generator group '{}'",
                dst.name
            )));
        }
        if rule.pattern == Pattern::OneToOne && src.num_neurons() != dst.num_neurons() {
            return Err(RuntimeError::invalid_config(format!(
                "one-to-one connection needs equal sizes ('{}' has {}, '{}' has {})",
                src.name,
                src.num_neurons(),
                dst.name,
                dst.num_neurons()
            )));
        }
        if self.find_connection(source, destination).is_some() {
            return Err(RuntimeError::invalid_config(format!(
                "groups '{}' and '{}' are already connected",
                src.name, dst.name
            )));
        }

        let id = ConnectionId::new(self.connections.len() as u32);
        self.connections.push(ConnectionSpec {
            id,
            source,
            destination,
            rule,
        });
        Ok(id)
    }

    /// Connection between `source` and `destination`, if any
    pub fn find_connection(&self, source: GroupId, destination: GroupId) -> Option<&ConnectionSpec> {
        self.connections
            .iter()
            .find(|c| c.source == source && c.destination == destination)
    }

    /// Enable or disable conductance-based synapses
    pub fn set_conductances(&mut self, params: Option<ConductanceParams>) -> Result<()> {
        if let Some(params) = &params {
            params.validate()?;
        }
        self.conductances = params;
        Ok(())
    }

    /// Conductance parameters when COBA is enabled
    pub fn conductances(&self) -> Option<&ConductanceParams> {
        self.conductances.as_ref()
    }

    /// Synapse model implied by the conductance setting
    pub fn synapse_model(&self) -> SynapseModel {
        self.conductances
            .map(|c| c.synapse_model())
            .unwrap_or(SynapseModel::CurrentBased)
    }

    /// All groups in creation order
    pub fn groups(&self) -> &[GroupSpec] {
        &self.groups
    }

    /// All connections in creation order
    pub fn connections(&self) -> &[ConnectionSpec] {
        &self.connections
    }

    /// Total number of neurons over all groups
    pub fn num_neurons(&self) -> usize {
        self.groups.iter().map(GroupSpec::num_neurons).sum()
    }

    /// Check the blueprint is complete enough to build
    pub fn validate(&self) -> Result<()> {
        if self.groups.is_empty() {
            return Err(RuntimeError::invalid_config("network has no groups"));
        }
        for group in &self.groups {
            if group.role == GroupRole::Computational && group.params.is_none() {
                return Err(RuntimeError::invalid_config(format!(
                    "group '{}' has no neuron parameters",
                    group.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(w: u32, h: u32) -> Grid3D {
        Grid3D::new(w, h, 1).unwrap()
    }

    #[test]
    fn test_sequential_handles() {
        let mut bp = NetworkBlueprint::new();
        let a = bp.add_group("a", GroupRole::Generator, NeuronType::Excitatory, grid(2, 2)).unwrap();
        let b = bp.add_group("b", GroupRole::Computational, NeuronType::Excitatory, grid(3, 3)).unwrap();
        assert_eq!(a, GroupId::new(0));
        assert_eq!(b, GroupId::new(1));
        assert_eq!(bp.group_by_name("b"), Some(b));
        assert_eq!(bp.num_neurons(), 13);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut bp = NetworkBlueprint::new();
        bp.add_group("a", GroupRole::Generator, NeuronType::Excitatory, grid(2, 2)).unwrap();
        let err = bp
            .add_group("a", GroupRole::Computational, NeuronType::Excitatory, grid(2, 2))
            .unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_connection_checks() {
        let mut bp = NetworkBlueprint::new();
        let gen = bp.add_group("in", GroupRole::Generator, NeuronType::Excitatory, grid(4, 1)).unwrap();
        let out = bp.add_group("out", GroupRole::Computational, NeuronType::Excitatory, grid(2, 1)).unwrap();

        // Into a generator
        assert!(bp.add_connection(out, gen, ConnectRule::new(Pattern::Full)).is_err());
        // Size mismatch for one-to-one
        assert!(bp.add_connection(gen, out, ConnectRule::new(Pattern::OneToOne)).is_err());
        // Unknown group
        let err = bp
            .add_connection(gen, GroupId::new(7), ConnectRule::new(Pattern::Full))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownGroup { .. }));

        let id = bp.add_connection(gen, out, ConnectRule::new(Pattern::Full)).unwrap();
        assert_eq!(id, ConnectionId::new(0));
        // Same pair twice
        assert!(bp.add_connection(gen, out, ConnectRule::new(Pattern::Random)).is_err());
        assert_eq!(bp.connections().len(), 1);
    }

    #[test]
    fn test_validate_requires_parameters() {
        let mut bp = NetworkBlueprint::new();
        assert!(bp.validate().is_err());

        let gen = bp.add_group("in", GroupRole::Generator, NeuronType::Excitatory, grid(2, 2)).unwrap();
        let out = bp.add_group("out", GroupRole::Computational, NeuronType::Excitatory, grid(2, 2)).unwrap();
        assert!(bp.validate().is_err());

        assert!(bp.set_neuron_parameters(gen, IzhikevichParams::regular_spiking()).is_err());
        bp.set_neuron_parameters(out, IzhikevichParams::regular_spiking()).unwrap();
        assert!(bp.validate().is_ok());
    }

    #[test]
    fn test_synapse_model_selection() {
        let mut bp = NetworkBlueprint::new();
        assert_eq!(bp.synapse_model(), SynapseModel::CurrentBased);
        bp.set_conductances(Some(ConductanceParams::default())).unwrap();
        assert!(matches!(bp.synapse_model(), SynapseModel::ConductanceBased { .. }));
        assert!(bp.set_conductances(Some(ConductanceParams { tau_ampa: 0.0, ..Default::default() })).is_err());
    }
}
