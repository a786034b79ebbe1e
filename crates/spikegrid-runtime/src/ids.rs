//! Handle types handed out by a session

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of a neuron group within one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GroupId(pub u32);

impl GroupId {
    /// Create a new group ID
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Position of the group in creation order
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G{}", self.0)
    }
}

/// Identifier of a connection between two groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConnectionId(pub u32);

impl ConnectionId {
    /// Create a new connection ID
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Position of the connection in creation order
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// Spike event emitted by a neuron during one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Spike {
    /// Group the neuron belongs to
    pub group: GroupId,
    /// Neuron index within its group
    pub neuron: u32,
    /// Tick at which the neuron fired (ms)
    pub time_ms: u64,
}

impl Spike {
    /// Create a new spike
    pub const fn new(group: GroupId, neuron: u32, time_ms: u64) -> Self {
        Self {
            group,
            neuron,
            time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_id() {
        let id = GroupId::new(3);
        assert_eq!(id.raw(), 3);
        assert_eq!(id.index(), 3);
        assert_eq!(format!("{}", id), "G3");
    }

    #[test]
    fn test_connection_id() {
        let id = ConnectionId::new(12);
        assert_eq!(id.raw(), 12);
        assert_eq!(format!("{}", id), "C12");
    }

    #[test]
    fn test_ordering() {
        assert!(GroupId::new(1) < GroupId::new(2));
        assert!(ConnectionId::new(0) < ConnectionId::new(5));
    }
}
