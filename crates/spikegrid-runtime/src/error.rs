//! Error types for the spikegrid runtime

use thiserror::Error;

use crate::ids::GroupId;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors that can occur while configuring or running a session
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// Malformed network configuration
    #[error("Invalid network configuration: {reason}")]
    Configuration {
        /// Reason for invalid configuration
        reason: String,
    },

    /// Group handle not issued by this session
    #[error("Group {group} not found")]
    UnknownGroup {
        /// Group ID that was not found
        group: GroupId,
    },

    /// Invalid parameter value
    #[error("Invalid parameter {parameter}: {value} (expected {constraint})")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Invalid value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// Operation called in the wrong lifecycle state
    #[error("Precondition violated: {operation} is not allowed while the session is {state}")]
    PreconditionViolation {
        /// Operation that was attempted
        operation: String,
        /// Lifecycle state at the time of the call
        state: String,
    },

    /// Device or memory limits reached
    #[error("Resource exhausted: {resource} (limit: {limit})")]
    ResourceExhausted {
        /// Resource name
        resource: String,
        /// Resource limit
        limit: String,
    },

    /// Numerical integration produced a non-finite state
    #[error("Numerical error: {reason}")]
    Numerical {
        /// Reason for numerical error
        reason: String,
    },

    /// Simulation step failed
    #[error("Simulation step failed at t={time_ms}ms: {reason}")]
    SimulationStep {
        /// Tick at which the step failed
        time_ms: u64,
        /// Reason for failure
        reason: String,
    },
}

impl RuntimeError {
    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(
        parameter: impl Into<String>,
        value: impl Into<String>,
        constraint: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            constraint: constraint.into(),
        }
    }

    /// Create a precondition violation error
    pub fn precondition(operation: impl Into<String>, state: impl Into<String>) -> Self {
        Self::PreconditionViolation {
            operation: operation.into(),
            state: state.into(),
        }
    }

    /// Create a resource exhausted error
    pub fn resource_exhausted(resource: impl Into<String>, limit: impl Into<String>) -> Self {
        Self::ResourceExhausted {
            resource: resource.into(),
            limit: limit.into(),
        }
    }

    /// Create a numerical error
    pub fn numerical(reason: impl Into<String>) -> Self {
        Self::Numerical {
            reason: reason.into(),
        }
    }

    /// Create a simulation step error
    pub fn simulation_step(time_ms: u64, reason: impl Into<String>) -> Self {
        Self::SimulationStep {
            time_ms,
            reason: reason.into(),
        }
    }

    /// Whether the error stems from malformed configuration
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::UnknownGroup { .. } | Self::InvalidParameter { .. }
        )
    }

    /// Whether the error stems from a lifecycle ordering mistake
    pub fn is_precondition_violation(&self) -> bool {
        matches!(self, Self::PreconditionViolation { .. })
    }
}
