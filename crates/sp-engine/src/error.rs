//! Engine error types

use sp_service_registry::ServiceError;
use thiserror::Error;

/// Failure of a single actuator or light command
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    /// The target does not offer this service; callers may fall back
    #[error("{service} is not supported for {entity_id}")]
    Unsupported { service: String, entity_id: String },

    /// The actuator is missing or reports itself unavailable
    #[error("{entity_id} is not available")]
    Unavailable { entity_id: String },

    /// The service exists but the call failed
    #[error("{service} failed for {entity_id}: {source}")]
    Failed {
        service: String,
        entity_id: String,
        #[source]
        source: ServiceError,
    },
}

impl CommandError {
    pub fn is_unsupported(&self) -> bool {
        matches!(self, CommandError::Unsupported { .. })
    }
}

/// Errors surfaced by the supervisor's public operations
#[derive(Debug, Clone, Error)]
pub enum SupervisorError {
    #[error("no profile named '{0}'")]
    UnknownProfile(String),

    #[error("controller for '{0}' has stopped")]
    ControllerStopped(String),

    #[error("manual command for '{profile}' failed: {source}")]
    Command {
        profile: String,
        #[source]
        source: CommandError,
    },
}

/// Result type for supervisor operations
pub type SupervisorResult<T> = Result<T, SupervisorError>;
