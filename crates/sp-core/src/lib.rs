//! Core types for ShutterPilot
//!
//! This crate provides the vocabulary shared by every other crate in the
//! workspace: entity references, entity state snapshots, bus events and
//! service calls, plus the well-known domain, service and state names of the
//! entities a shading profile talks to.

pub mod domains;
mod entity_id;
mod event;
mod service_call;
mod state;

pub use entity_id::{EntityId, EntityIdError};
pub use event::{Event, EventData, EventType};
pub use service_call::ServiceCall;
pub use state::State;

/// Standard event types fired on the bus
pub mod events {
    use super::*;

    /// Event type for entity state changes
    pub const STATE_CHANGED: &str = "state_changed";

    /// Data for STATE_CHANGED events
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct StateChangedData {
        pub entity_id: EntityId,
        pub old_state: Option<State>,
        pub new_state: Option<State>,
    }

    impl EventData for StateChangedData {
        fn event_type() -> &'static str {
            STATE_CHANGED
        }
    }
}
