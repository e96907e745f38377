//! Entity state storage for ShutterPilot
//!
//! The StateStore holds the latest known state of every entity the profile
//! controllers care about: covers, contact sensors, illuminance and
//! temperature sensors, lights and the sun. Every write fires a
//! `state_changed` event on the bus carrying both the old and the new state,
//! which is what the controllers react to.

use dashmap::DashMap;
use sp_core::events::StateChangedData;
use sp_core::{EntityId, State};
use sp_event_bus::EventBus;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Concurrent map of entity id to latest state
pub struct StateStore {
    /// All entity states keyed by entity_id string
    states: DashMap<String, State>,
    /// Event bus for firing state change events
    event_bus: Arc<EventBus>,
}

impl StateStore {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            states: DashMap::new(),
            event_bus,
        }
    }

    /// Write the state of an entity and fire `state_changed`
    ///
    /// `last_changed` is only moved forward when the state value differs
    /// from the stored one.
    #[instrument(skip(self, state, attributes), fields(entity_id = %entity_id))]
    pub fn set(
        &self,
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
    ) -> State {
        let key = entity_id.to_string();
        let old_state = self.states.get(&key).map(|s| s.clone());

        let new_state = match &old_state {
            Some(existing) => existing.with_update(state, attributes),
            None => State::new(entity_id.clone(), state, attributes),
        };

        debug!(
            state = %new_state.state,
            changed = old_state.as_ref().map(|s| s.state != new_state.state).unwrap_or(true),
            "Setting entity state"
        );

        self.states.insert(key, new_state.clone());

        self.event_bus.fire_typed(StateChangedData {
            entity_id,
            old_state,
            new_state: Some(new_state.clone()),
        });

        new_state
    }

    /// Get the current state of an entity
    pub fn get(&self, entity_id: &str) -> Option<State> {
        self.states.get(entity_id).map(|s| s.clone())
    }

    /// Whether an entity currently has exactly this state value
    pub fn is_state(&self, entity_id: &str, state: &str) -> bool {
        self.states.get(entity_id).is_some_and(|s| s.state == state)
    }

    /// Whether the entity is known at all
    pub fn contains(&self, entity_id: &str) -> bool {
        self.states.contains_key(entity_id)
    }
}

/// Thread-safe wrapper for StateStore
pub type SharedStateStore = Arc<StateStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_test_setup() -> (Arc<EventBus>, StateStore) {
        let event_bus = Arc::new(EventBus::new());
        let store = StateStore::new(event_bus.clone());
        (event_bus, store)
    }

    #[test]
    fn test_set_and_get_cover_state() {
        let (_, store) = make_test_setup();

        let attrs = HashMap::from([("current_position".to_string(), json!(60))]);
        store.set("cover.office".parse().unwrap(), "open", attrs);

        let state = store.get("cover.office").unwrap();
        assert_eq!(state.state, "open");
        assert_eq!(state.current_position(), Some(60));
        assert!(store.is_state("cover.office", "open"));
        assert!(!store.is_state("cover.bedroom", "open"));
        assert!(store.contains("cover.office"));
    }

    #[tokio::test]
    async fn test_state_changed_carries_old_and_new() {
        let (bus, store) = make_test_setup();
        let mut rx = bus.subscribe_typed::<StateChangedData>();
        let id: EntityId = "sensor.lux".parse().unwrap();

        store.set(id.clone(), "1200", HashMap::new());
        store.set(id, "900", HashMap::new());

        let first = rx.recv().await.unwrap();
        assert!(first.data.old_state.is_none());

        let second = rx.recv().await.unwrap();
        assert_eq!(second.data.old_state.unwrap().state, "1200");
        assert_eq!(second.data.new_state.unwrap().state, "900");
    }
}
