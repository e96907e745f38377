//! Simulated covers and lights
//!
//! Registers `cover.*` and `light.*` services that move entities in the
//! state store instantly, so the engine can run end to end without any
//! hardware integration.

use serde_json::json;
use sp_config::ShutterPilotConfig;
use sp_core::domains::{cover, light, sun, STATE_CLOSED, STATE_OFF, STATE_ON, STATE_OPEN};
use sp_core::{EntityId, ServiceCall};
use sp_service_registry::ServiceRegistry;
use sp_state_store::StateStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Register simulated cover and light services
pub fn register_simulated_services(services: &ServiceRegistry, states: Arc<StateStore>) {
    let store = states.clone();
    services.register(cover::DOMAIN, cover::OPEN_COVER, move |call: ServiceCall| {
        let states = store.clone();
        async move {
            for entity_id in target_entities(&call, cover::DOMAIN) {
                move_cover(&states, entity_id, 100);
            }
            Ok(())
        }
    });

    let store = states.clone();
    services.register(cover::DOMAIN, cover::CLOSE_COVER, move |call: ServiceCall| {
        let states = store.clone();
        async move {
            for entity_id in target_entities(&call, cover::DOMAIN) {
                move_cover(&states, entity_id, 0);
            }
            Ok(())
        }
    });

    let store = states.clone();
    services.register(cover::DOMAIN, cover::SET_COVER_POSITION, move |call: ServiceCall| {
        let states = store.clone();
        async move {
            let position = call.get::<i64>(cover::ATTR_POSITION).unwrap_or(100);
            for entity_id in target_entities(&call, cover::DOMAIN) {
                move_cover(&states, entity_id, position);
            }
            Ok(())
        }
    });

    // Simulated covers arrive instantly; there is nothing to stop
    services.register(cover::DOMAIN, cover::STOP_COVER, |call: ServiceCall| async move {
        debug!(entities = ?call.entity_ids(), "Simulated stop");
        Ok(())
    });

    let store = states.clone();
    services.register(light::DOMAIN, light::TURN_ON, move |call: ServiceCall| {
        let states = store.clone();
        async move {
            let brightness = call.get::<u8>(light::ATTR_BRIGHTNESS).unwrap_or(255);
            for entity_id in target_entities(&call, light::DOMAIN) {
                states.set(
                    entity_id,
                    STATE_ON,
                    HashMap::from([(light::ATTR_BRIGHTNESS.to_string(), json!(brightness))]),
                );
            }
            Ok(())
        }
    });

    let store = states;
    services.register(light::DOMAIN, light::TURN_OFF, move |call: ServiceCall| {
        let states = store.clone();
        async move {
            for entity_id in target_entities(&call, light::DOMAIN) {
                states.set(entity_id, STATE_OFF, HashMap::new());
            }
            Ok(())
        }
    });

    info!("Simulated cover and light services registered");
}

/// Create every configured cover and light that does not exist yet, plus the sun
pub fn seed_entities(states: &StateStore, config: &ShutterPilotConfig) {
    for profile in &config.profiles {
        if !states.contains(&profile.cover.to_string()) {
            move_cover(states, profile.cover.clone(), 100);
        }
        if let Some(light) = &profile.light {
            if !states.contains(&light.entity.to_string()) {
                states.set(light.entity.clone(), STATE_OFF, HashMap::new());
            }
        }
    }

    if !states.contains(sun::ENTITY_ID) {
        if let Ok(entity_id) = sun::ENTITY_ID.parse::<EntityId>() {
            states.set(
                entity_id,
                sun::STATE_ABOVE_HORIZON,
                HashMap::from([
                    (sun::ATTR_ELEVATION.to_string(), json!(30.0)),
                    (sun::ATTR_AZIMUTH.to_string(), json!(180.0)),
                ]),
            );
        }
    }
}

fn move_cover(states: &StateStore, entity_id: EntityId, position: i64) {
    let position = position.clamp(0, 100);
    let state = if position > 0 { STATE_OPEN } else { STATE_CLOSED };
    states.set(
        entity_id,
        state,
        HashMap::from([(cover::ATTR_CURRENT_POSITION.to_string(), json!(position))]),
    );
}

/// Targets of a service call that belong to `domain`
fn target_entities(call: &ServiceCall, domain: &str) -> Vec<EntityId> {
    call.entity_ids()
        .into_iter()
        .filter_map(|id| id.parse::<EntityId>().ok())
        .filter(|e| e.is_domain(domain))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sp_core::domains::ATTR_ENTITY_ID;
    use sp_event_bus::EventBus;

    fn setup() -> (Arc<StateStore>, ServiceRegistry) {
        let states = Arc::new(StateStore::new(Arc::new(EventBus::new())));
        let services = ServiceRegistry::new();
        register_simulated_services(&services, states.clone());
        (states, services)
    }

    #[tokio::test]
    async fn test_cover_moves() {
        let (states, services) = setup();

        services
            .call(
                "cover",
                "set_cover_position",
                json!({ ATTR_ENTITY_ID: "cover.office", "position": 40 }),
            )
            .await
            .unwrap();
        let state = states.get("cover.office").unwrap();
        assert_eq!(state.state, "open");
        assert_eq!(state.current_position(), Some(40));

        services
            .call("cover", "close_cover", json!({ ATTR_ENTITY_ID: "cover.office" }))
            .await
            .unwrap();
        let state = states.get("cover.office").unwrap();
        assert_eq!(state.state, "closed");
        assert_eq!(state.current_position(), Some(0));
    }

    #[tokio::test]
    async fn test_light_and_foreign_targets() {
        let (states, services) = setup();

        services
            .call(
                "light",
                "turn_on",
                json!({ ATTR_ENTITY_ID: ["light.desk", "switch.fan"], "brightness": 204 }),
            )
            .await
            .unwrap();

        let desk = states.get("light.desk").unwrap();
        assert_eq!(desk.state, "on");
        assert_eq!(desk.attribute::<u8>("brightness"), Some(204));
        assert!(!states.contains("switch.fan"));
    }

    #[test]
    fn test_seed_entities() {
        let states = StateStore::new(Arc::new(EventBus::new()));
        let config = ShutterPilotConfig::from_yaml_str(
            r#"
profiles:
  - name: Office
    cover_entity_id: cover.office
    light_entity: light.office
"#,
        )
        .unwrap();

        seed_entities(&states, &config);
        assert_eq!(
            states.get("cover.office").unwrap().current_position(),
            Some(100)
        );
        assert!(states.is_state("light.office", "off"));
        assert!(states.is_state("sun.sun", "above_horizon"));
    }
}
