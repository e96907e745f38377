//! Actuator and light commands
//!
//! The engine never talks to hardware. Covers are driven through an
//! [`ActuatorDispatcher`] and lights through a [`LightCoordinator`]; the
//! default implementations call `cover.*` and `light.*` services on the
//! [`ServiceRegistry`] and report services that are not registered as
//! [`CommandError::Unsupported`], so callers can fall back.

use async_trait::async_trait;
use serde_json::json;
use sp_core::domains::{cover, light, ATTR_ENTITY_ID};
use sp_core::EntityId;
use sp_service_registry::ServiceRegistry;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::CommandError;
use crate::sensors::SensorSnapshot;

/// Position a cover is commanded to when opened through the position service
pub const FULLY_OPEN: u8 = 100;

/// Clamp any position into `0..=100`
pub fn clamp_position(position: i64) -> u8 {
    position.clamp(0, i64::from(FULLY_OPEN)) as u8
}

/// Commands understood by a shading actuator
#[async_trait]
pub trait ActuatorDispatcher: Send + Sync {
    async fn open(&self, cover: &EntityId) -> Result<(), CommandError>;

    async fn close(&self, cover: &EntityId) -> Result<(), CommandError>;

    async fn stop(&self, cover: &EntityId) -> Result<(), CommandError>;

    /// Move to `position` percent open; values above 100 are clamped
    async fn set_position(&self, cover: &EntityId, position: u8) -> Result<(), CommandError>;
}

/// Commands for a profile's associated light
#[async_trait]
pub trait LightCoordinator: Send + Sync {
    async fn turn_on(&self, light: &EntityId, brightness_pct: u8) -> Result<(), CommandError>;

    async fn turn_off(&self, light: &EntityId) -> Result<(), CommandError>;
}

/// Open, falling back to the fully-open position
pub async fn open_with_fallback(
    dispatcher: &dyn ActuatorDispatcher,
    cover: &EntityId,
) -> Result<(), CommandError> {
    match dispatcher.open(cover).await {
        Err(e) if e.is_unsupported() => {
            debug!(cover = %cover, "open unsupported, using position");
            dispatcher.set_position(cover, FULLY_OPEN).await
        }
        result => result,
    }
}

/// Close, falling back to `fallback_position`
pub async fn close_with_fallback(
    dispatcher: &dyn ActuatorDispatcher,
    cover: &EntityId,
    fallback_position: u8,
) -> Result<(), CommandError> {
    match dispatcher.close(cover).await {
        Err(e) if e.is_unsupported() => {
            debug!(cover = %cover, position = fallback_position, "close unsupported, using position");
            dispatcher.set_position(cover, fallback_position).await
        }
        result => result,
    }
}

/// Dispatches cover commands as `cover.*` service calls
#[derive(Clone)]
pub struct ServiceDispatcher {
    services: Arc<ServiceRegistry>,
}

impl ServiceDispatcher {
    pub fn new(services: Arc<ServiceRegistry>) -> Self {
        Self { services }
    }

    async fn call(
        &self,
        service: &str,
        entity_id: &EntityId,
        data: serde_json::Value,
    ) -> Result<(), CommandError> {
        call_service(&self.services, cover::DOMAIN, service, entity_id, data).await
    }
}

#[async_trait]
impl ActuatorDispatcher for ServiceDispatcher {
    async fn open(&self, cover: &EntityId) -> Result<(), CommandError> {
        self.call(cover::OPEN_COVER, cover, json!({ ATTR_ENTITY_ID: cover }))
            .await
    }

    async fn close(&self, cover: &EntityId) -> Result<(), CommandError> {
        self.call(cover::CLOSE_COVER, cover, json!({ ATTR_ENTITY_ID: cover }))
            .await
    }

    async fn stop(&self, cover: &EntityId) -> Result<(), CommandError> {
        self.call(cover::STOP_COVER, cover, json!({ ATTR_ENTITY_ID: cover }))
            .await
    }

    async fn set_position(&self, cover: &EntityId, position: u8) -> Result<(), CommandError> {
        let position = clamp_position(i64::from(position));
        self.call(
            cover::SET_COVER_POSITION,
            cover,
            json!({ ATTR_ENTITY_ID: cover, (cover::ATTR_POSITION): position }),
        )
        .await
    }
}

/// Drives lights through `light.turn_on` / `light.turn_off`
///
/// Lights that do not currently exist are skipped silently.
#[derive(Clone)]
pub struct ServiceLightCoordinator {
    services: Arc<ServiceRegistry>,
    states: Arc<dyn SensorSnapshot>,
}

impl ServiceLightCoordinator {
    pub fn new(services: Arc<ServiceRegistry>, states: Arc<dyn SensorSnapshot>) -> Self {
        Self { services, states }
    }

    fn exists(&self, light: &EntityId) -> bool {
        let exists = self.states.read_state(light).is_some();
        if !exists {
            debug!(light = %light, "Light not found, skipping");
        }
        exists
    }
}

/// Percent to the 0..=255 `brightness` scale
pub fn brightness_from_pct(pct: u8) -> u8 {
    (u32::from(pct.min(100)) * 255 / 100) as u8
}

#[async_trait]
impl LightCoordinator for ServiceLightCoordinator {
    async fn turn_on(&self, light: &EntityId, brightness_pct: u8) -> Result<(), CommandError> {
        if !self.exists(light) {
            return Ok(());
        }
        let data = json!({
            ATTR_ENTITY_ID: light,
            (light::ATTR_BRIGHTNESS): brightness_from_pct(brightness_pct),
        });
        call_service(&self.services, light::DOMAIN, light::TURN_ON, light, data).await
    }

    async fn turn_off(&self, light: &EntityId) -> Result<(), CommandError> {
        if !self.exists(light) {
            return Ok(());
        }
        let data = json!({ ATTR_ENTITY_ID: light });
        call_service(&self.services, light::DOMAIN, light::TURN_OFF, light, data).await
    }
}

async fn call_service(
    services: &ServiceRegistry,
    domain: &str,
    service: &str,
    entity_id: &EntityId,
    data: serde_json::Value,
) -> Result<(), CommandError> {
    let service_id = format!("{}.{}", domain, service);
    if !services.has_service(domain, service) {
        return Err(CommandError::Unsupported {
            service: service_id,
            entity_id: entity_id.to_string(),
        });
    }

    debug!(service = %service_id, entity_id = %entity_id, "Calling service");
    services.call(domain, service, data).await.map_err(|source| {
        warn!(service = %service_id, entity_id = %entity_id, error = %source, "Service call failed");
        CommandError::Failed {
            service: service_id,
            entity_id: entity_id.to_string(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sp_core::ServiceCall;
    use sp_event_bus::EventBus;
    use sp_service_registry::ServiceError;
    use sp_state_store::StateStore;
    use std::collections::HashMap;
    use std::sync::Mutex;

    type Calls = Arc<Mutex<Vec<ServiceCall>>>;

    fn record(registry: &ServiceRegistry, calls: &Calls, domain: &str, service: &str) {
        let calls = calls.clone();
        registry.register(domain, service, move |call| {
            calls.lock().unwrap().push(call);
            async { Ok(()) }
        });
    }

    fn cover_id() -> EntityId {
        "cover.office".parse().unwrap()
    }

    #[test]
    fn test_clamp_and_brightness() {
        assert_eq!(clamp_position(-5), 0);
        assert_eq!(clamp_position(55), 55);
        assert_eq!(clamp_position(140), 100);

        assert_eq!(brightness_from_pct(100), 255);
        assert_eq!(brightness_from_pct(80), 204);
        assert_eq!(brightness_from_pct(0), 0);
    }

    #[tokio::test]
    async fn test_set_position_clamped() {
        let registry = Arc::new(ServiceRegistry::new());
        let calls = Calls::default();
        record(&registry, &calls, cover::DOMAIN, cover::SET_COVER_POSITION);

        let dispatcher = ServiceDispatcher::new(registry);
        dispatcher.set_position(&cover_id(), 250).await.unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].get::<u8>("position"), Some(100));
        assert_eq!(calls[0].entity_ids(), vec!["cover.office".to_string()]);
    }

    #[tokio::test]
    async fn test_open_falls_back_to_position() {
        let registry = Arc::new(ServiceRegistry::new());
        let calls = Calls::default();
        record(&registry, &calls, cover::DOMAIN, cover::SET_COVER_POSITION);
        let dispatcher = ServiceDispatcher::new(registry);

        assert!(dispatcher.open(&cover_id()).await.unwrap_err().is_unsupported());
        open_with_fallback(&dispatcher, &cover_id()).await.unwrap();
        close_with_fallback(&dispatcher, &cover_id(), 10).await.unwrap();

        let positions: Vec<_> = calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.get::<u8>("position"))
            .collect();
        assert_eq!(positions, vec![Some(100), Some(10)]);
    }

    #[tokio::test]
    async fn test_nothing_supported() {
        let dispatcher = ServiceDispatcher::new(Arc::new(ServiceRegistry::new()));
        let err = open_with_fallback(&dispatcher, &cover_id()).await.unwrap_err();
        assert!(err.is_unsupported());
    }

    #[tokio::test]
    async fn test_failed_call() {
        let registry = Arc::new(ServiceRegistry::new());
        registry.register(cover::DOMAIN, cover::STOP_COVER, |_| async {
            Err(ServiceError::CallFailed("motor jammed".into()))
        });
        let dispatcher = ServiceDispatcher::new(registry);

        let err = dispatcher.stop(&cover_id()).await.unwrap_err();
        assert!(!err.is_unsupported());
        assert!(err.to_string().contains("motor jammed"));
    }

    #[tokio::test]
    async fn test_light_only_when_present() {
        let registry = Arc::new(ServiceRegistry::new());
        let calls = Calls::default();
        record(&registry, &calls, light::DOMAIN, light::TURN_ON);
        record(&registry, &calls, light::DOMAIN, light::TURN_OFF);

        let states = Arc::new(StateStore::new(Arc::new(EventBus::new())));
        let lights = ServiceLightCoordinator::new(registry, states.clone());
        let desk: EntityId = "light.desk".parse().unwrap();

        lights.turn_on(&desk, 80).await.unwrap();
        assert!(calls.lock().unwrap().is_empty());

        states.set(desk.clone(), "off", HashMap::new());
        lights.turn_on(&desk, 80).await.unwrap();
        lights.turn_off(&desk).await.unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].service, "turn_on");
        assert_eq!(calls[0].get::<u8>("brightness"), Some(204));
        assert_eq!(calls[1].service, "turn_off");
    }
}
