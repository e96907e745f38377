//! Test hub
//!
//! An isolated state store, event bus and service registry with captured
//! service calls, plus a mock wall clock anchored to Tokio time.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::json;
use sp_core::domains::{cover, light};
use sp_core::{EntityId, ServiceCall, State};
use sp_engine::{EngineContext, MockClock};
use sp_event_bus::EventBus;
use sp_service_registry::ServiceRegistry;
use sp_state_store::StateStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Every cover service
pub const ALL_COVER_SERVICES: &[&str] = &[
    cover::OPEN_COVER,
    cover::CLOSE_COVER,
    cover::STOP_COVER,
    cover::SET_COVER_POSITION,
];

/// Wall-clock time on the test day (a Wednesday)
pub fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 6, 10)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

/// Let spawned listeners, timers and controllers run until they block
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// Advance paused Tokio time and let everything react
pub async fn advance_secs(secs: u64) {
    tokio::time::advance(std::time::Duration::from_secs(secs)).await;
    settle().await;
}

pub struct TestHub {
    pub bus: Arc<EventBus>,
    pub states: Arc<StateStore>,
    pub services: Arc<ServiceRegistry>,
    pub clock: MockClock,
    captured_service_calls: Arc<Mutex<Vec<ServiceCall>>>,
}

impl TestHub {
    /// A hub offering every cover service and both light services
    pub fn new(wall: NaiveDateTime) -> Self {
        Self::with_cover_services(wall, ALL_COVER_SERVICES)
    }

    /// A hub offering only the given cover services
    pub fn with_cover_services(wall: NaiveDateTime, cover_services: &[&str]) -> Self {
        let bus = Arc::new(EventBus::new());
        let states = Arc::new(StateStore::new(bus.clone()));
        let services = Arc::new(ServiceRegistry::new());

        let hub = Self {
            bus,
            states,
            services,
            clock: MockClock::starting_at(wall),
            captured_service_calls: Arc::new(Mutex::new(Vec::new())),
        };
        for service in cover_services {
            hub.record(cover::DOMAIN, service);
        }
        hub.record(light::DOMAIN, light::TURN_ON);
        hub.record(light::DOMAIN, light::TURN_OFF);
        hub
    }

    fn record(&self, domain: &str, service: &str) {
        let calls = self.captured_service_calls.clone();
        self.services.register(domain, service, move |call| {
            calls.lock().unwrap().push(call);
            async { Ok(()) }
        });
    }

    /// Engine collaborators wired to this hub
    pub fn context(&self) -> EngineContext {
        EngineContext::new(self.bus.clone(), self.states.clone(), self.services.clone())
            .with_clock(Arc::new(self.clock.clone()))
    }

    pub fn set_state(
        &self,
        entity_id: &str,
        state: &str,
        attributes: HashMap<String, serde_json::Value>,
    ) -> State {
        let entity_id: EntityId = entity_id.parse().expect("Invalid entity_id");
        self.states.set(entity_id, state, attributes)
    }

    /// Report a cover at `position` percent open
    pub fn set_cover(&self, entity_id: &str, position: i64) -> State {
        let state = if position > 0 { "open" } else { "closed" };
        self.set_state(
            entity_id,
            state,
            HashMap::from([("current_position".to_string(), json!(position))]),
        )
    }

    pub fn set_sun(&self, elevation: f64, azimuth: f64) -> State {
        let state = if elevation >= 0.0 {
            "above_horizon"
        } else {
            "below_horizon"
        };
        self.set_state(
            "sun.sun",
            state,
            HashMap::from([
                ("elevation".to_string(), json!(elevation)),
                ("azimuth".to_string(), json!(azimuth)),
            ]),
        )
    }

    pub fn captured_service_calls(&self) -> Vec<ServiceCall> {
        self.captured_service_calls.lock().unwrap().clone()
    }

    /// Captured calls for one domain
    pub fn service_calls(&self, domain: &str) -> Vec<ServiceCall> {
        self.captured_service_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.domain == domain)
            .cloned()
            .collect()
    }

    /// Cover calls as `(service, position)` pairs
    pub fn cover_commands(&self) -> Vec<(String, Option<i64>)> {
        self.service_calls(cover::DOMAIN)
            .into_iter()
            .map(|c| {
                let position = c.get::<i64>(cover::ATTR_POSITION);
                (c.service, position)
            })
            .collect()
    }

    pub fn clear_service_calls(&self) {
        self.captured_service_calls.lock().unwrap().clear();
    }
}

/// Shorthand for an expected cover command
pub fn command(service: &str, position: Option<i64>) -> (String, Option<i64>) {
    (service.to_string(), position)
}
