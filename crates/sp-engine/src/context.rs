//! Collaborators shared by every profile controller

use sp_event_bus::EventBus;
use sp_service_registry::ServiceRegistry;
use sp_state_store::StateStore;
use std::sync::Arc;

use crate::clock::{SharedClock, SystemClock};
use crate::dispatch::{ActuatorDispatcher, LightCoordinator, ServiceDispatcher, ServiceLightCoordinator};
use crate::sensors::{SensorSnapshot, SunGeometry};
use crate::status::StatusBus;

/// Everything a controller talks to outside of its own state
#[derive(Clone)]
pub struct EngineContext {
    /// Source of state-changed events
    pub bus: Arc<EventBus>,
    pub sensors: Arc<dyn SensorSnapshot>,
    pub sun: Arc<dyn SunGeometry>,
    pub actuator: Arc<dyn ActuatorDispatcher>,
    pub lights: Arc<dyn LightCoordinator>,
    pub clock: SharedClock,
    pub status: StatusBus,
}

impl EngineContext {
    /// Wire the engine to a state store and service registry, using local time
    pub fn new(bus: Arc<EventBus>, states: Arc<StateStore>, services: Arc<ServiceRegistry>) -> Self {
        Self {
            bus,
            sensors: states.clone(),
            sun: states.clone(),
            actuator: Arc::new(ServiceDispatcher::new(services.clone())),
            lights: Arc::new(ServiceLightCoordinator::new(services, states)),
            clock: Arc::new(SystemClock),
            status: StatusBus::new(),
        }
    }

    /// Replace the wall clock
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }
}
