//! Read-only views of sensor values and sun geometry
//!
//! Controllers never hold on to sensor values; they read a fresh snapshot
//! at every evaluation. Missing or malformed values fall back to the
//! caller's default.

use sp_core::domains::{sun, STATE_CLOSED, STATE_ON, STATE_OPEN, STATE_TILTED};
use sp_core::{EntityId, State};
use sp_state_store::StateStore;
use std::fmt;

/// On-demand access to current sensor values
pub trait SensorSnapshot: Send + Sync {
    /// Latest state of an entity, if known
    fn read_state(&self, entity_id: &EntityId) -> Option<State>;

    /// Whether a binary sensor is on; false when unknown or missing
    fn read_bool(&self, entity_id: &EntityId) -> bool {
        self.read_state(entity_id).is_some_and(|s| s.is_on())
    }

    /// Numeric sensor value, or `default` when missing or not a number
    fn read_float(&self, entity_id: &EntityId, default: f64) -> f64 {
        self.read_state(entity_id)
            .and_then(|s| s.as_f64())
            .unwrap_or(default)
    }

    /// Whether the entity exists and is reachable
    fn is_available(&self, entity_id: &EntityId) -> bool {
        self.read_state(entity_id).is_some_and(|s| !s.is_unavailable())
    }
}

impl SensorSnapshot for StateStore {
    fn read_state(&self, entity_id: &EntityId) -> Option<State> {
        self.get(&entity_id.to_string())
    }
}

/// Sun elevation and azimuth in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SunPosition {
    pub elevation: f64,
    pub azimuth: f64,
}

/// Source of the current sun position; (0, 0) when unknown
pub trait SunGeometry: Send + Sync {
    fn current_position(&self) -> SunPosition;
}

impl SunGeometry for StateStore {
    fn current_position(&self) -> SunPosition {
        match self.get(sun::ENTITY_ID) {
            Some(state) => SunPosition {
                elevation: state.numeric_attribute(sun::ATTR_ELEVATION).unwrap_or(0.0),
                azimuth: state.numeric_attribute(sun::ATTR_AZIMUTH).unwrap_or(0.0),
            },
            None => SunPosition::default(),
        }
    }
}

/// Three-way door contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DoorState {
    #[default]
    Closed,
    Tilted,
    Open,
}

impl DoorState {
    /// Classify a door sensor state; anything unrecognised counts as closed
    pub fn from_state(state: Option<&State>) -> Self {
        match state.map(|s| s.state.as_str()) {
            Some(STATE_OPEN) | Some(STATE_ON) => DoorState::Open,
            Some(STATE_TILTED) => DoorState::Tilted,
            _ => DoorState::Closed,
        }
    }

    pub fn read(sensors: &dyn SensorSnapshot, door: Option<&EntityId>) -> Self {
        match door {
            Some(id) => Self::from_state(sensors.read_state(id).as_ref()),
            None => DoorState::Closed,
        }
    }

    /// Open or tilted
    pub fn is_opening(self) -> bool {
        self != DoorState::Closed
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DoorState::Closed => STATE_CLOSED,
            DoorState::Tilted => STATE_TILTED,
            DoorState::Open => STATE_OPEN,
        })
    }
}
