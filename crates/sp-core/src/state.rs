//! Snapshot of an entity's state

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domains::{cover, STATE_OPEN, STATE_ON, STATE_UNAVAILABLE};
use crate::EntityId;

/// The state of an entity at a point in time
///
/// The state value is always a string (`"on"`, `"open"`, `"23.5"`, ...);
/// structured data such as a cover's position lives in the attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    /// The entity this state belongs to
    pub entity_id: EntityId,

    /// The raw state value
    pub state: String,

    /// Additional attributes associated with the state
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// When the state value last changed
    pub last_changed: DateTime<Utc>,

    /// When the state was last written, even if unchanged
    pub last_updated: DateTime<Utc>,
}

impl State {
    /// Create a new state stamped with the current time
    pub fn new(
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            entity_id,
            state: state.into(),
            attributes,
            last_changed: now,
            last_updated: now,
        }
    }

    /// Create the successor of this state, keeping `last_changed` when the value is unchanged
    pub fn with_update(
        &self,
        new_state: impl Into<String>,
        new_attributes: HashMap<String, serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        let new_state = new_state.into();
        let last_changed = if self.state == new_state {
            self.last_changed
        } else {
            now
        };

        Self {
            entity_id: self.entity_id.clone(),
            state: new_state,
            attributes: new_attributes,
            last_changed,
            last_updated: now,
        }
    }

    /// Whether the entity reports itself unavailable
    pub fn is_unavailable(&self) -> bool {
        self.state == STATE_UNAVAILABLE
    }

    /// Whether the state reads as "on" for a binary contact (`on`, `open` or `true`)
    pub fn is_on(&self) -> bool {
        matches!(self.state.as_str(), STATE_ON | STATE_OPEN | "true")
    }

    /// The state value parsed as a number, if it is one
    pub fn as_f64(&self) -> Option<f64> {
        self.state.trim().parse::<f64>().ok().filter(|v| v.is_finite())
    }

    /// Get an attribute value by key
    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Numeric attribute, accepting both JSON numbers and numeric strings
    pub fn numeric_attribute(&self, key: &str) -> Option<f64> {
        match self.attributes.get(key)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// The `current_position` attribute of a cover, rounded to whole percent
    pub fn current_position(&self) -> Option<i64> {
        self.numeric_attribute(cover::ATTR_CURRENT_POSITION)
            .map(|p| p.round() as i64)
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        // Timestamps are not compared
        self.entity_id == other.entity_id
            && self.state == other.state
            && self.attributes == other.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(entity_id: &str, value: &str, attrs: HashMap<String, serde_json::Value>) -> State {
        State::new(entity_id.parse().unwrap(), value, attrs)
    }

    #[test]
    fn test_numeric_state() {
        assert_eq!(state("sensor.lux", "1234.5", HashMap::new()).as_f64(), Some(1234.5));
        assert_eq!(state("sensor.lux", "unavailable", HashMap::new()).as_f64(), None);
        assert_eq!(state("sensor.lux", "NaN", HashMap::new()).as_f64(), None);
    }

    #[test]
    fn test_binary_contact() {
        assert!(state("binary_sensor.window", "on", HashMap::new()).is_on());
        assert!(state("binary_sensor.window", "open", HashMap::new()).is_on());
        assert!(!state("binary_sensor.window", "off", HashMap::new()).is_on());
        assert!(!state("binary_sensor.window", "unknown", HashMap::new()).is_on());
    }

    #[test]
    fn test_current_position() {
        let attrs = HashMap::from([("current_position".to_string(), json!(42))]);
        assert_eq!(state("cover.kitchen", "open", attrs).current_position(), Some(42));

        let attrs = HashMap::from([("current_position".to_string(), json!("17.6"))]);
        assert_eq!(state("cover.kitchen", "open", attrs).current_position(), Some(18));

        assert_eq!(
            state("cover.kitchen", "open", HashMap::new()).current_position(),
            None
        );
    }

    #[test]
    fn test_update_preserves_last_changed() {
        let first = state("sensor.temp", "20", HashMap::new());
        let same = first.with_update("20", HashMap::new());
        assert_eq!(first.last_changed, same.last_changed);

        let changed = same.with_update("21", HashMap::new());
        assert!(changed.last_changed >= same.last_changed);
        assert_eq!(changed.state, "21");
    }
}
