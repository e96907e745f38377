//! Service call type used to command actuators and lights

use serde::{Deserialize, Serialize};

/// A call to a `domain.service` pair, e.g. `cover.set_cover_position`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCall {
    /// The domain the service belongs to (`cover`, `light`)
    pub domain: String,

    /// The service name (`open_cover`, `turn_on`, ...)
    pub service: String,

    /// Data passed to the service (`entity_id`, `position`, `brightness`)
    pub service_data: serde_json::Value,
}

impl ServiceCall {
    pub fn new(
        domain: impl Into<String>,
        service: impl Into<String>,
        service_data: serde_json::Value,
    ) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            service_data,
        }
    }

    /// Full service identifier (`domain.service`)
    pub fn service_id(&self) -> String {
        format!("{}.{}", self.domain, self.service)
    }

    /// Get a typed value from service_data
    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.service_data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Target entity ids, accepting both a single string and a list
    pub fn entity_ids(&self) -> Vec<String> {
        match self.service_data.get("entity_id") {
            Some(serde_json::Value::String(s)) => vec![s.clone()],
            Some(serde_json::Value::Array(arr)) => arr
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_position_call() {
        let call = ServiceCall::new(
            "cover",
            "set_cover_position",
            json!({"entity_id": "cover.office", "position": 30}),
        );

        assert_eq!(call.service_id(), "cover.set_cover_position");
        assert_eq!(call.get::<u8>("position"), Some(30));
        assert_eq!(call.get::<u8>("brightness"), None);
        assert_eq!(call.entity_ids(), vec!["cover.office"]);
    }

    #[test]
    fn test_entity_id_list() {
        let call = ServiceCall::new(
            "light",
            "turn_off",
            json!({"entity_id": ["light.desk", "light.shelf"]}),
        );
        assert_eq!(call.entity_ids(), vec!["light.desk", "light.shelf"]);

        let call = ServiceCall::new("cover", "stop_cover", json!({}));
        assert!(call.entity_ids().is_empty());
    }
}
