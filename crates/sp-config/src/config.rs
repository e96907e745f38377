//! Top-level configuration document

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::area::{AreaTemplate, RawArea};
use crate::error::{ConfigError, ConfigResult};
use crate::global::GlobalSettings;
use crate::loader::{load_yaml, load_yaml_string};
use crate::profile::{ProfileConfig, RawProfile};

/// The configuration file as written, before validation
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RawConfig {
    pub global_auto: bool,
    pub default_ventilation_position: i64,
    pub default_cooldown: i64,
    /// `HH:MM:SS` at which latched triggers are cleared
    pub daily_reset: String,
    /// Seconds between safety re-evaluations
    pub tick_interval: u64,
    pub summer_start: String,
    pub summer_end: String,
    pub sun_elevation_end: f64,
    pub sun_offset_up: i64,
    pub sun_offset_down: i64,
    pub areas: BTreeMap<String, RawArea>,
    pub profiles: Vec<RawProfile>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            global_auto: true,
            default_ventilation_position: 30,
            default_cooldown: 120,
            daily_reset: "03:00:00".to_string(),
            tick_interval: 60,
            summer_start: "05-01".to_string(),
            summer_end: "09-30".to_string(),
            sun_elevation_end: 3.0,
            sun_offset_up: 0,
            sun_offset_down: 0,
            areas: BTreeMap::new(),
            profiles: Vec::new(),
        }
    }
}

/// Validated ShutterPilot configuration
///
/// Built once at load time; every default is resolved and every reference
/// checked, so consumers never see raw option values.
#[derive(Debug, Clone, PartialEq)]
pub struct ShutterPilotConfig {
    pub global: GlobalSettings,
    pub areas: BTreeMap<String, Arc<AreaTemplate>>,
    pub profiles: Vec<ProfileConfig>,
}

impl ShutterPilotConfig {
    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");
        Self::from_value(load_yaml(path)?)
    }

    /// Parse and validate configuration from a YAML string
    ///
    /// `!include` paths are resolved relative to the working directory.
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        Self::from_value(load_yaml_string(".", content, "<inline>")?)
    }

    /// Validate an already tag-processed YAML document
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        let raw: RawConfig = if value.is_null() {
            RawConfig::default()
        } else {
            serde_yaml::from_value(value).map_err(|e| ConfigError::Structure { source: e })?
        };
        Self::from_raw(raw)
    }

    pub fn from_raw(raw: RawConfig) -> ConfigResult<Self> {
        let global = GlobalSettings::resolve(&raw)?;

        let mut areas = BTreeMap::new();
        for (id, raw_area) in raw.areas {
            let area = AreaTemplate::resolve(&id, raw_area)?;
            areas.insert(id, Arc::new(area));
        }

        let mut seen = HashSet::new();
        let mut profiles = Vec::with_capacity(raw.profiles.len());
        for raw_profile in raw.profiles {
            let profile = ProfileConfig::resolve(raw_profile, &global, &areas)?;
            if !seen.insert(profile.name.clone()) {
                return Err(ConfigError::DuplicateProfile { name: profile.name });
            }
            debug!(profile = %profile.name, cover = %profile.cover, "Validated profile");
            profiles.push(profile);
        }

        info!(
            areas = areas.len(),
            profiles = profiles.len(),
            global_auto = global.global_auto,
            "Configuration validated"
        );

        Ok(Self {
            global,
            areas,
            profiles,
        })
    }

    pub fn profile(&self, name: &str) -> Option<&ProfileConfig> {
        self.profiles.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::AreaMode;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    const FULL: &str = r#"
global_auto: true
default_ventilation_position: 25
default_cooldown: 90
daily_reset: "03:00:00"
areas:
  living:
    area_mode: brightness
    brightness_sensor: sensor.outdoor_lux
    brightness_down_lux: 5000
    brightness_up_lux: 15000
  sleeping:
    up_time_weekday: "06:45"
    down_time_weekday: "21:00"
profiles:
  - name: Living room
    cover_entity_id: cover.living_room
    area: living
    window_sensor: binary_sensor.living_window
    door_sensor: binary_sensor.patio_door
    door_safe_position: 60
  - name: Bedroom
    cover_entity_id: cover.bedroom
    area: sleeping
    vent_position: 40
    cooldown_sec: 300
    light_entity: light.bedroom
"#;

    #[test]
    fn test_full_document() {
        let config = ShutterPilotConfig::from_yaml_str(FULL).unwrap();

        assert_eq!(config.areas.len(), 2);
        assert_eq!(config.areas["living"].mode, AreaMode::Brightness);

        let living = config.profile("Living room").unwrap();
        assert_eq!(living.vent_position, 25);
        assert_eq!(living.door_safe_position(), 60);
        assert_eq!(living.cooldown, Duration::from_secs(90));
        assert_eq!(living.area.as_ref().unwrap().id, "living");

        let bedroom = config.profile("Bedroom").unwrap();
        assert_eq!(bedroom.vent_position, 40);
        assert_eq!(bedroom.door_safe_position(), 40);
        assert_eq!(bedroom.cooldown, Duration::from_secs(300));
        assert_eq!(bedroom.light.as_ref().unwrap().brightness_pct, 80);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ShutterPilotConfig::from_value(Value::Null).unwrap();
        assert!(config.profiles.is_empty());
        assert!(config.global.global_auto);
    }

    #[test]
    fn test_duplicate_profile_names() {
        let yaml = r#"
profiles:
  - name: Office
    cover_entity_id: cover.office
  - name: Office
    cover_entity_id: cover.office_2
"#;
        assert!(matches!(
            ShutterPilotConfig::from_yaml_str(yaml),
            Err(ConfigError::DuplicateProfile { .. })
        ));
    }

    #[test]
    fn test_wrong_shape() {
        let result = ShutterPilotConfig::from_yaml_str("profiles: yes please\n");
        assert!(matches!(result, Err(ConfigError::Structure { .. })));
    }

    #[test]
    fn test_load_with_included_profiles() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("profiles.yaml"),
            "- name: Office\n  cover_entity_id: cover.office\n  up_time: \"07:15\"\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("shutterpilot.yaml"),
            "default_cooldown: 30\nprofiles: !include profiles.yaml\n",
        )
        .unwrap();

        let config = ShutterPilotConfig::load(dir.path().join("shutterpilot.yaml")).unwrap();
        let office = config.profile("Office").unwrap();
        assert_eq!(office.cooldown, Duration::from_secs(30));
        assert!(office.up_time.is_some());
    }
}
