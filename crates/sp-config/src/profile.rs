//! Per-actuator profile configuration

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use sp_core::domains::{cover, light};
use sp_core::EntityId;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::area::AreaTemplate;
use crate::error::{ConfigError, ConfigResult};
use crate::global::GlobalSettings;
use crate::parse;

/// Upper bound for a profile's `cooldown_sec`
pub const MAX_PROFILE_COOLDOWN: i64 = 1800;

/// Highest allowed ventilation and door-safe position
pub const MAX_VENTILATION_POSITION: u8 = 80;

/// Area reference meaning "no area"
const AREA_NONE: &str = "none";

/// Profile as written in the configuration file
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RawProfile {
    pub name: String,
    pub cover_entity_id: String,
    pub area: Option<String>,
    pub window_sensor: Option<String>,
    pub door_sensor: Option<String>,
    pub day_position: i64,
    pub night_position: i64,
    pub vent_position: Option<i64>,
    pub door_safe_position: Option<i64>,
    pub lux_sensor: Option<String>,
    pub temp_sensor: Option<String>,
    pub lux_threshold: f64,
    pub temp_threshold: f64,
    pub lux_hysteresis: i64,
    pub temp_hysteresis: i64,
    pub up_time: Option<String>,
    pub down_time: Option<String>,
    pub azimuth_min: f64,
    pub azimuth_max: f64,
    pub cooldown_sec: Option<i64>,
    pub enabled: bool,

    pub window_open_delay: i64,
    pub window_close_delay: i64,
    pub intermediate_position: i64,
    pub intermediate_time: Option<String>,
    pub heat_protection_enabled: bool,
    pub heat_protection_temp: f64,
    pub keep_in_sunprotect: bool,
    pub brightness_end_delay: i64,
    pub no_close_in_summer: bool,

    pub light_entity: Option<String>,
    pub light_brightness: i64,
    pub light_on_shade: bool,
    pub light_on_night: bool,
}

impl Default for RawProfile {
    fn default() -> Self {
        Self {
            name: String::new(),
            cover_entity_id: String::new(),
            area: None,
            window_sensor: None,
            door_sensor: None,
            day_position: 40,
            night_position: 0,
            vent_position: None,
            door_safe_position: None,
            lux_sensor: None,
            temp_sensor: None,
            lux_threshold: 20000.0,
            temp_threshold: 26.0,
            lux_hysteresis: 20,
            temp_hysteresis: 10,
            up_time: None,
            down_time: None,
            azimuth_min: -360.0,
            azimuth_max: 360.0,
            cooldown_sec: None,
            enabled: true,
            window_open_delay: 0,
            window_close_delay: 0,
            intermediate_position: 0,
            intermediate_time: None,
            heat_protection_enabled: false,
            heat_protection_temp: 30.0,
            keep_in_sunprotect: false,
            brightness_end_delay: 0,
            no_close_in_summer: false,
            light_entity: None,
            light_brightness: 80,
            light_on_shade: true,
            light_on_night: true,
        }
    }
}

/// Light that follows the profile's shading and night decisions
#[derive(Debug, Clone, PartialEq)]
pub struct LightConfig {
    pub entity: EntityId,
    /// Brightness used when turning on, in percent
    pub brightness_pct: u8,
    /// Turn on when the sun-shade position is taken
    pub on_shade: bool,
    /// Turn on when the night position is taken
    pub on_night: bool,
}

/// Options that are validated and exposed but do not influence decisions
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedOptions {
    pub window_open_delay: Duration,
    pub window_close_delay: Duration,
    pub intermediate_position: u8,
    pub intermediate_time: Option<NaiveTime>,
    pub heat_protection: bool,
    pub heat_protection_temp: f64,
    pub keep_in_sunprotect: bool,
    pub brightness_end_delay: Duration,
    pub no_close_in_summer: bool,
}

/// Validated configuration of one shading actuator
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileConfig {
    pub name: String,
    /// The cover this profile drives
    pub cover: EntityId,
    pub area: Option<Arc<AreaTemplate>>,
    pub window_sensor: Option<EntityId>,
    pub door_sensor: Option<EntityId>,
    pub lux_sensor: Option<EntityId>,
    pub temp_sensor: Option<EntityId>,

    pub day_position: u8,
    pub night_position: u8,
    pub vent_position: u8,
    /// As configured; see [`ProfileConfig::door_safe_position`]
    pub door_safe_configured: u8,

    pub lux_threshold: f64,
    pub temp_threshold: f64,
    /// Hysteresis in percent of the threshold
    pub lux_hysteresis: u8,
    pub temp_hysteresis: u8,
    pub azimuth_min: f64,
    pub azimuth_max: f64,

    /// Overrides the area's schedule when set
    pub up_time: Option<NaiveTime>,
    pub down_time: Option<NaiveTime>,

    pub cooldown: Duration,
    pub enabled: bool,
    pub extended: ExtendedOptions,
    pub light: Option<LightConfig>,
}

impl ProfileConfig {
    pub(crate) fn resolve(
        raw: RawProfile,
        global: &GlobalSettings,
        areas: &BTreeMap<String, Arc<AreaTemplate>>,
    ) -> ConfigResult<Self> {
        let name = raw.name.trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::invalid("profiles[].name", "must not be empty"));
        }
        let key = |field: &str| format!("profiles[{}].{}", name, field);

        let area = match parse::non_blank(raw.area) {
            None => None,
            Some(a) if a == AREA_NONE => None,
            Some(a) => Some(areas.get(&a).cloned().ok_or_else(|| ConfigError::UnknownArea {
                profile: name.clone(),
                area: a.clone(),
            })?),
        };

        let vent_position = parse::position(
            &key("vent_position"),
            raw.vent_position
                .unwrap_or(i64::from(global.default_ventilation_position)),
            MAX_VENTILATION_POSITION,
        )?;
        let door_safe_configured = parse::position(
            &key("door_safe_position"),
            raw.door_safe_position.unwrap_or(i64::from(vent_position)),
            MAX_VENTILATION_POSITION,
        )?;

        let azimuth_min = parse::finite(&key("azimuth_min"), raw.azimuth_min)?;
        let azimuth_max = parse::finite(&key("azimuth_max"), raw.azimuth_max)?;
        if azimuth_min > azimuth_max {
            return Err(ConfigError::invalid(
                key("azimuth_min"),
                format!("{} exceeds azimuth_max {}", azimuth_min, azimuth_max),
            ));
        }

        let cooldown = match raw.cooldown_sec {
            Some(secs) => parse::seconds(&key("cooldown_sec"), secs, MAX_PROFILE_COOLDOWN)?,
            None => global.default_cooldown.as_secs(),
        };

        let light = match parse::non_blank(raw.light_entity) {
            Some(entity) => Some(LightConfig {
                entity: parse::entity_in_domain(&key("light_entity"), &entity, light::DOMAIN)?,
                brightness_pct: parse::position(
                    &key("light_brightness"),
                    raw.light_brightness,
                    100,
                )?,
                on_shade: raw.light_on_shade,
                on_night: raw.light_on_night,
            }),
            None => None,
        };

        let extended = ExtendedOptions {
            window_open_delay: Duration::from_secs(parse::seconds(
                &key("window_open_delay"),
                raw.window_open_delay,
                i64::from(u32::MAX),
            )?),
            window_close_delay: Duration::from_secs(parse::seconds(
                &key("window_close_delay"),
                raw.window_close_delay,
                i64::from(u32::MAX),
            )?),
            intermediate_position: parse::position(
                &key("intermediate_position"),
                raw.intermediate_position,
                100,
            )?,
            intermediate_time: parse::optional_time(
                &key("intermediate_time"),
                raw.intermediate_time,
            )?,
            heat_protection: raw.heat_protection_enabled,
            heat_protection_temp: parse::finite(
                &key("heat_protection_temp"),
                raw.heat_protection_temp,
            )?,
            keep_in_sunprotect: raw.keep_in_sunprotect,
            // Configured in minutes
            brightness_end_delay: Duration::from_secs(
                parse::seconds(
                    &key("brightness_end_delay"),
                    raw.brightness_end_delay,
                    i64::from(u32::MAX),
                )? * 60,
            ),
            no_close_in_summer: raw.no_close_in_summer,
        };

        Ok(Self {
            cover: parse::entity_in_domain(
                &key("cover_entity_id"),
                &raw.cover_entity_id,
                cover::DOMAIN,
            )?,
            area,
            window_sensor: parse::optional_entity(&key("window_sensor"), raw.window_sensor)?,
            door_sensor: parse::optional_entity(&key("door_sensor"), raw.door_sensor)?,
            lux_sensor: parse::optional_entity(&key("lux_sensor"), raw.lux_sensor)?,
            temp_sensor: parse::optional_entity(&key("temp_sensor"), raw.temp_sensor)?,
            day_position: parse::position(&key("day_position"), raw.day_position, 100)?,
            night_position: parse::position(&key("night_position"), raw.night_position, 100)?,
            vent_position,
            door_safe_configured,
            lux_threshold: parse::finite(&key("lux_threshold"), raw.lux_threshold)?,
            temp_threshold: parse::finite(&key("temp_threshold"), raw.temp_threshold)?,
            lux_hysteresis: parse::position(&key("lux_hysteresis"), raw.lux_hysteresis, 100)?,
            temp_hysteresis: parse::position(&key("temp_hysteresis"), raw.temp_hysteresis, 100)?,
            azimuth_min,
            azimuth_max,
            up_time: parse::optional_time(&key("up_time"), raw.up_time)?,
            down_time: parse::optional_time(&key("down_time"), raw.down_time)?,
            cooldown: Duration::from_secs(cooldown),
            enabled: raw.enabled,
            extended,
            light,
            name,
        })
    }

    /// Position taken while a door is fully open; never below the ventilation position
    pub fn door_safe_position(&self) -> u8 {
        self.vent_position.max(self.door_safe_configured)
    }

    /// The profile's up-time, or the area's for that day of the week
    pub fn up_time_on(&self, weekday: Weekday) -> Option<NaiveTime> {
        self.up_time
            .or_else(|| self.area.as_ref().and_then(|a| a.up_time(weekday)))
    }

    /// The profile's down-time, or the area's for that day of the week
    pub fn down_time_on(&self, weekday: Weekday) -> Option<NaiveTime> {
        self.down_time
            .or_else(|| self.area.as_ref().and_then(|a| a.down_time(weekday)))
    }

    pub fn in_azimuth(&self, azimuth: f64) -> bool {
        self.azimuth_min <= azimuth && azimuth <= self.azimuth_max
    }

    /// Every entity whose changes should trigger an evaluation
    pub fn watched_sensors(&self) -> Vec<EntityId> {
        let area_sensor = self
            .area
            .as_ref()
            .filter(|a| a.is_brightness_mode())
            .and_then(|a| a.brightness_sensor.clone());

        [
            self.window_sensor.clone(),
            self.door_sensor.clone(),
            self.lux_sensor.clone(),
            self.temp_sensor.clone(),
            area_sensor,
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}
