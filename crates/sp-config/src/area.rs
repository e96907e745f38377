//! Area templates: shared schedule and mode defaults for a group of profiles

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use sp_core::EntityId;
use std::fmt;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::parse;

/// How an area decides when to move its covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaMode {
    #[default]
    TimeOnly,
    Sun,
    GoldenHour,
    Brightness,
}

impl fmt::Display for AreaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AreaMode::TimeOnly => "time_only",
            AreaMode::Sun => "sun",
            AreaMode::GoldenHour => "golden_hour",
            AreaMode::Brightness => "brightness",
        })
    }
}

/// Area as written in the configuration file
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RawArea {
    pub area_name: Option<String>,
    pub area_mode: AreaMode,
    pub up_time_weekday: Option<String>,
    pub down_time_weekday: Option<String>,
    pub up_time_weekend: Option<String>,
    pub down_time_weekend: Option<String>,
    pub up_earliest: Option<String>,
    pub up_latest: Option<String>,
    pub stagger_delay: i64,
    pub brightness_sensor: Option<String>,
    pub brightness_down_lux: f64,
    pub brightness_up_lux: f64,
}

impl Default for RawArea {
    fn default() -> Self {
        Self {
            area_name: None,
            area_mode: AreaMode::TimeOnly,
            up_time_weekday: None,
            down_time_weekday: None,
            up_time_weekend: None,
            down_time_weekend: None,
            up_earliest: None,
            up_latest: None,
            stagger_delay: 0,
            brightness_sensor: None,
            brightness_down_lux: 5000.0,
            brightness_up_lux: 15000.0,
        }
    }
}

/// Validated, read-only area template
#[derive(Debug, Clone, PartialEq)]
pub struct AreaTemplate {
    /// Key under `areas:`
    pub id: String,
    /// Display name, defaults to the key
    pub name: String,
    pub mode: AreaMode,
    pub up_time_weekday: Option<NaiveTime>,
    pub down_time_weekday: Option<NaiveTime>,
    pub up_time_weekend: Option<NaiveTime>,
    pub down_time_weekend: Option<NaiveTime>,
    /// Up-times earlier than this are moved to it
    pub up_earliest: Option<NaiveTime>,
    /// Up-times later than this are moved to it
    pub up_latest: Option<NaiveTime>,
    pub stagger_delay: Duration,
    pub brightness_sensor: Option<EntityId>,
    /// Below this illuminance the area goes down
    pub brightness_down_lux: f64,
    /// Above this illuminance the area goes up
    pub brightness_up_lux: f64,
}

fn is_weekend(weekday: Weekday) -> bool {
    matches!(weekday, Weekday::Sat | Weekday::Sun)
}

impl AreaTemplate {
    pub(crate) fn resolve(id: &str, raw: RawArea) -> ConfigResult<Self> {
        let key = |field: &str| format!("areas.{}.{}", id, field);

        let down = parse::finite(&key("brightness_down_lux"), raw.brightness_down_lux)?;
        let up = parse::finite(&key("brightness_up_lux"), raw.brightness_up_lux)?;
        if down > up {
            return Err(ConfigError::invalid(
                key("brightness_down_lux"),
                format!("{} exceeds brightness_up_lux {}", down, up),
            ));
        }

        let up_earliest = parse::optional_time(&key("up_earliest"), raw.up_earliest)?;
        let up_latest = parse::optional_time(&key("up_latest"), raw.up_latest)?;
        if let (Some(earliest), Some(latest)) = (up_earliest, up_latest) {
            if earliest > latest {
                return Err(ConfigError::invalid(
                    key("up_earliest"),
                    "is later than up_latest",
                ));
            }
        }

        Ok(Self {
            id: id.to_string(),
            name: parse::non_blank(raw.area_name).unwrap_or_else(|| id.to_string()),
            mode: raw.area_mode,
            up_time_weekday: parse::optional_time(&key("up_time_weekday"), raw.up_time_weekday)?,
            down_time_weekday: parse::optional_time(
                &key("down_time_weekday"),
                raw.down_time_weekday,
            )?,
            up_time_weekend: parse::optional_time(&key("up_time_weekend"), raw.up_time_weekend)?,
            down_time_weekend: parse::optional_time(
                &key("down_time_weekend"),
                raw.down_time_weekend,
            )?,
            up_earliest,
            up_latest,
            stagger_delay: Duration::from_secs(parse::seconds(
                &key("stagger_delay"),
                raw.stagger_delay,
                i64::from(u32::MAX),
            )?),
            brightness_sensor: parse::optional_entity(
                &key("brightness_sensor"),
                raw.brightness_sensor,
            )?,
            brightness_down_lux: down,
            brightness_up_lux: up,
        })
    }

    /// Up-time for a day of the week, clamped into `[up_earliest, up_latest]`
    pub fn up_time(&self, weekday: Weekday) -> Option<NaiveTime> {
        let time = if is_weekend(weekday) {
            self.up_time_weekend
        } else {
            self.up_time_weekday
        }?;

        let time = match self.up_earliest {
            Some(earliest) if time < earliest => earliest,
            _ => time,
        };
        Some(match self.up_latest {
            Some(latest) if time > latest => latest,
            _ => time,
        })
    }

    /// Down-time for a day of the week
    pub fn down_time(&self, weekday: Weekday) -> Option<NaiveTime> {
        if is_weekend(weekday) {
            self.down_time_weekend
        } else {
            self.down_time_weekday
        }
    }

    pub fn is_brightness_mode(&self) -> bool {
        self.mode == AreaMode::Brightness
    }
}
