//! Integration-wide settings

use chrono::{Datelike, NaiveDate, NaiveTime};
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::parse;
use crate::RawConfig;

/// Upper bound for `default_cooldown`, in seconds
pub const MAX_DEFAULT_COOLDOWN: i64 = 900;

/// A day of the year without a year, `MM-DD`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

impl MonthDay {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            day: date.day(),
        }
    }
}

/// The configured summer season; may wrap around the new year
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummerPeriod {
    pub start: MonthDay,
    pub end: MonthDay,
}

impl SummerPeriod {
    /// Whether `date` falls inside the season, both ends inclusive
    pub fn contains(&self, date: NaiveDate) -> bool {
        let day = MonthDay::of(date);
        if self.start <= self.end {
            self.start <= day && day <= self.end
        } else {
            day >= self.start || day <= self.end
        }
    }
}

/// Sun-related global options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AstroSettings {
    /// Elevation in degrees at which sun protection ends
    pub sun_elevation_end: f64,
    /// Offset applied to sun-driven up movements, in minutes
    pub sun_offset_up: i64,
    /// Offset applied to sun-driven down movements, in minutes
    pub sun_offset_down: i64,
}

/// Settings shared by every profile
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalSettings {
    /// Master switch; `false` turns every profile inactive
    pub global_auto: bool,
    /// Ventilation position for profiles that do not set their own
    pub default_ventilation_position: u8,
    /// Cooldown for profiles that do not set their own
    pub default_cooldown: Duration,
    /// Wall-clock time at which latched triggers are cleared
    pub daily_reset: NaiveTime,
    /// Period of the safety re-evaluation tick
    pub tick_interval: Duration,
    pub summer: SummerPeriod,
    pub astro: AstroSettings,
}

impl GlobalSettings {
    pub(crate) fn resolve(raw: &RawConfig) -> ConfigResult<Self> {
        let (start_month, start_day) = parse::month_day("summer_start", &raw.summer_start)?;
        let (end_month, end_day) = parse::month_day("summer_end", &raw.summer_end)?;

        if raw.tick_interval == 0 {
            return Err(ConfigError::invalid("tick_interval", "must be at least 1 second"));
        }

        Ok(Self {
            global_auto: raw.global_auto,
            default_ventilation_position: parse::position(
                "default_ventilation_position",
                raw.default_ventilation_position,
                80,
            )?,
            default_cooldown: Duration::from_secs(parse::seconds(
                "default_cooldown",
                raw.default_cooldown,
                MAX_DEFAULT_COOLDOWN,
            )?),
            daily_reset: parse::time("daily_reset", &raw.daily_reset)?,
            tick_interval: Duration::from_secs(raw.tick_interval),
            summer: SummerPeriod {
                start: MonthDay {
                    month: start_month,
                    day: start_day,
                },
                end: MonthDay {
                    month: end_month,
                    day: end_day,
                },
            },
            astro: AstroSettings {
                sun_elevation_end: parse::finite("sun_elevation_end", raw.sun_elevation_end)?,
                sun_offset_up: raw.sun_offset_up,
                sun_offset_down: raw.sun_offset_down,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> GlobalSettings {
        GlobalSettings::resolve(&RawConfig::default()).unwrap()
    }

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = defaults();
        assert!(settings.global_auto);
        assert_eq!(settings.default_ventilation_position, 30);
        assert_eq!(settings.default_cooldown, Duration::from_secs(120));
        assert_eq!(settings.daily_reset, NaiveTime::from_hms_opt(3, 0, 0).unwrap());
        assert_eq!(settings.tick_interval, Duration::from_secs(60));
        assert_eq!(settings.astro.sun_elevation_end, 3.0);
    }

    #[test]
    fn test_summer_period() {
        let summer = defaults().summer;
        assert!(summer.contains(date(5, 1)));
        assert!(summer.contains(date(9, 30)));
        assert!(!summer.contains(date(10, 1)));

        let wrapping = SummerPeriod {
            start: MonthDay { month: 11, day: 1 },
            end: MonthDay { month: 2, day: 28 },
        };
        assert!(wrapping.contains(date(1, 15)));
        assert!(!wrapping.contains(date(6, 1)));
    }

    #[test]
    fn test_ventilation_default_bounded() {
        let raw = RawConfig {
            default_ventilation_position: 90,
            ..Default::default()
        };
        assert!(matches!(
            GlobalSettings::resolve(&raw),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_zero_tick_rejected() {
        let raw = RawConfig {
            tick_interval: 0,
            ..Default::default()
        };
        assert!(GlobalSettings::resolve(&raw).is_err());
    }
}
