//! Field-level parsing shared by the typed configuration sections

use chrono::{NaiveDate, NaiveTime};
use sp_core::EntityId;

use crate::error::{ConfigError, ConfigResult};

/// Treat a missing or blank string as absent
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse `HH:MM` or `HH:MM:SS`
pub(crate) fn time(key: &str, value: &str) -> ConfigResult<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| ConfigError::invalid(key, format!("'{}' is not a HH:MM time", value)))
}

pub(crate) fn optional_time(key: &str, value: Option<String>) -> ConfigResult<Option<NaiveTime>> {
    non_blank(value).map(|v| time(key, &v)).transpose()
}

/// A percentage position bounded to `0..=max`
pub(crate) fn position(key: &str, value: i64, max: u8) -> ConfigResult<u8> {
    if (0..=i64::from(max)).contains(&value) {
        Ok(value as u8)
    } else {
        Err(ConfigError::invalid(
            key,
            format!("{} is outside 0..={}", value, max),
        ))
    }
}

/// A whole number of seconds bounded to `0..=max`
pub(crate) fn seconds(key: &str, value: i64, max: i64) -> ConfigResult<u64> {
    if (0..=max).contains(&value) {
        Ok(value as u64)
    } else {
        Err(ConfigError::invalid(
            key,
            format!("{} is outside 0..={}", value, max),
        ))
    }
}

pub(crate) fn finite(key: &str, value: f64) -> ConfigResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::invalid(key, "must be a finite number"))
    }
}

pub(crate) fn entity(key: &str, value: &str) -> ConfigResult<EntityId> {
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::invalid(key, format!("'{}': {}", value, e)))
}

pub(crate) fn entity_in_domain(key: &str, value: &str, domain: &str) -> ConfigResult<EntityId> {
    let id = entity(key, value)?;
    if id.is_domain(domain) {
        Ok(id)
    } else {
        Err(ConfigError::invalid(
            key,
            format!("'{}' is not a {} entity", id, domain),
        ))
    }
}

pub(crate) fn optional_entity(key: &str, value: Option<String>) -> ConfigResult<Option<EntityId>> {
    non_blank(value).map(|v| entity(key, &v)).transpose()
}

/// Parse a `MM-DD` day of the year; February 29th is accepted
pub(crate) fn month_day(key: &str, value: &str) -> ConfigResult<(u32, u32)> {
    let invalid = || ConfigError::invalid(key, format!("'{}' is not a MM-DD date", value));

    let (month, day) = value.trim().split_once('-').ok_or_else(invalid)?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    let day: u32 = day.parse().map_err(|_| invalid())?;

    // Leap year so that 02-29 validates
    NaiveDate::from_ymd_opt(2000, month, day).ok_or_else(invalid)?;
    Ok((month, day))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_formats() {
        assert_eq!(
            time("t", "06:30").unwrap(),
            NaiveTime::from_hms_opt(6, 30, 0).unwrap()
        );
        assert_eq!(
            time("t", "03:00:15").unwrap(),
            NaiveTime::from_hms_opt(3, 0, 15).unwrap()
        );
        assert!(time("t", "25:00").is_err());
        assert!(time("t", "sunrise").is_err());
    }

    #[test]
    fn test_blank_optional_values() {
        assert_eq!(optional_time("t", Some("  ".into())).unwrap(), None);
        assert_eq!(optional_time("t", None).unwrap(), None);
        assert_eq!(optional_entity("e", Some(String::new())).unwrap(), None);
    }

    #[test]
    fn test_position_bounds() {
        assert_eq!(position("p", 80, 80).unwrap(), 80);
        assert!(position("p", 81, 80).is_err());
        assert!(position("p", -1, 100).is_err());
    }

    #[test]
    fn test_entity_domain_check() {
        assert!(entity_in_domain("c", "cover.office", "cover").is_ok());
        assert!(entity_in_domain("c", "light.office", "cover").is_err());
        assert!(entity("c", "not an entity").is_err());
    }

    #[test]
    fn test_month_day() {
        assert_eq!(month_day("d", "05-01").unwrap(), (5, 1));
        assert_eq!(month_day("d", "02-29").unwrap(), (2, 29));
        assert!(month_day("d", "13-01").is_err());
        assert!(month_day("d", "0501").is_err());
    }
}
