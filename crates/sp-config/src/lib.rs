//! Configuration loading for ShutterPilot
//!
//! A single YAML document (optionally split with `!include`) describes the
//! global settings, the area templates and one profile per actuator:
//!
//! ```yaml
//! global_auto: true
//! default_ventilation_position: 30
//! areas:
//!   living:
//!     area_mode: brightness
//!     brightness_sensor: sensor.outdoor_lux
//! profiles: !include profiles.yaml
//! ```
//!
//! [`ShutterPilotConfig`] validates everything once at load time; the
//! engine only ever sees the resolved, typed values.
//!
//! # Example
//!
//! ```ignore
//! use sp_config::ShutterPilotConfig;
//!
//! let config = ShutterPilotConfig::load("/config/shutterpilot.yaml")?;
//! for profile in &config.profiles {
//!     println!("{} -> {}", profile.name, profile.cover);
//! }
//! ```

mod area;
mod config;
mod error;
mod global;
mod loader;
mod parse;
mod profile;

pub use area::{AreaMode, AreaTemplate, RawArea};
pub use config::{RawConfig, ShutterPilotConfig};
pub use error::{ConfigError, ConfigResult};
pub use global::{AstroSettings, GlobalSettings, MonthDay, SummerPeriod};
pub use loader::{load_yaml, load_yaml_string, YamlLoader};
pub use profile::{
    ExtendedOptions, LightConfig, ProfileConfig, RawProfile, MAX_PROFILE_COOLDOWN,
    MAX_VENTILATION_POSITION,
};

// Re-export serde_yaml::Value for convenience
pub use serde_yaml::Value;
