//! Well-known domains, services, states and attributes
//!
//! Only the slice of the entity model a shading profile touches: covers,
//! lights, contact sensors and the sun entity.

/// Generic binary "on" state (contact open, light on)
pub const STATE_ON: &str = "on";
/// Generic binary "off" state
pub const STATE_OFF: &str = "off";
/// Contact or door fully open
pub const STATE_OPEN: &str = "open";
/// Contact or door closed
pub const STATE_CLOSED: &str = "closed";
/// Door or window in tilt position
pub const STATE_TILTED: &str = "tilted";
/// Entity exists but its device is unreachable
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// Cover (roller shutter, blind, awning) services and attributes
pub mod cover {
    pub const DOMAIN: &str = "cover";

    pub const OPEN_COVER: &str = "open_cover";
    pub const CLOSE_COVER: &str = "close_cover";
    pub const STOP_COVER: &str = "stop_cover";
    pub const SET_COVER_POSITION: &str = "set_cover_position";

    /// Reported position, 0 = closed, 100 = fully open
    pub const ATTR_CURRENT_POSITION: &str = "current_position";
    /// Service data key for the target position
    pub const ATTR_POSITION: &str = "position";
}

/// Light services and attributes
pub mod light {
    pub const DOMAIN: &str = "light";

    pub const TURN_ON: &str = "turn_on";
    pub const TURN_OFF: &str = "turn_off";

    /// Brightness on the 0..=255 scale
    pub const ATTR_BRIGHTNESS: &str = "brightness";
}

/// The sun entity and its attributes
pub mod sun {
    pub const DOMAIN: &str = "sun";
    pub const ENTITY_ID: &str = "sun.sun";

    pub const STATE_ABOVE_HORIZON: &str = "above_horizon";
    pub const STATE_BELOW_HORIZON: &str = "below_horizon";

    pub const ATTR_ELEVATION: &str = "elevation";
    pub const ATTR_AZIMUTH: &str = "azimuth";
}

/// Service data key naming the targeted entity
pub const ATTR_ENTITY_ID: &str = "entity_id";
