//! Latched brightness trigger
//!
//! Once the brightness rule has moved a cover down it may not move it down
//! again until it has gone up (or the daily reset ran), and vice versa. While
//! latched down the cover counts as lowered, which arms the window and door
//! ventilation overrides.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Latch {
    /// Neither direction has fired since the last reset
    #[default]
    Idle,
    /// The down trigger fired; ventilation overrides are armed
    LatchedDown,
    /// The up trigger fired
    LatchedUp,
}

impl Latch {
    /// State after the down trigger fires
    pub fn latch_down(self) -> Self {
        Latch::LatchedDown
    }

    /// State after the up trigger fires
    pub fn latch_up(self) -> Self {
        Latch::LatchedUp
    }

    /// State after the daily reset
    pub fn reset(self) -> Self {
        Latch::Idle
    }

    pub fn triggered_down(self) -> bool {
        self == Latch::LatchedDown
    }

    pub fn triggered_up(self) -> bool {
        self == Latch::LatchedUp
    }

    /// Whether window and door-tilt ventilation may move the cover
    pub fn ventilation_armed(self) -> bool {
        self == Latch::LatchedDown
    }
}

impl fmt::Display for Latch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Latch::Idle => "idle",
            Latch::LatchedDown => "latched_down",
            Latch::LatchedUp => "latched_up",
        })
    }
}
