//! Typed status updates and the bus that carries them
//!
//! Every controller publishes a [`ProfileSnapshot`] whenever its status or
//! reason changes (and periodically while a cooldown counts down). The bus
//! also remembers the latest snapshot per profile so presentation layers
//! can read it on demand without subscribing.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{trace, warn};

use crate::latch::Latch;

/// Default capacity of the status channel
const STATUS_CHANNEL_CAPACITY: usize = 256;

/// Coarse controller status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Inactive,
    Cooldown,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Active => "active",
            Status::Inactive => "inactive",
            Status::Cooldown => "cooldown",
        })
    }
}

/// Why the controller is in its current status
///
/// Rendered as a stable hyphenated tag (`door-open`, `brightness-low-4000`)
/// for diagnostics and translation.
#[derive(Debug, Clone, PartialEq)]
pub enum Reason {
    Initialization,
    AutoDisabled,
    ActuatorNotFound,
    DoorOpen,
    DoorTilted,
    WindowOpen,
    WindowClosedCooldown,
    CooldownActive,
    CooldownExpired,
    TimeScheduleDown,
    TimeScheduleUp,
    BrightnessLowWithOpening,
    /// Illuminance reading, truncated to whole lux
    BrightnessLow(i64),
    BrightnessHigh(i64),
    BrightnessHold(i64),
    NightMode,
    SunShadeLux(i64),
    /// Temperature reading in degrees
    SunShadeTemp(f64),
    DefaultOpen,
    ManualControlActive,
    DailyReset,
    ManualOpen,
    ManualStop,
    ManualClose,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Initialization => f.write_str("initialization"),
            Reason::AutoDisabled => f.write_str("auto-disabled"),
            Reason::ActuatorNotFound => f.write_str("actuator-not-found"),
            Reason::DoorOpen => f.write_str("door-open"),
            Reason::DoorTilted => f.write_str("door-tilted"),
            Reason::WindowOpen => f.write_str("window-open"),
            Reason::WindowClosedCooldown => f.write_str("window-closed-cooldown"),
            Reason::CooldownActive => f.write_str("cooldown-active"),
            Reason::CooldownExpired => f.write_str("cooldown-expired"),
            Reason::TimeScheduleDown => f.write_str("time-schedule-down"),
            Reason::TimeScheduleUp => f.write_str("time-schedule-up"),
            Reason::BrightnessLowWithOpening => f.write_str("brightness-low-with-opening"),
            Reason::BrightnessLow(lux) => write!(f, "brightness-low-{}", lux),
            Reason::BrightnessHigh(lux) => write!(f, "brightness-high-{}", lux),
            Reason::BrightnessHold(lux) => write!(f, "brightness-hold-{}", lux),
            Reason::NightMode => f.write_str("night-mode"),
            Reason::SunShadeLux(lux) => write!(f, "sun-shade-lux-{}", lux),
            Reason::SunShadeTemp(temp) => write!(f, "sun-shade-temp-{:.1}", temp),
            Reason::DefaultOpen => f.write_str("default-open"),
            Reason::ManualControlActive => f.write_str("manual-control-active"),
            Reason::DailyReset => f.write_str("daily-reset"),
            Reason::ManualOpen => f.write_str("manual-open"),
            Reason::ManualStop => f.write_str("manual-stop"),
            Reason::ManualClose => f.write_str("manual-close"),
        }
    }
}

impl Serialize for Reason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Point-in-time view of one profile controller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileSnapshot {
    pub profile: String,
    pub status: Status,
    pub reason: Reason,
    /// Whole seconds left in the cooldown, rounded up
    pub cooldown_remaining: u64,
    pub latch: Latch,
    /// Last position reported by the cover
    pub last_position: Option<i64>,
    pub updated: DateTime<Utc>,
}

/// Broadcast bus for profile snapshots
#[derive(Clone)]
pub struct StatusBus {
    sender: broadcast::Sender<ProfileSnapshot>,
    latest: Arc<DashMap<String, ProfileSnapshot>>,
}

impl StatusBus {
    pub fn new() -> Self {
        Self::with_capacity(STATUS_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            latest: Arc::new(DashMap::new()),
        }
    }

    /// Record and broadcast a snapshot
    pub fn emit(&self, snapshot: ProfileSnapshot) {
        trace!(
            profile = %snapshot.profile,
            status = %snapshot.status,
            reason = %snapshot.reason,
            "Status update"
        );
        self.latest.insert(snapshot.profile.clone(), snapshot.clone());
        // No subscribers is fine
        let _ = self.sender.send(snapshot);
    }

    /// Receive every snapshot from now on
    pub fn subscribe(&self) -> StatusSubscription {
        StatusSubscription {
            rx: self.sender.subscribe(),
            profile: None,
        }
    }

    /// Receive snapshots of one profile only
    pub fn subscribe_profile(&self, profile: impl Into<String>) -> StatusSubscription {
        StatusSubscription {
            rx: self.sender.subscribe(),
            profile: Some(profile.into()),
        }
    }

    /// Most recent snapshot of a profile
    pub fn latest(&self, profile: &str) -> Option<ProfileSnapshot> {
        self.latest.get(profile).map(|s| s.clone())
    }

    /// Most recent snapshot of every profile, sorted by name
    pub fn all_latest(&self) -> Vec<ProfileSnapshot> {
        let mut all: Vec<ProfileSnapshot> = self.latest.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.profile.cmp(&b.profile));
        all
    }

    /// Forget a profile, e.g. after it was removed by a reload
    pub fn forget(&self, profile: &str) {
        self.latest.remove(profile);
    }
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscription handle; dropping it unsubscribes
pub struct StatusSubscription {
    rx: broadcast::Receiver<ProfileSnapshot>,
    profile: Option<String>,
}

impl StatusSubscription {
    /// Next matching snapshot, or None once the bus is gone
    pub async fn recv(&mut self) -> Option<ProfileSnapshot> {
        loop {
            match self.rx.recv().await {
                Ok(snapshot) if self.matches(&snapshot) => return Some(snapshot),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Status subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching snapshot if one is already queued
    pub fn try_recv(&mut self) -> Option<ProfileSnapshot> {
        loop {
            match self.rx.try_recv() {
                Ok(snapshot) if self.matches(&snapshot) => return Some(snapshot),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(skipped = n, "Status subscriber lagged");
                }
                Err(_) => return None,
            }
        }
    }

    /// Everything queued right now
    pub fn drain(&mut self) -> Vec<ProfileSnapshot> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    fn matches(&self, snapshot: &ProfileSnapshot) -> bool {
        self.profile
            .as_deref()
            .map_or(true, |p| p == snapshot.profile)
    }
}
