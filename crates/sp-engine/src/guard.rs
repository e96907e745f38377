//! Time-bounded guards used by the profile controller

use std::time::Duration;
use tokio::time::Instant;

/// How long a self-issued command masks cover movement
pub const SELF_MOVE_WINDOW: Duration = Duration::from_secs(2);

/// Marks cover movement as self-inflicted for a short while after each command
///
/// Each command extends a single deadline, so an earlier command expiring
/// can never clear the guard of a later one.
#[derive(Debug, Clone, Default)]
pub struct SelfMoveGuard {
    until: Option<Instant>,
}

impl SelfMoveGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called right before a command is sent
    pub fn arm(&mut self, now: Instant) {
        let deadline = now + SELF_MOVE_WINDOW;
        self.until = Some(self.until.map_or(deadline, |until| until.max(deadline)));
    }

    /// Whether cover movement at `now` should be attributed to us
    pub fn is_active(&self, now: Instant) -> bool {
        self.until.is_some_and(|until| now < until)
    }
}

/// Lets a repeated warning through at most once per period
#[derive(Debug, Clone)]
pub struct WarnThrottle {
    period: Duration,
    last: Option<Instant>,
}

impl WarnThrottle {
    pub fn new(period: Duration) -> Self {
        Self { period, last: None }
    }

    /// Returns true when the warning should be logged now
    pub fn allow(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) < self.period => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// Forget the last warning so the next one is logged immediately
    pub fn reset(&mut self) {
        self.last = None;
    }
}
