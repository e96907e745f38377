//! Wall-clock time source
//!
//! Schedules compare against local wall-clock time (`HH:MM` up/down times,
//! the daily reset), while timers run on Tokio's monotonic clock. Both are
//! injected so that tests can drive them deterministically.

use chrono::{Local, NaiveDateTime};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// Source of the current local date and time
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The system's local time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A wall clock that moves with Tokio time
///
/// It starts at a chosen date and time and then advances by however much
/// Tokio's clock advances, so with a paused runtime `tokio::time::advance`
/// moves schedules and timers together.
#[derive(Debug, Clone)]
pub struct MockClock {
    anchor: Arc<Mutex<(NaiveDateTime, Instant)>>,
}

impl MockClock {
    pub fn starting_at(wall: NaiveDateTime) -> Self {
        Self {
            anchor: Arc::new(Mutex::new((wall, Instant::now()))),
        }
    }

    /// Jump to a new wall-clock time; Tokio time is not affected
    pub fn set(&self, wall: NaiveDateTime) {
        if let Ok(mut anchor) = self.anchor.lock() {
            *anchor = (wall, Instant::now());
        }
    }
}

impl Clock for MockClock {
    fn now(&self) -> NaiveDateTime {
        match self.anchor.lock() {
            Ok(anchor) => {
                let (wall, started) = *anchor;
                let elapsed = chrono::Duration::from_std(started.elapsed())
                    .unwrap_or_else(|_| chrono::Duration::zero());
                wall + elapsed
            }
            Err(_) => Local::now().naive_local(),
        }
    }
}

/// Shared clock handle
pub type SharedClock = Arc<dyn Clock>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::time::Duration;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 6, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_clock_follows_tokio_time() {
        let clock = MockClock::starting_at(at(2, 59, 0));
        assert_eq!(clock.now(), at(2, 59, 0));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(clock.now(), at(3, 0, 1));

        clock.set(at(21, 0, 0));
        assert_eq!(clock.now(), at(21, 0, 0));
    }
}
