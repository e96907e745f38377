//! Cooldown after a ventilation window closes
//!
//! Closing a window starts a quiet period during which the policy reports
//! `cooldown` instead of moving the cover. At most one cooldown is pending
//! per profile; arming a new one cancels the previous timer first. Each arm
//! gets a generation number so a stale expiry that was already queued is
//! recognised and ignored.

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::schedule::{self, TimerHandle};

/// Cooldowns of this length or shorter are skipped
pub const MIN_COOLDOWN: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
pub struct Cooldown {
    until: Option<Instant>,
    generation: u64,
    timer: Option<TimerHandle>,
    ticker: Option<TimerHandle>,
}

impl Cooldown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a cooldown of `duration` from `now`
    ///
    /// `on_expire` receives the generation to hand back to [`Cooldown::expire`];
    /// `on_tick` runs periodically while the cooldown is pending. Returns
    /// false, leaving no cooldown behind, when `duration` is too short to
    /// bother.
    pub fn arm<E, T>(&mut self, now: Instant, duration: Duration, on_expire: E, on_tick: T) -> bool
    where
        E: FnOnce(u64) + Send + 'static,
        T: Fn() + Send + 'static,
    {
        self.cancel();

        if duration <= MIN_COOLDOWN {
            debug!(secs = duration.as_secs(), "Cooldown too short, skipping");
            return false;
        }

        self.generation += 1;
        let generation = self.generation;
        self.until = Some(now + duration);
        self.timer = Some(schedule::call_later(duration, move || on_expire(generation)));
        self.ticker = Some(schedule::every(
            schedule::cooldown_tick_period(duration),
            on_tick,
        ));
        true
    }

    /// Drop any pending cooldown and its timers
    pub fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
        self.until = None;
    }

    /// Handle an expiry; false if it belongs to a cancelled or replaced cooldown
    pub fn expire(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.until.is_none() {
            return false;
        }
        self.timer = None;
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
        self.until = None;
        true
    }

    pub fn is_active(&self, now: Instant) -> bool {
        self.until.is_some_and(|until| now < until)
    }

    /// Time left, zero when no cooldown is pending
    pub fn remaining(&self, now: Instant) -> Duration {
        self.until
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Whether a cooldown deadline is recorded, elapsed or not
    pub fn is_set(&self) -> bool {
        self.until.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_and_expire() {
        let expired = Arc::new(Mutex::new(Vec::new()));
        let sink = expired.clone();
        let mut cooldown = Cooldown::new();

        let start = Instant::now();
        assert!(cooldown.arm(
            start,
            Duration::from_secs(120),
            move |generation| sink.lock().unwrap().push(generation),
            || {},
        ));
        assert!(cooldown.is_active(start));
        assert_eq!(cooldown.remaining(start), Duration::from_secs(120));
        settle().await;

        tokio::time::advance(Duration::from_secs(119)).await;
        settle().await;
        assert!(expired.lock().unwrap().is_empty());
        assert!(cooldown.is_active(Instant::now()));

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        let generation = expired.lock().unwrap()[0];
        assert!(cooldown.expire(generation));
        assert!(!cooldown.is_set());
        assert_eq!(cooldown.remaining(Instant::now()), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_invalidates_previous_expiry() {
        let mut cooldown = Cooldown::new();
        let now = Instant::now();

        cooldown.arm(now, Duration::from_secs(60), |_| {}, || {});
        cooldown.arm(now, Duration::from_secs(60), |_| {}, || {});

        // Generation 1 was replaced by generation 2
        assert!(!cooldown.expire(1));
        assert!(cooldown.is_set());
        assert!(cooldown.expire(2));
        assert!(!cooldown.expire(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_cooldown_is_skipped() {
        let mut cooldown = Cooldown::new();
        assert!(!cooldown.arm(Instant::now(), Duration::from_secs(1), |_| {}, || {}));
        assert!(!cooldown.is_set());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticks() {
        let ticks = Arc::new(Mutex::new(0));
        let counter = ticks.clone();
        let mut cooldown = Cooldown::new();

        cooldown.arm(
            Instant::now(),
            Duration::from_secs(120),
            |_| {},
            move || *counter.lock().unwrap() += 1,
        );
        settle().await;

        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(*ticks.lock().unwrap(), 1);

        cooldown.cancel();
        assert!(!cooldown.is_active(Instant::now()));
        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(*ticks.lock().unwrap(), 1);
    }
}
