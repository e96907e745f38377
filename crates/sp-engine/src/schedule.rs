//! Timers with cancel handles
//!
//! Every timer runs as its own Tokio task and hands back a [`TimerHandle`];
//! cancelling or dropping the handle aborts the task, so a re-armed timer
//! can never fire on behalf of its predecessor.

use chrono::{NaiveDateTime, NaiveTime};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::trace;

use crate::clock::SharedClock;

/// Cancel handle of a scheduled callback
#[derive(Debug)]
pub struct TimerHandle {
    task: Option<JoinHandle<()>>,
}

impl TimerHandle {
    fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// Whether the timer may still fire
    pub fn is_pending(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the timer
    pub fn cancel(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Run `callback` once after `delay`
pub fn call_later<F>(delay: Duration, callback: F) -> TimerHandle
where
    F: FnOnce() + Send + 'static,
{
    TimerHandle::new(tokio::spawn(async move {
        time::sleep(delay).await;
        callback();
    }))
}

/// Run `callback` every `period`, first after one full period
pub fn every<F>(period: Duration, callback: F) -> TimerHandle
where
    F: Fn() + Send + 'static,
{
    TimerHandle::new(tokio::spawn(async move {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            callback();
        }
    }))
}

/// Run `callback` every day when the wall clock reaches `at`
pub fn daily_at<F>(clock: SharedClock, at: NaiveTime, callback: F) -> TimerHandle
where
    F: Fn() + Send + 'static,
{
    TimerHandle::new(tokio::spawn(async move {
        loop {
            let wait = until_next(clock.now(), at);
            trace!(wait_secs = wait.as_secs(), at = %at, "Waiting for daily time");
            time::sleep(wait).await;
            callback();
            // Step past the firing second so the next wait is a full day
            time::sleep(Duration::from_secs(1)).await;
        }
    }))
}

/// Time from `now` until the next occurrence of `at`, never zero
pub fn until_next(now: NaiveDateTime, at: NaiveTime) -> Duration {
    let mut next = now.date().and_time(at);
    if next <= now {
        next += chrono::Duration::days(1);
    }
    (next - now).to_std().unwrap_or(Duration::from_secs(1))
}

/// Status refresh period while a cooldown runs: `cooldown / 20`, within 1..=5 seconds
pub fn cooldown_tick_period(cooldown: Duration) -> Duration {
    let secs = (cooldown.as_secs() / 20).clamp(1, 5);
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 6, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn three_am() -> NaiveTime {
        NaiveTime::from_hms_opt(3, 0, 0).unwrap()
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_until_next() {
        assert_eq!(until_next(at(2, 59, 0), three_am()), Duration::from_secs(60));
        // Exactly at the time means tomorrow
        assert_eq!(
            until_next(at(3, 0, 0), three_am()),
            Duration::from_secs(24 * 3600)
        );
        assert_eq!(
            until_next(at(12, 0, 0), three_am()),
            Duration::from_secs(15 * 3600)
        );
    }

    #[test]
    fn test_cooldown_tick_period() {
        assert_eq!(cooldown_tick_period(Duration::from_secs(120)), Duration::from_secs(5));
        assert_eq!(cooldown_tick_period(Duration::from_secs(60)), Duration::from_secs(3));
        assert_eq!(cooldown_tick_period(Duration::from_secs(10)), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_later_and_cancel() {
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        let handle = call_later(Duration::from_secs(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        settle().await;
        assert!(handle.is_pending());

        time::advance(Duration::from_secs(9)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        let counter = fired.clone();
        let cancelled = call_later(Duration::from_secs(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        cancelled.cancel();
        time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let _handle = every(Duration::from_secs(60), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        for _ in 0..3 {
            time::advance(Duration::from_secs(60)).await;
            settle().await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_daily_at_fires_once_per_day() {
        let clock = MockClock::starting_at(at(2, 59, 0));
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let _handle = daily_at(Arc::new(clock), three_am(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        settle().await;

        time::advance(Duration::from_secs(59)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        time::advance(Duration::from_secs(3600)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
