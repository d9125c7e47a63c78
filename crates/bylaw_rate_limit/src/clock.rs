//! Time source used by the rate limiter.
//!
//! Quota windows are measured in local wall time because the daily quota
//! rolls over at local midnight. Sleeping goes through the same trait so a
//! simulated clock can advance time instead of blocking.

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, TimeDelta};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Source of "now" and of suspensions for the rate limiter.
#[async_trait]
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current local wall time.
    fn now(&self) -> NaiveDateTime;

    /// Suspend the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the system time zone and Tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Simulated clock for deterministic quota tests and dry runs.
///
/// `sleep` returns immediately after advancing the simulated time by the
/// requested duration, and every sleep is recorded.
///
/// ```
/// use bylaw_rate_limit::{Clock, ManualClock};
/// use chrono::NaiveDate;
/// use std::time::Duration;
///
/// let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
/// let clock = ManualClock::new(start);
/// clock.advance(Duration::from_secs(61));
/// assert_eq!((clock.now() - start).num_seconds(), 61);
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

#[derive(Debug)]
struct ManualState {
    now: NaiveDateTime,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                now: start,
                sleeps: Vec::new(),
            })),
        }
    }

    /// Move simulated time forward.
    pub fn advance(&self, duration: Duration) {
        let mut state = self.lock();
        state.now += to_delta(duration);
    }

    /// Jump to an absolute instant.
    pub fn set(&self, now: NaiveDateTime) {
        self.lock().now = now;
    }

    /// Every duration passed to [`Clock::sleep`], in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.lock().sleeps.clone()
    }

    /// Sum of all recorded sleeps.
    pub fn total_slept(&self) -> Duration {
        self.lock().sleeps.iter().sum()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        self.lock().now
    }

    async fn sleep(&self, duration: Duration) {
        {
            let mut state = self.lock();
            state.now += to_delta(duration);
            state.sleeps.push(duration);
        }
        tokio::task::yield_now().await;
    }
}

pub(crate) fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}
