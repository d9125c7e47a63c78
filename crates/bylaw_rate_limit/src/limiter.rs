//! Sliding-window rate limiter for RPM, TPM and RPD quotas.
//!
//! The limiter keeps three chronologically ordered windows:
//! - request instants from the last minute (RPM)
//! - `(instant, tokens)` pairs from the last minute (TPM)
//! - request instants from the current day (RPD)
//!
//! Windows are purged on every check. The daily window is a hybrid: entries
//! expire after 24 hours, and the whole window is also cleared as soon as the
//! local calendar date moves past the date the window started on. This
//! approximates a provider that resets daily usage at midnight.
//!
//! Callers follow a fixed protocol around each API call:
//! 1. [`RateLimiter::wait_if_needed`] before issuing the call
//! 2. [`RateLimiter::record_request`] once the call has succeeded
//!
//! All window state lives behind a single mutex, so one limiter can be shared
//! through an `Arc` by concurrent jobs. The lock is never held across a sleep.

use crate::{Clock, Tier};
use bylaw_error::{RateLimitError, RateLimitErrorKind};
use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Minimum wait whenever any quota is exhausted.
const BASE_WAIT: Duration = Duration::from_secs(5);
/// Added to every computed wait so the binding entry has surely expired.
const SAFETY_BUFFER: Duration = Duration::from_secs(1);
/// Longest single sleep before quotas are re-checked.
const MAX_WAIT: Duration = Duration::from_secs(60);

/// How a wait caused by the daily quota is slept.
///
/// The batch scripts this limiter replaces disagreed here. Two of them capped
/// every wait at 60 seconds, so an exhausted daily quota was waited out in
/// one-minute increments with a re-check after each. A later one slept until
/// midnight in a single call. `Chunked` keeps the capped behavior and is the
/// default; `UntilMidnight` opts into the single long sleep.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RpdWaitPolicy {
    /// Cap every wait at 60 seconds and re-check
    #[default]
    Chunked,
    /// Sleep until local midnight when the daily quota is exhausted
    UntilMidnight,
}

/// Usage of a single quota at the moment of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaStatus {
    /// Requests (or tokens) currently counted in the window
    pub current: u64,
    /// Configured ceiling, `None` when unenforced
    pub limit: Option<u64>,
    /// Whether the ceiling has been reached
    pub exceeded: bool,
}

impl QuotaStatus {
    fn new(current: u64, limit: Option<u64>) -> Self {
        Self {
            current,
            limit,
            exceeded: limit.is_some_and(|limit| current >= limit),
        }
    }
}

/// Snapshot of all three quotas produced by [`RateLimiter::check_limits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, derive_getters::Getters)]
pub struct LimitsInfo {
    /// Requests per minute
    rpm: QuotaStatus,
    /// Tokens per minute
    tpm: QuotaStatus,
    /// Requests per day
    rpd: QuotaStatus,
}

impl LimitsInfo {
    /// True when no quota has reached its ceiling.
    pub fn is_allowed(&self) -> bool {
        !(self.rpm.exceeded || self.tpm.exceeded || self.rpd.exceeded)
    }
}

#[derive(Debug)]
struct UsageWindows {
    requests_minute: VecDeque<NaiveDateTime>,
    requests_day: VecDeque<NaiveDateTime>,
    tokens_minute: VecDeque<(NaiveDateTime, u64)>,
    day_start: NaiveDateTime,
}

impl UsageWindows {
    fn new(now: NaiveDateTime) -> Self {
        Self {
            requests_minute: VecDeque::new(),
            requests_day: VecDeque::new(),
            tokens_minute: VecDeque::new(),
            day_start: now,
        }
    }

    /// Drop entries that have left their window.
    fn purge(&mut self, now: NaiveDateTime) {
        let minute_ago = now - TimeDelta::minutes(1);
        while self
            .requests_minute
            .front()
            .is_some_and(|&at| at < minute_ago)
        {
            self.requests_minute.pop_front();
        }
        while self
            .tokens_minute
            .front()
            .is_some_and(|&(at, _)| at < minute_ago)
        {
            self.tokens_minute.pop_front();
        }

        if now.date() > self.day_start.date() {
            debug!(
                cleared = self.requests_day.len(),
                "Calendar date advanced, resetting daily request window"
            );
            self.requests_day.clear();
            self.day_start = now;
        }

        let day_ago = now - TimeDelta::days(1);
        while self.requests_day.front().is_some_and(|&at| at < day_ago) {
            self.requests_day.pop_front();
        }
    }

    fn tokens_in_minute(&self) -> u64 {
        self.tokens_minute.iter().map(|&(_, tokens)| tokens).sum()
    }
}

/// Rate limiter that enforces RPM, TPM and RPD quotas over rolling windows.
///
/// # Example
///
/// ```rust,ignore
/// use bylaw_rate_limit::{RateLimiter, SystemClock, tiers::GeminiTier};
/// use std::sync::Arc;
///
/// let limiter = RateLimiter::new(&GeminiTier::Free, Arc::new(SystemClock))?;
///
/// limiter.wait_if_needed().await;
/// let tokens = client.count_tokens(&file).await?;
/// limiter.record_request(0);
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    rpm_limit: Option<u64>,
    tpm_limit: Option<u64>,
    rpd_limit: Option<u64>,
    rpd_wait: RpdWaitPolicy,
    clock: Arc<dyn Clock>,
    windows: Mutex<UsageWindows>,
}

impl RateLimiter {
    /// Create a rate limiter from a tier.
    ///
    /// Unset tier quotas are not enforced. A quota set to zero is rejected,
    /// since no call could ever be permitted.
    pub fn new(tier: &dyn Tier, clock: Arc<dyn Clock>) -> Result<Self, RateLimitError> {
        let rpm_limit = nonzero("RPM", tier.rpm().map(u64::from))?;
        let tpm_limit = nonzero("TPM", tier.tpm())?;
        let rpd_limit = nonzero("RPD", tier.rpd().map(u64::from))?;
        let now = clock.now();

        debug!(
            tier = tier.name(),
            ?rpm_limit,
            ?tpm_limit,
            ?rpd_limit,
            "Creating rate limiter"
        );

        Ok(Self {
            name: tier.name().to_string(),
            rpm_limit,
            tpm_limit,
            rpd_limit,
            rpd_wait: RpdWaitPolicy::default(),
            clock,
            windows: Mutex::new(UsageWindows::new(now)),
        })
    }

    /// Choose how waits on the daily quota are slept.
    pub fn with_rpd_wait(mut self, policy: RpdWaitPolicy) -> Self {
        self.rpd_wait = policy;
        self
    }

    /// Name of the tier the limiter was built from.
    pub fn tier_name(&self) -> &str {
        &self.name
    }

    /// Policy applied to daily-quota waits.
    pub fn rpd_wait(&self) -> RpdWaitPolicy {
        self.rpd_wait
    }

    /// Purge expired entries and report usage of all three quotas.
    ///
    /// Reaching a ceiling exactly already counts as exceeded: with an RPM
    /// limit of 15, the 15th recorded request blocks the next check.
    pub fn check_limits(&self) -> LimitsInfo {
        let now = self.clock.now();
        let mut windows = self.lock();
        windows.purge(now);
        self.snapshot(&windows)
    }

    /// Suspend until every quota has room for another call.
    ///
    /// Re-checks after each sleep; a single sleep is never assumed to be
    /// enough. Returns the total time spent waiting.
    #[instrument(skip(self), fields(tier = %self.name))]
    pub async fn wait_if_needed(&self) -> Duration {
        let mut waited = Duration::ZERO;
        while let Some(wait) = self.pending_wait() {
            info!("Rate limited. Waiting {:.1} seconds...", wait.as_secs_f64());
            self.clock.sleep(wait).await;
            waited += wait;
        }
        waited
    }

    /// Record a completed call and the generation tokens it consumed.
    ///
    /// Call exactly once per successful API call, right after it returns.
    pub fn record_request(&self, token_count: u64) {
        let now = self.clock.now();
        let mut windows = self.lock();
        windows.requests_minute.push_back(now);
        windows.requests_day.push_back(now);
        if token_count > 0 {
            windows.tokens_minute.push_back((now, token_count));
        }
    }

    /// Time to sleep before the next check, or `None` when a call is allowed.
    fn pending_wait(&self) -> Option<Duration> {
        let now = self.clock.now();
        let mut windows = self.lock();
        windows.purge(now);
        let info = self.snapshot(&windows);
        if info.is_allowed() {
            return None;
        }

        let mut wait = BASE_WAIT;

        if info.rpm.exceeded {
            if let Some(&oldest) = windows.requests_minute.front() {
                wait = wait.max(until(now, oldest + TimeDelta::minutes(1)));
            }
            warn!(
                quota = "RPM",
                current = info.rpm.current,
                limit = ?info.rpm.limit,
                "RPM limit reached ({}/{}). Waiting {:.1} seconds.",
                info.rpm.current,
                display_limit(info.rpm.limit),
                wait.as_secs_f64()
            );
        }

        if info.tpm.exceeded {
            if let Some(&(oldest, _)) = windows.tokens_minute.front() {
                wait = wait.max(until(now, oldest + TimeDelta::minutes(1)));
            }
            warn!(
                quota = "TPM",
                current = info.tpm.current,
                limit = ?info.tpm.limit,
                "TPM limit reached ({}/{}). Waiting {:.1} seconds.",
                info.tpm.current,
                display_limit(info.tpm.limit),
                wait.as_secs_f64()
            );
        }

        if info.rpd.exceeded {
            if let Some(midnight) = now.date().succ_opt().map(|d| d.and_time(NaiveTime::MIN)) {
                wait = wait.max(until(now, midnight));
            }
            warn!(
                quota = "RPD",
                current = info.rpd.current,
                limit = ?info.rpd.limit,
                "RPD limit reached ({}/{}). Daily limit reached, waiting until midnight.",
                info.rpd.current,
                display_limit(info.rpd.limit)
            );
        }

        let wait = wait + SAFETY_BUFFER;
        let uncapped = info.rpd.exceeded && self.rpd_wait == RpdWaitPolicy::UntilMidnight;
        Some(if uncapped { wait } else { wait.min(MAX_WAIT) })
    }

    fn snapshot(&self, windows: &UsageWindows) -> LimitsInfo {
        LimitsInfo {
            rpm: QuotaStatus::new(windows.requests_minute.len() as u64, self.rpm_limit),
            tpm: QuotaStatus::new(windows.tokens_in_minute(), self.tpm_limit),
            rpd: QuotaStatus::new(windows.requests_day.len() as u64, self.rpd_limit),
        }
    }

    fn lock(&self) -> MutexGuard<'_, UsageWindows> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn nonzero(quota: &'static str, limit: Option<u64>) -> Result<Option<u64>, RateLimitError> {
    match limit {
        Some(0) => Err(RateLimitError::new(RateLimitErrorKind::ZeroLimit(quota))),
        other => Ok(other),
    }
}

/// Non-negative time from `now` until `target`.
fn until(now: NaiveDateTime, target: NaiveDateTime) -> Duration {
    (target - now).to_std().unwrap_or(Duration::ZERO)
}

fn display_limit(limit: Option<u64>) -> String {
    limit.map_or_else(|| "unlimited".to_string(), |limit| limit.to_string())
}
