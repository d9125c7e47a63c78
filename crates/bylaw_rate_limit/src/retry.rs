//! Backoff schedule and attempt classification.

use bylaw_error::RetryableError;
use std::time::Duration;

/// Exponential backoff without jitter.
///
/// `max_retries` counts every attempt including the first, so a policy of
/// 3 attempts with a 2 second base sleeps 2s and then 4s between attempts.
///
/// ```
/// use bylaw_rate_limit::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(3, Duration::from_secs(2));
/// let delays: Vec<_> = policy.delays().collect();
/// assert_eq!(delays, vec![Duration::from_secs(2), Duration::from_secs(4)]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    retry_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy. A `max_retries` of zero is treated as one attempt.
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            retry_delay,
        }
    }

    /// Total attempts per call step.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before the second attempt.
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Delay after the given failed attempt (0-based): `retry_delay * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.retry_delay.saturating_mul(factor)
    }

    /// Sleeps between consecutive attempts, `max_retries - 1` in total.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let policy = *self;
        (0..self.max_retries - 1).map(move |attempt| policy.delay_for(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

/// Classified result of a single call attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome<T, E> {
    /// The call succeeded
    Success(T),
    /// The call failed but may succeed if repeated
    Transient(E),
    /// The call failed and repeating it cannot help
    Permanent(E),
}

impl<T, E: RetryableError> From<Result<T, E>> for CallOutcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => CallOutcome::Success(value),
            Err(err) if err.is_retryable() => CallOutcome::Transient(err),
            Err(err) => CallOutcome::Permanent(err),
        }
    }
}
