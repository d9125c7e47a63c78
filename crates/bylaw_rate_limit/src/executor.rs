//! Rate-limited, retrying execution of a single API call step.

use crate::{CallOutcome, RateLimiter, RetryPolicy};
use bylaw_error::RetryableError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, error, instrument, warn};

/// Terminal failure of a call step.
#[derive(Debug)]
pub enum ExecuteError<E> {
    /// Every attempt failed transiently
    Exhausted {
        /// Attempts made
        attempts: u32,
        /// Error from the last attempt
        source: E,
    },
    /// An attempt failed with a non-retryable error
    Permanent {
        /// Attempts made, including the failing one
        attempts: u32,
        /// The non-retryable error
        source: E,
    },
}

impl<E> ExecuteError<E> {
    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            ExecuteError::Exhausted { attempts, .. } | ExecuteError::Permanent { attempts, .. } => {
                *attempts
            }
        }
    }

    /// Whether the step stopped on a non-retryable error.
    pub fn is_permanent(&self) -> bool {
        matches!(self, ExecuteError::Permanent { .. })
    }

    /// The underlying client error.
    pub fn inner(&self) -> &E {
        match self {
            ExecuteError::Exhausted { source, .. } | ExecuteError::Permanent { source, .. } => {
                source
            }
        }
    }

    /// Consume the wrapper and return the client error.
    pub fn into_inner(self) -> E {
        match self {
            ExecuteError::Exhausted { source, .. } | ExecuteError::Permanent { source, .. } => {
                source
            }
        }
    }
}

impl<E: fmt::Display> fmt::Display for ExecuteError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecuteError::Exhausted { attempts, source } => {
                write!(f, "Failed after {} attempts: {}", attempts, source)
            }
            ExecuteError::Permanent { attempts, source } => {
                write!(f, "Permanent failure on attempt {}: {}", attempts, source)
            }
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for ExecuteError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.inner())
    }
}

/// Runs API call steps under a shared [`RateLimiter`] with retry.
///
/// For every attempt, including retries, the executor:
/// 1. waits until the limiter permits a call
/// 2. issues the call
/// 3. records the call with the limiter if it succeeded
///
/// Transient failures are retried after `retry_delay * 2^attempt`. Permanent
/// failures end the step at once. Failed attempts are never recorded.
#[derive(Debug, Clone)]
pub struct RateLimitedExecutor {
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl RateLimitedExecutor {
    /// Create an executor sharing `limiter`.
    pub fn new(limiter: Arc<RateLimiter>, policy: RetryPolicy) -> Self {
        Self { limiter, policy }
    }

    /// The shared limiter.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// The backoff policy.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Execute `operation` with rate limiting and retry.
    ///
    /// `tokens` is what a successful call is recorded as consuming against
    /// the TPM quota; pass 0 for calls that generate nothing.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let tokens = executor
    ///     .execute("count_tokens", 0, || client.count_tokens(&handle))
    ///     .await?;
    /// ```
    pub async fn execute<F, Fut, T, E>(
        &self,
        step: &str,
        tokens: u64,
        operation: F,
    ) -> Result<T, ExecuteError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + fmt::Display,
    {
        self.execute_counted(step, tokens, operation)
            .await
            .map(|(value, _)| value)
    }

    /// Like [`execute`](Self::execute), also returning the attempts used.
    #[instrument(skip(self, operation), fields(max_attempts = self.policy.max_retries()))]
    pub async fn execute_counted<F, Fut, T, E>(
        &self,
        step: &str,
        tokens: u64,
        operation: F,
    ) -> Result<(T, u32), ExecuteError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + fmt::Display,
    {
        let attempts = AtomicU32::new(0);
        let permanent = AtomicBool::new(false);

        let attempts_made = &attempts;
        let stopped = &permanent;
        let limiter = &self.limiter;
        let operation = &operation;
        let policy = self.policy;

        let result = Retry::spawn(self.policy.delays(), move || async move {
            let attempt = attempts_made.fetch_add(1, Ordering::SeqCst) + 1;
            limiter.wait_if_needed().await;
            debug!(step, attempt, "Issuing call");

            match CallOutcome::from(operation().await) {
                CallOutcome::Success(value) => {
                    limiter.record_request(tokens);
                    Ok(value)
                }
                CallOutcome::Transient(err) => {
                    if attempt < policy.max_retries() {
                        let delay = policy.delay_for(attempt - 1);
                        warn!(
                            step,
                            attempt,
                            "Error on attempt {}/{}: {}. Retrying in {} seconds...",
                            attempt,
                            policy.max_retries(),
                            err,
                            delay.as_secs_f64()
                        );
                    }
                    Err(RetryError::Transient {
                        err,
                        retry_after: None,
                    })
                }
                CallOutcome::Permanent(err) => {
                    warn!(step, attempt, error = %err, "Permanent error, failing immediately");
                    stopped.store(true, Ordering::SeqCst);
                    Err(RetryError::Permanent(err))
                }
            }
        })
        .await;

        let attempts = attempts.load(Ordering::SeqCst);
        result.map(|value| (value, attempts)).map_err(|source| {
            if permanent.load(Ordering::SeqCst) {
                ExecuteError::Permanent { attempts, source }
            } else {
                error!(step, attempts, "All {} attempts failed: {}", attempts, source);
                ExecuteError::Exhausted { attempts, source }
            }
        })
    }
}
