//! Rate limiting and retry for Gemini API call steps.
//!
//! This crate keeps the batch extractor inside the provider's published quotas:
//!
//! - [`RateLimiter`] tracks requests per minute, tokens per minute and requests
//!   per day in rolling windows and suspends callers until a call is permitted.
//! - [`RateLimitedExecutor`] wraps a single API call step: it waits on the
//!   limiter before every attempt, records successful calls, and retries
//!   transient failures with exponential backoff.
//! - [`Clock`] abstracts wall time and sleeping so quota behavior can be driven
//!   deterministically with [`ManualClock`].
//!
//! Quotas come from a [`Tier`]: either a provider preset from [`tiers`] or a
//! [`TierConfig`] resolved from configuration.
//!
//! ```rust,ignore
//! use bylaw_rate_limit::{RateLimiter, SystemClock, tiers::GeminiTier};
//! use std::sync::Arc;
//!
//! let limiter = RateLimiter::new(&GeminiTier::Free, Arc::new(SystemClock))?;
//! limiter.wait_if_needed().await;
//! // make the API call...
//! limiter.record_request(0);
//! ```

#![forbid(unsafe_code)]

mod clock;
mod config;
mod executor;
mod limiter;
mod retry;
mod tier;
pub mod tiers;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{RateLimitConfig, RetryConfig, TierConfig};
pub use executor::{ExecuteError, RateLimitedExecutor};
pub use limiter::{LimitsInfo, QuotaStatus, RateLimiter, RpdWaitPolicy};
pub use retry::{CallOutcome, RetryPolicy};
pub use tier::Tier;
