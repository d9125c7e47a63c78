//! Configuration structures for rate limiting and retry.
//!
//! These deserialize from the `[rate_limit]` and `[retry]` tables of the
//! extractor configuration:
//!
//! ```toml
//! [rate_limit]
//! tier = "free"        # preset quotas
//! rpm = 10             # optional override of the preset
//! rpd_wait = "chunked" # or "until-midnight"
//!
//! [retry]
//! max_retries = 3
//! retry_delay_secs = 2
//! ```

use crate::tiers::GeminiTier;
use crate::{RetryPolicy, RpdWaitPolicy, Tier};
use bylaw_error::{RateLimitError, RateLimitErrorKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Concrete quota ceilings, resolved from a preset plus overrides.
///
/// `None` means the quota is not enforced.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TierConfig {
    /// Name of the tier (e.g., "Free", "Custom")
    pub name: String,

    /// Requests per minute limit
    #[serde(default)]
    pub rpm: Option<u32>,

    /// Tokens per minute limit
    #[serde(default)]
    pub tpm: Option<u64>,

    /// Requests per day limit
    #[serde(default)]
    pub rpd: Option<u32>,
}

impl TierConfig {
    /// Create a tier from explicit ceilings.
    pub fn new(
        name: impl Into<String>,
        rpm: Option<u32>,
        tpm: Option<u64>,
        rpd: Option<u32>,
    ) -> Self {
        Self {
            name: name.into(),
            rpm,
            tpm,
            rpd,
        }
    }

    /// Copy the ceilings of any tier.
    pub fn from_tier(tier: &dyn Tier) -> Self {
        Self::new(tier.name(), tier.rpm(), tier.tpm(), tier.rpd())
    }
}

impl Tier for TierConfig {
    fn rpm(&self) -> Option<u32> {
        self.rpm
    }

    fn tpm(&self) -> Option<u64> {
        self.tpm
    }

    fn rpd(&self) -> Option<u32> {
        self.rpd
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// The `[rate_limit]` configuration table.
///
/// A preset `tier` supplies the starting ceilings and each of `rpm`, `tpm`
/// and `rpd` replaces the matching preset value when set. The preset defaults
/// to the free tier. With `tier` set to `None` only the explicitly set quotas
/// are enforced.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Provider preset to start from
    #[serde(default = "default_tier")]
    pub tier: Option<GeminiTier>,

    /// Requests per minute override
    #[serde(default)]
    pub rpm: Option<u32>,

    /// Tokens per minute override
    #[serde(default)]
    pub tpm: Option<u64>,

    /// Requests per day override
    #[serde(default)]
    pub rpd: Option<u32>,

    /// How waits on the daily quota are slept
    #[serde(default)]
    pub rpd_wait: RpdWaitPolicy,
}

fn default_tier() -> Option<GeminiTier> {
    Some(GeminiTier::Free)
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            tier: default_tier(),
            rpm: None,
            tpm: None,
            rpd: None,
            rpd_wait: RpdWaitPolicy::default(),
        }
    }
}

impl RateLimitConfig {
    /// Merge the preset with overrides into concrete ceilings.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitErrorKind::ZeroLimit`] when any resolved ceiling is
    /// zero.
    pub fn resolve(&self) -> Result<TierConfig, RateLimitError> {
        let base = self
            .tier
            .map(|tier| TierConfig::from_tier(&tier))
            .unwrap_or_else(|| TierConfig::new("Custom", None, None, None));

        let overridden = self.rpm.is_some() || self.tpm.is_some() || self.rpd.is_some();
        let resolved = TierConfig {
            name: if overridden && self.tier.is_some() {
                format!("{} (custom)", base.name)
            } else {
                base.name
            },
            rpm: self.rpm.or(base.rpm),
            tpm: self.tpm.or(base.tpm),
            rpd: self.rpd.or(base.rpd),
        };

        if resolved.rpm == Some(0) {
            return Err(RateLimitErrorKind::ZeroLimit("RPM").into());
        }
        if resolved.tpm == Some(0) {
            return Err(RateLimitErrorKind::ZeroLimit("TPM").into());
        }
        if resolved.rpd == Some(0) {
            return Err(RateLimitErrorKind::ZeroLimit("RPD").into());
        }

        debug!(?resolved, "Resolved rate limit tier");
        Ok(resolved)
    }
}

/// The `[retry]` configuration table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Total attempts per call step, including the first
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay in seconds, doubled after each failure
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    2
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl RetryConfig {
    /// Build the runtime retry policy.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_secs(self.retry_delay_secs))
    }
}
