//! Tests for rate limit and retry configuration tables.

use bylaw_rate_limit::{RateLimitConfig, RetryConfig, RpdWaitPolicy, Tier, tiers::GeminiTier};
use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize)]
struct Tables {
    #[serde(default)]
    rate_limit: RateLimitConfig,
    #[serde(default)]
    retry: RetryConfig,
}

#[test]
fn test_empty_tables_use_defaults() -> anyhow::Result<()> {
    let tables: Tables = toml::from_str("")?;

    assert_eq!(tables.rate_limit.tier, Some(GeminiTier::Free));
    assert_eq!(tables.rate_limit.resolve()?.rpd(), Some(1_500));
    assert_eq!(tables.rate_limit.rpd_wait, RpdWaitPolicy::Chunked);
    assert_eq!(tables.retry.max_retries, 3);
    assert_eq!(tables.retry.retry_delay_secs, 2);
    Ok(())
}

#[test]
fn test_preset_with_overrides() -> anyhow::Result<()> {
    let tables: Tables = toml::from_str(
        r#"
        [rate_limit]
        tier = "pay-as-you-go"
        rpd = 10_000
        rpd_wait = "until-midnight"

        [retry]
        max_retries = 5
        retry_delay_secs = 1
        "#,
    )?;

    let tier = tables.rate_limit.resolve()?;
    assert_eq!(tier.rpm(), GeminiTier::PayAsYouGo.rpm());
    assert_eq!(tier.rpd(), Some(10_000));
    assert_eq!(tables.rate_limit.rpd_wait, RpdWaitPolicy::UntilMidnight);

    let delays: Vec<Duration> = tables.retry.policy().delays().collect();
    assert_eq!(delays.len(), 4);
    assert_eq!(delays[3], Duration::from_secs(8));
    Ok(())
}

#[test]
fn test_unknown_tier_is_rejected() {
    let parsed: Result<Tables, _> = toml::from_str(
        r#"
        [rate_limit]
        tier = "enterprise"
        "#,
    );
    assert!(parsed.is_err());
}

#[test]
fn test_free_preset_matches_published_limits() {
    let tier = GeminiTier::Free;
    assert_eq!(tier.rpm(), Some(15));
    assert_eq!(tier.tpm(), Some(1_000_000));
    assert_eq!(tier.rpd(), Some(1_500));
    assert_eq!(tier.name(), "Free");
}
