//! Quota report command handler.

use bylaw_batch::ExtractorConfig;
use bylaw_error::BylawResult;

/// Render the resolved quota and retry settings.
pub fn limits_report(config: &ExtractorConfig) -> BylawResult<String> {
    let tier = config.validate()?;
    let policy = config.retry.policy();

    Ok(format!(
        "Tier: {}\n  \
         Requests per minute: {}\n  \
         Tokens per minute:   {}\n  \
         Requests per day:    {}\n  \
         Daily wait policy:   {}\n\
         Retry: {} attempts, {}s base delay\n",
        tier.name,
        ceiling(tier.rpm.map(u64::from)),
        ceiling(tier.tpm),
        ceiling(tier.rpd.map(u64::from)),
        config.rate_limit.rpd_wait,
        policy.max_retries(),
        policy.retry_delay().as_secs()
    ))
}

fn ceiling(limit: Option<u64>) -> String {
    limit.map_or_else(|| "unlimited".to_string(), |l| l.to_string())
}
