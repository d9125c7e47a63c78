//! Tier trait for representing API quota ceilings.

/// Quota ceilings for an API tier.
///
/// The limiter enforces three independent quotas. Every method returns
/// `Option` where `None` means the tier does not publish that quota and the
/// limiter leaves it unenforced.
///
/// # Example
///
/// ```
/// use bylaw_rate_limit::Tier;
///
/// struct ScannerTier;
///
/// impl Tier for ScannerTier {
///     fn rpm(&self) -> Option<u32> { Some(15) }
///     fn tpm(&self) -> Option<u64> { Some(1_000_000) }
///     fn rpd(&self) -> Option<u32> { Some(1_500) }
///     fn name(&self) -> &str { "Scanner" }
/// }
///
/// assert_eq!(ScannerTier.rpm(), Some(15));
/// ```
pub trait Tier: Send + Sync {
    /// Requests per minute limit.
    fn rpm(&self) -> Option<u32>;

    /// Tokens per minute limit.
    fn tpm(&self) -> Option<u64>;

    /// Requests per day limit.
    fn rpd(&self) -> Option<u32>;

    /// Name of the tier (e.g., "Free", "Pay-as-you-go").
    fn name(&self) -> &str;
}
