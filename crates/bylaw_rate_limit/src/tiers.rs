//! Provider tier presets.
//!
//! Concrete quota tables for the Gemini API. A preset is the starting point
//! for [`TierConfig`](crate::TierConfig); explicit `rpm`/`tpm`/`rpd` settings
//! override individual ceilings.

use crate::Tier;
use serde::{Deserialize, Serialize};

/// Gemini API usage tiers for `gemini-2.0-flash`.
///
/// Based on [Gemini API rate limits](https://ai.google.dev/gemini-api/docs/rate-limits).
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
    strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum GeminiTier {
    /// Free tier: 15 RPM, 1M TPM, 1,500 RPD
    #[default]
    Free,
    /// Pay-as-you-go: 2,000 RPM, 4M TPM, no daily limit
    PayAsYouGo,
}

impl Tier for GeminiTier {
    fn rpm(&self) -> Option<u32> {
        match self {
            GeminiTier::Free => Some(15),
            GeminiTier::PayAsYouGo => Some(2_000),
        }
    }

    fn tpm(&self) -> Option<u64> {
        match self {
            GeminiTier::Free => Some(1_000_000),
            GeminiTier::PayAsYouGo => Some(4_000_000),
        }
    }

    fn rpd(&self) -> Option<u32> {
        match self {
            GeminiTier::Free => Some(1_500),
            GeminiTier::PayAsYouGo => None,
        }
    }

    fn name(&self) -> &str {
        match self {
            GeminiTier::Free => "Free",
            GeminiTier::PayAsYouGo => "Pay-as-you-go",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parses_kebab_case_names() {
        assert_eq!(GeminiTier::from_str("free").unwrap(), GeminiTier::Free);
        assert_eq!(
            GeminiTier::from_str("pay-as-you-go").unwrap(),
            GeminiTier::PayAsYouGo
        );
        assert!(GeminiTier::from_str("enterprise").is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        use strum::IntoEnumIterator;
        for tier in GeminiTier::iter() {
            assert_eq!(GeminiTier::from_str(&tier.to_string()).unwrap(), tier);
        }
    }
}
