//! Layered extractor configuration.
//!
//! Sources, lowest precedence first:
//! 1. bundled defaults (`bylaw_extract.toml` shipped with the crate)
//! 2. `~/.config/bylaw_extract/bylaw_extract.toml`
//! 3. `./bylaw_extract.toml`
//! 4. an explicitly named file
//!
//! User files are optional and skipped when absent. Command-line flags are
//! applied on top by the binary.

use crate::GeminiConfig;
use bylaw_error::{BylawError, BylawResult, ConfigError};
use bylaw_rate_limit::{RateLimitConfig, RetryConfig, TierConfig};
use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, instrument};

/// Bundled default configuration.
const DEFAULT_CONFIG: &str = include_str!("../../../bylaw_extract.toml");

/// The `[batch]` configuration table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct BatchConfig {
    /// Documents counted above this many tokens are failed without extraction
    #[serde(default)]
    pub max_document_tokens: Option<u64>,
}

/// Complete extractor configuration.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct ExtractorConfig {
    /// Quota ceilings and daily wait policy
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Attempts and backoff per call step
    #[serde(default)]
    pub retry: RetryConfig,

    /// Model and API endpoint
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Per-document limits
    #[serde(default)]
    pub batch: BatchConfig,
}

impl ExtractorConfig {
    /// Load configuration from a single file, without defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> BylawResult<Self> {
        debug!("Loading configuration from file");

        Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                BylawError::from(ConfigError::new(format!(
                    "Failed to read configuration from {}: {}",
                    path.as_ref().display(),
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                BylawError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })
    }

    /// Load configuration with precedence: explicit file > current dir >
    /// home dir > bundled defaults.
    ///
    /// An explicit file must exist; the others are optional.
    #[instrument]
    pub fn load(explicit: Option<&Path>) -> BylawResult<Self> {
        debug!("Loading configuration with precedence: explicit > current dir > home dir > bundled defaults");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/bylaw_extract/bylaw_extract.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("bylaw_extract").required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder
            .build()
            .map_err(|e| {
                BylawError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                BylawError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })
    }

    /// Check settings and resolve the quota tier.
    ///
    /// # Errors
    ///
    /// Rejects zero quota ceilings, zero attempts, an empty model name and a
    /// non-positive request timeout.
    pub fn validate(&self) -> BylawResult<TierConfig> {
        let tier = self.rate_limit.resolve()?;

        if self.retry.max_retries == 0 {
            return Err(ConfigError::invalid("retry.max_retries", "must be at least 1").into());
        }
        if self.gemini.model.trim().is_empty() {
            return Err(ConfigError::invalid("gemini.model", "must not be empty").into());
        }
        if self.gemini.request_timeout_secs == 0 {
            return Err(
                ConfigError::invalid("gemini.request_timeout_secs", "must be at least 1").into(),
            );
        }
        if self.batch.max_document_tokens == Some(0) {
            return Err(
                ConfigError::invalid("batch.max_document_tokens", "must be at least 1").into(),
            );
        }

        Ok(tier)
    }
}
