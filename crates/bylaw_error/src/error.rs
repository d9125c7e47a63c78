//! Top-level error wrapper types.

use crate::{ConfigError, GeminiError, JobError, RateLimitError, StorageError};

/// Every failure the pipeline can surface, by originating concern.
///
/// # Examples
///
/// ```
/// use bylaw_error::{BylawError, ConfigError};
///
/// let config_err = ConfigError::new("Missing [rate_limit] section");
/// let err: BylawError = config_err.into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum BylawErrorKind {
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Invalid rate limiter settings
    #[from(RateLimitError)]
    RateLimit(RateLimitError),
    /// Gemini API error
    #[from(GeminiError)]
    Gemini(GeminiError),
    /// Input discovery or result persistence error
    #[from(StorageError)]
    Storage(StorageError),
    /// Single job failure
    #[from(JobError)]
    Job(JobError),
}

/// Pipeline error with kind discrimination.
///
/// # Examples
///
/// ```
/// use bylaw_error::{BylawErrorKind, BylawResult, StorageError, StorageErrorKind};
///
/// fn discover() -> BylawResult<Vec<String>> {
///     Err(StorageError::new(StorageErrorKind::InputNotFound("scans".to_string())))?
/// }
///
/// let err = discover().unwrap_err();
/// assert!(matches!(err.kind(), BylawErrorKind::Storage(_)));
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Bylaw Error: {}", _0)]
pub struct BylawError(Box<BylawErrorKind>);

impl BylawError {
    /// Create a new error from a kind.
    pub fn new(kind: BylawErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &BylawErrorKind {
        &self.0
    }
}

// Generic From implementation for any type that converts to BylawErrorKind
impl<T> From<T> for BylawError
where
    T: Into<BylawErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for pipeline operations.
pub type BylawResult<T> = std::result::Result<T, BylawError>;
