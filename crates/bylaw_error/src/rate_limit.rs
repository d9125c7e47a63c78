//! Error types for rate limiter construction.

use std::fmt;

/// Error kinds for rate limiting operations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RateLimitErrorKind {
    /// A quota ceiling was configured as zero, which would block forever.
    ZeroLimit(&'static str),
}

impl fmt::Display for RateLimitErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitErrorKind::ZeroLimit(quota) => {
                write!(f, "{} limit must be greater than zero", quota)
            }
        }
    }
}

/// Rate limiting error with location tracking.
///
/// # Examples
///
/// ```
/// use bylaw_error::{RateLimitError, RateLimitErrorKind};
///
/// let err = RateLimitError::from(RateLimitErrorKind::ZeroLimit("RPD"));
/// assert_eq!(err.kind(), &RateLimitErrorKind::ZeroLimit("RPD"));
/// assert!(err.to_string().contains("RPD limit must be greater than zero"));
/// ```
#[derive(Debug, Clone)]
pub struct RateLimitError {
    kind: RateLimitErrorKind,
    line: u32,
    file: &'static str,
}

impl RateLimitError {
    /// Create a new rate limiting error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: RateLimitErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &RateLimitErrorKind {
        &self.kind
    }
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rate Limit Error: {} at line {} in {}",
            self.kind, self.line, self.file
        )
    }
}

impl std::error::Error for RateLimitError {}

impl From<RateLimitErrorKind> for RateLimitError {
    #[track_caller]
    fn from(kind: RateLimitErrorKind) -> Self {
        Self::new(kind)
    }
}
