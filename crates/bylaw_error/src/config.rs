//! Configuration error types.

/// Configuration error with source location.
///
/// Raised when layered configuration files cannot be read or parsed, or when
/// resolved settings fail validation (zero quotas, empty model name).
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Configuration Error: {} at line {} in {}", message, line, file)]
pub struct ConfigError {
    /// Error message
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl ConfigError {
    /// Create a new ConfigError with the given message at the current location.
    ///
    /// # Examples
    ///
    /// ```
    /// use bylaw_error::ConfigError;
    ///
    /// let err = ConfigError::new("Failed to parse bylaw_extract.toml");
    /// assert!(err.message.contains("bylaw_extract.toml"));
    /// ```
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }

    /// Create an error for a setting that failed validation.
    ///
    /// ```
    /// use bylaw_error::ConfigError;
    ///
    /// let err = ConfigError::invalid("retry.max_retries", "must be at least 1");
    /// assert_eq!(err.message, "Invalid value for 'retry.max_retries': must be at least 1");
    /// ```
    #[track_caller]
    pub fn invalid(field: &str, reason: impl std::fmt::Display) -> Self {
        Self::new(format!("Invalid value for '{}': {}", field, reason))
    }
}
