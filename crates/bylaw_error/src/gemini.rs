//! Gemini API error types and retry classification.

/// Gemini-specific error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum GeminiErrorKind {
    /// API key not supplied on the command line or in the environment
    #[display("GEMINI_API_KEY environment variable not set")]
    MissingApiKey,
    /// Failed to build the HTTP client
    #[display("Failed to create Gemini client: {}", _0)]
    ClientCreation(String),
    /// Request never produced a response (connect, timeout, body read)
    #[display("Gemini API request failed: {}", _0)]
    Transport(String),
    /// HTTP error with status code and message
    #[display("HTTP {} error: {}", status_code, message)]
    HttpError {
        /// HTTP status code
        status_code: u16,
        /// Error message
        message: String,
    },
    /// Response arrived but lacked an expected field or was not valid JSON
    #[display("Malformed Gemini response: {}", _0)]
    MalformedResponse(String),
    /// Remote file reference cannot be turned into a file name
    #[display("Invalid file URI format: {}", _0)]
    InvalidFileReference(String),
    /// Local document could not be read before upload
    #[display("Failed to read document {}", _0)]
    FileRead(String),
}

impl GeminiErrorKind {
    /// Check if this error type should be retried.
    ///
    /// Every HTTP status, transport failure and malformed response is treated
    /// as transient. Local problems (missing key, unreadable file, bad
    /// reference) will fail the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            GeminiErrorKind::Transport(_)
            | GeminiErrorKind::HttpError { .. }
            | GeminiErrorKind::MalformedResponse(_) => true,
            GeminiErrorKind::MissingApiKey
            | GeminiErrorKind::ClientCreation(_)
            | GeminiErrorKind::InvalidFileReference(_)
            | GeminiErrorKind::FileRead(_) => false,
        }
    }
}

/// Gemini error with source location tracking.
///
/// # Examples
///
/// ```
/// use bylaw_error::{GeminiError, GeminiErrorKind};
///
/// let err = GeminiError::new(GeminiErrorKind::MissingApiKey);
/// assert!(format!("{}", err).contains("GEMINI_API_KEY"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Gemini Error: {} at line {} in {}", kind, line, file)]
pub struct GeminiError {
    /// The kind of error that occurred
    pub kind: GeminiErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl GeminiError {
    /// Create a new GeminiError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: GeminiErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &GeminiErrorKind {
        &self.kind
    }
}

impl From<GeminiErrorKind> for GeminiError {
    #[track_caller]
    fn from(kind: GeminiErrorKind) -> Self {
        Self::new(kind)
    }
}

/// Result type for Gemini API calls.
pub type GeminiResult<T> = Result<T, GeminiError>;

/// Trait for errors that support retry logic.
///
/// The retry wrapper asks this trait whether a failed call is worth another
/// attempt. Transient errors are retried with backoff; permanent errors end the
/// call step immediately.
///
/// # Examples
///
/// ```
/// use bylaw_error::{GeminiError, GeminiErrorKind, RetryableError};
///
/// let err = GeminiError::new(GeminiErrorKind::HttpError {
///     status_code: 503,
///     message: "Service unavailable".to_string(),
/// });
/// assert!(err.is_retryable());
///
/// let err = GeminiError::new(GeminiErrorKind::FileRead("missing.pdf".to_string()));
/// assert!(!err.is_retryable());
/// ```
pub trait RetryableError {
    /// Returns true if this error should trigger a retry.
    fn is_retryable(&self) -> bool;
}

impl RetryableError for GeminiError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
