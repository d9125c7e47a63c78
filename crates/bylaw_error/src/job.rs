//! Per-document job failures.
//!
//! A job error fails one input document only; the batch runner records it and
//! moves on to the next document.

/// Specific reasons a batch job can fail.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum JobErrorKind {
    /// A call step kept failing transiently until the attempt budget ran out
    #[display("{} failed after {} attempts: {}", step, attempts, message)]
    RetriesExhausted {
        /// Call step name (upload, count_tokens, generate_content, delete)
        step: String,
        /// Number of attempts made
        attempts: u32,
        /// Last error reported by the API client
        message: String,
    },
    /// A call step failed with an error that retrying cannot fix
    #[display("{} failed permanently: {}", step, message)]
    Permanent {
        /// Call step name
        step: String,
        /// Error reported by the API client
        message: String,
    },
    /// Document is larger than the configured token ceiling
    #[display("Document has {} tokens, above the ceiling of {}", tokens, ceiling)]
    TokenCeilingExceeded {
        /// Counted document tokens
        tokens: u64,
        /// Configured ceiling
        ceiling: u64,
    },
    /// Extraction result could not be written to the sink
    #[display("Failed to persist result: {}", _0)]
    Persist(String),
}

/// Job error with location tracking.
///
/// # Examples
///
/// ```
/// use bylaw_error::{JobError, JobErrorKind};
///
/// let err = JobError::new(JobErrorKind::TokenCeilingExceeded {
///     tokens: 12_000,
///     ceiling: 10_000,
/// });
/// assert!(format!("{}", err).contains("12000 tokens"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Job Error: {} at line {} in {}", kind, line, file)]
pub struct JobError {
    /// The kind of error that occurred
    pub kind: JobErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl JobError {
    /// Create a new job error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: JobErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &JobErrorKind {
        &self.kind
    }
}
