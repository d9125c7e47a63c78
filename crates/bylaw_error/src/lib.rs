//! Error types for the by-law extraction pipeline.
//!
//! This crate provides the foundation error types used by the rate limiter,
//! the batch runner and the command-line front end.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use bylaw_error::{BylawResult, ConfigError};
//!
//! fn load() -> BylawResult<String> {
//!     Err(ConfigError::new("rpm must be greater than zero"))?
//! }
//!
//! match load() {
//!     Ok(data) => println!("Got: {}", data),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod gemini;
mod job;
mod rate_limit;
mod storage;

pub use config::ConfigError;
pub use error::{BylawError, BylawErrorKind, BylawResult};
pub use gemini::{GeminiError, GeminiErrorKind, GeminiResult, RetryableError};
pub use job::{JobError, JobErrorKind};
pub use rate_limit::{RateLimitError, RateLimitErrorKind};
pub use storage::{StorageError, StorageErrorKind};
