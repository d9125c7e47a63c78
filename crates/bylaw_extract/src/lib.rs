//! bylaw-extract - rate-limited structured data extraction from by-law PDFs
//!
//! Uploads each PDF to the Gemini Files API, counts its tokens, asks the
//! model for structured JSON, saves the result and deletes the upload. Every
//! call respects per-minute and per-day quotas and is retried with
//! exponential backoff.
//!
//! # Architecture
//!
//! - `bylaw_error` - Error types
//! - `bylaw_rate_limit` - Quota tiers, rolling-window limiter and retry executor
//! - `bylaw_batch` - Extraction client, input discovery, result sink and batch runner
//!
//! This crate (`bylaw_extract`) holds the command-line front end and
//! re-exports everything for convenience.
//!
//! ```text
//! bylaw-extract extract --input scans/ --output results/ --prompt-file prompt.txt
//! bylaw-extract limits --tier pay-as-you-go
//! ```

#![forbid(unsafe_code)]

pub mod cli;
mod logging;

pub use logging::{default_directive, env_filter, init_logging};

// Re-export workspace crates
pub use bylaw_batch::*;
pub use bylaw_error::*;
pub use bylaw_rate_limit::*;
