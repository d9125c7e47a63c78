//! Rate-limited batch extraction of structured data from by-law PDFs.
//!
//! A batch is a list of input documents. Each document becomes a
//! [`BatchJob`] that the [`BatchRunner`] drives through a fixed call
//! sequence against an [`ExtractionClient`]:
//!
//! 1. upload the PDF
//! 2. count its tokens
//! 3. generate structured content from it
//! 4. check it with a [`ResultValidator`] and persist it through a [`ResultSink`]
//! 5. delete the uploaded copy (best effort)
//!
//! Every remote call is gated by a shared rate limiter and retried with
//! exponential backoff. A failing job is recorded and the batch moves on;
//! its uploaded copy is left in place.
//!
//! ```rust,ignore
//! use bylaw_batch::{BatchRunner, GeminiFilesClient, JsonFileSink, collect_inputs};
//!
//! let inputs = collect_inputs(Path::new("scans"))?;
//! let runner = BatchRunner::new(client, JsonFileSink::new("out"), executor);
//! let summary = runner.run(&inputs).await;
//! std::process::exit(summary.exit_code().into());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod gemini;
mod job;
mod runner;
mod sink;
mod source;
mod urls;
mod validate;

pub use client::{ExtractionClient, FileHandle};
pub use config::{BatchConfig, ExtractorConfig};
pub use gemini::{ExtractionPrompt, GeminiConfig, GeminiFilesClient, extract_json};
pub use job::{BatchJob, JobState};
pub use runner::{BatchRunner, BatchSummary};
pub use sink::{ERROR_SUFFIX, JsonFileSink, REPROCESSED_ERROR_SUFFIX, ResultSink};
pub use source::{collect_errored_inputs, collect_inputs};
pub use urls::{URL_FIELD, UrlMap};
pub use validate::{MIN_FIELD_SHARE, ResultStatus, ResultValidator};
