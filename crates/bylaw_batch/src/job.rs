//! Per-document job state.

use crate::ResultStatus;
use bylaw_error::JobError;
use derive_getters::Getters;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Lifecycle of a batch job.
///
/// Jobs advance `Pending → Uploading → Counting → Extracting → Persisting →
/// Deleting → Done`. Any step may end in `Failed`, which skips the remaining
/// steps. A document over the token ceiling passes through `Deleting` on its
/// way to `Failed`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobState {
    /// Not started
    #[default]
    Pending,
    /// Sending the document to the file store
    Uploading,
    /// Measuring document tokens
    Counting,
    /// Running the extraction prompt
    Extracting,
    /// Writing the result
    Persisting,
    /// Removing the uploaded copy
    Deleting,
    /// Finished; the result was persisted
    Done,
    /// Stopped on an error
    Failed,
}

impl JobState {
    /// True for `Done` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

/// One input document moving through the extraction pipeline.
#[derive(Debug, Clone, Getters)]
pub struct BatchJob {
    /// Input document
    input: PathBuf,
    /// Current lifecycle state
    state: JobState,
    /// Attempts spent on each completed or failed call step
    attempts: Vec<(String, u32)>,
    /// Document token count, once measured
    token_count: Option<u64>,
    /// Whether the persisted result passed validation
    result_status: Option<ResultStatus>,
    /// Where the result was written
    output: Option<PathBuf>,
    /// Why the job failed
    error: Option<JobError>,
}

impl BatchJob {
    /// Create a pending job for `input`.
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            state: JobState::Pending,
            attempts: Vec::new(),
            token_count: None,
            result_status: None,
            output: None,
            error: None,
        }
    }

    /// File name used in log lines.
    pub fn label(&self) -> String {
        display_name(&self.input)
    }

    /// Whether the job reached `Done`.
    pub fn succeeded(&self) -> bool {
        self.state == JobState::Done
    }

    pub(crate) fn advance(&mut self, state: JobState) {
        debug!(input = %self.label(), from = %self.state, to = %state, "Job transition");
        self.state = state;
    }

    pub(crate) fn record_attempts(&mut self, step: &str, attempts: u32) {
        self.attempts.push((step.to_string(), attempts));
    }

    pub(crate) fn set_token_count(&mut self, tokens: u64) {
        self.token_count = Some(tokens);
    }

    pub(crate) fn set_result_status(&mut self, status: ResultStatus) {
        self.result_status = Some(status);
    }

    pub(crate) fn set_output(&mut self, output: PathBuf) {
        self.output = Some(output);
    }

    pub(crate) fn fail(&mut self, error: JobError) {
        self.advance(JobState::Failed);
        self.error = Some(error);
    }
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
