//! Sequential batch runner.

use crate::job::display_name;
use crate::{
    BatchJob, ExtractionClient, FileHandle, JobState, ResultSink, ResultStatus, ResultValidator,
    URL_FIELD, UrlMap,
};
use bylaw_error::{GeminiResult, JobError, JobErrorKind};
use bylaw_rate_limit::{ExecuteError, RateLimitedExecutor};
use derive_getters::Getters;
use serde_json::Value;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, warn};

/// Outcome of a whole batch.
#[derive(Debug, Clone, Getters)]
pub struct BatchSummary {
    /// Documents attempted
    total: usize,
    /// Documents whose result was persisted
    succeeded: usize,
    /// Persisted documents whose result failed validation
    invalid: usize,
    /// Failed documents with the reason each failed
    failures: Vec<(PathBuf, String)>,
    /// Final state of every job, in input order
    jobs: Vec<BatchJob>,
}

impl BatchSummary {
    fn from_jobs(jobs: Vec<BatchJob>) -> Self {
        let failures = jobs
            .iter()
            .filter(|job| !job.succeeded())
            .map(|job| {
                let reason = job
                    .error()
                    .as_ref()
                    .map(|e| e.kind.to_string())
                    .unwrap_or_else(|| format!("stopped in state {}", job.state()));
                (job.input().clone(), reason)
            })
            .collect();

        Self {
            total: jobs.len(),
            succeeded: jobs.iter().filter(|job| job.succeeded()).count(),
            invalid: jobs
                .iter()
                .filter(|job| *job.result_status() == Some(ResultStatus::Invalid))
                .count(),
            failures,
            jobs,
        }
    }

    /// True when every document was processed.
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Process exit status: 0 when every job succeeded, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.all_succeeded() { 0 } else { 1 }
    }
}

/// Drives one extraction job per input document, strictly in order.
///
/// Each job runs upload, count tokens, generate content, persist and delete.
/// Every remote call goes through the shared [`RateLimitedExecutor`]. A job
/// that fails does not stop the batch, and its uploaded copy is only deleted
/// when the failure was the token ceiling.
#[derive(Debug)]
pub struct BatchRunner<C, S> {
    client: C,
    sink: S,
    executor: RateLimitedExecutor,
    max_document_tokens: Option<u64>,
    validator: ResultValidator,
    urls: UrlMap,
}

impl<C, S> BatchRunner<C, S>
where
    C: ExtractionClient,
    S: ResultSink,
{
    /// Create a runner.
    pub fn new(client: C, sink: S, executor: RateLimitedExecutor) -> Self {
        Self {
            client,
            sink,
            executor,
            max_document_tokens: None,
            validator: ResultValidator::default(),
            urls: UrlMap::default(),
        }
    }

    /// Fail documents counted above `ceiling` tokens without extracting them.
    pub fn with_max_document_tokens(mut self, ceiling: Option<u64>) -> Self {
        self.max_document_tokens = ceiling;
        self
    }

    /// Check results with `validator` before persisting them.
    pub fn with_validator(mut self, validator: ResultValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Add source URLs from `urls` to valid results.
    pub fn with_url_map(mut self, urls: UrlMap) -> Self {
        self.urls = urls;
        self
    }

    /// The executor shared by all jobs.
    pub fn executor(&self) -> &RateLimitedExecutor {
        &self.executor
    }

    /// Process every input in order and summarize.
    #[instrument(skip(self, inputs), fields(total = inputs.len()))]
    pub async fn run(&self, inputs: &[PathBuf]) -> BatchSummary {
        let mut jobs = Vec::with_capacity(inputs.len());
        for input in inputs {
            jobs.push(self.process(input).await);
        }

        let summary = BatchSummary::from_jobs(jobs);
        info!(
            "Processing complete. {}/{} files processed successfully.",
            summary.succeeded, summary.total
        );
        if summary.invalid > 0 {
            warn!("{} results were saved as error files", summary.invalid);
        }
        summary
    }

    /// Run the full pipeline for one document.
    #[instrument(skip(self, input), fields(input = %input.display()))]
    pub async fn process(&self, input: &Path) -> BatchJob {
        let mut job = BatchJob::new(input);
        info!("Processing {}...", job.label());

        job.advance(JobState::Uploading);
        let handle = match self
            .step(&mut job, "upload", 0, || self.client.upload(input))
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                error!("Error processing {}: {}", job.label(), e.kind);
                job.fail(e);
                return job;
            }
        };
        info!(uri = %handle.uri(), "File URI: {}", handle.uri());

        match self.extract(&mut job, input, &handle).await {
            Ok(output) => {
                job.set_output(output);
                job.advance(JobState::Deleting);
                self.cleanup(&mut job, &handle).await;
                job.advance(JobState::Done);
            }
            Err(e) => {
                if matches!(e.kind, JobErrorKind::TokenCeilingExceeded { .. }) {
                    job.advance(JobState::Deleting);
                    self.cleanup(&mut job, &handle).await;
                }
                error!("Error processing {}: {}", job.label(), e.kind);
                job.fail(e);
            }
        }
        job
    }

    async fn extract(
        &self,
        job: &mut BatchJob,
        input: &Path,
        handle: &FileHandle,
    ) -> Result<PathBuf, JobError> {
        job.advance(JobState::Counting);
        let tokens = self
            .step(job, "count_tokens", 0, || self.client.count_tokens(handle))
            .await?;
        job.set_token_count(tokens);
        info!("Token count: {}", tokens);

        if let Some(ceiling) = self.max_document_tokens.filter(|&ceiling| tokens > ceiling) {
            warn!(tokens, ceiling, "Document exceeds token ceiling, skipping extraction");
            return Err(JobError::new(JobErrorKind::TokenCeilingExceeded {
                tokens,
                ceiling,
            }));
        }

        job.advance(JobState::Extracting);
        let mut result = self
            .step(job, "generate_content", tokens, || {
                self.client.generate_content(handle, tokens)
            })
            .await?;

        let status = self.validator.check(&result);
        if status.is_valid() {
            self.attach_url(input, &mut result);
        }
        job.set_result_status(status);

        job.advance(JobState::Persisting);
        self.sink
            .persist(input, &result, status)
            .await
            .map_err(|e| JobError::new(JobErrorKind::Persist(e.kind.to_string())))
    }

    fn attach_url(&self, input: &Path, result: &mut Value) {
        if self.urls.is_empty() {
            return;
        }
        let name = display_name(input);
        match (self.urls.get(&name), result.as_object_mut()) {
            (Some(url), Some(fields)) => {
                fields.insert(URL_FIELD.to_string(), Value::String(url.to_string()));
                info!("Added URL for {}: {}", name, url);
            }
            (None, _) => warn!("No URL found for {} in CSV", name),
            (Some(_), None) => warn!("Result for {} is not an object, URL not added", name),
        }
    }

    /// Delete the uploaded copy. Failures are logged only.
    async fn cleanup(&self, job: &mut BatchJob, handle: &FileHandle) {
        if let Err(e) = self
            .step(job, "delete", 0, || self.client.delete(handle))
            .await
        {
            warn!(
                uri = %handle.uri(),
                "Failed to delete uploaded file for {}: {}",
                display_name(job.input()),
                e.kind
            );
        }
    }

    async fn step<F, Fut, T>(
        &self,
        job: &mut BatchJob,
        step: &str,
        tokens: u64,
        operation: F,
    ) -> Result<T, JobError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = GeminiResult<T>>,
    {
        match self.executor.execute_counted(step, tokens, operation).await {
            Ok((value, attempts)) => {
                job.record_attempts(step, attempts);
                Ok(value)
            }
            Err(err) => {
                job.record_attempts(step, err.attempts());
                let kind = match err {
                    ExecuteError::Exhausted { attempts, source } => {
                        JobErrorKind::RetriesExhausted {
                            step: step.to_string(),
                            attempts,
                            message: source.kind.to_string(),
                        }
                    }
                    ExecuteError::Permanent { source, .. } => JobErrorKind::Permanent {
                        step: step.to_string(),
                        message: source.kind.to_string(),
                    },
                };
                Err(JobError::new(kind))
            }
        }
    }
}
