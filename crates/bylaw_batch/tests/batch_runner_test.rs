//! Tests for the batch runner's job sequencing, retry and cleanup.

use async_trait::async_trait;
use bylaw_batch::{
    BatchRunner, ExtractionClient, FileHandle, JobState, ResultSink, ResultStatus, ResultValidator,
    UrlMap,
};
use bylaw_error::{GeminiError, GeminiErrorKind, GeminiResult, JobErrorKind, StorageError};
use bylaw_rate_limit::{ManualClock, RateLimitedExecutor, RateLimiter, RetryPolicy, TierConfig};
use chrono::NaiveDate;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Shared record of calls made against the fake service.
#[derive(Debug, Clone, Default)]
struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn push(&self, call: String) {
        self.0.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

/// Fake extraction service driven by per-step failure scripts.
#[derive(Debug, Default)]
struct ScriptedClient {
    log: CallLog,
    /// Remaining transient failures per step name
    transient: Mutex<HashMap<&'static str, u32>>,
    /// Steps that always fail permanently
    permanent: Vec<&'static str>,
    /// Token count reported per document stem
    tokens: HashMap<String, u64>,
}

impl ScriptedClient {
    fn with_log(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            ..Default::default()
        }
    }

    fn failing(self, step: &'static str, times: u32) -> Self {
        self.transient.lock().unwrap().insert(step, times);
        self
    }

    fn broken(mut self, step: &'static str) -> Self {
        self.permanent.push(step);
        self
    }

    fn with_tokens(mut self, stem: &str, tokens: u64) -> Self {
        self.tokens.insert(stem.to_string(), tokens);
        self
    }

    fn call(&self, step: &'static str, target: &str) -> GeminiResult<()> {
        self.log.push(format!("{}:{}", step, target));
        if self.permanent.contains(&step) {
            return Err(GeminiError::new(GeminiErrorKind::InvalidFileReference(
                target.to_string(),
            )));
        }
        let mut transient = self.transient.lock().unwrap();
        if let Some(remaining) = transient.get_mut(step).filter(|r| **r > 0) {
            *remaining -= 1;
            return Err(GeminiError::new(GeminiErrorKind::HttpError {
                status_code: 503,
                message: "Service unavailable".to_string(),
            }));
        }
        Ok(())
    }
}

fn stem(path: &Path) -> String {
    path.file_stem().unwrap().to_string_lossy().into_owned()
}

fn stem_of(file: &FileHandle) -> String {
    file.name().unwrap().to_string()
}

#[async_trait]
impl ExtractionClient for ScriptedClient {
    async fn upload(&self, path: &Path) -> GeminiResult<FileHandle> {
        let name = stem(path);
        if name.starts_with("unreachable") {
            self.log.push(format!("upload:{}", name));
            return Err(GeminiError::new(GeminiErrorKind::Transport(
                "connection refused".to_string(),
            )));
        }
        self.call("upload", &name)?;
        Ok(FileHandle::new(format!("https://files.test/v1beta/files/{}", name)))
    }

    async fn count_tokens(&self, file: &FileHandle) -> GeminiResult<u64> {
        let name = stem_of(file);
        self.call("count_tokens", &name)?;
        Ok(self.tokens.get(&name).copied().unwrap_or(1_200))
    }

    async fn generate_content(&self, file: &FileHandle, token_count: u64) -> GeminiResult<Value> {
        let name = stem_of(file);
        self.call("generate_content", &name)?;
        Ok(json!({ "bylawNumber": name, "tokens": token_count }))
    }

    async fn delete(&self, file: &FileHandle) -> GeminiResult<()> {
        self.call("delete", &stem_of(file))
    }
}

/// Sink that keeps results in memory.
#[derive(Debug, Clone, Default)]
struct MemorySink(Arc<Mutex<Vec<(PathBuf, Value, ResultStatus)>>>);

impl MemorySink {
    fn results(&self) -> Vec<(PathBuf, Value, ResultStatus)> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn persist(
        &self,
        input: &Path,
        result: &Value,
        status: ResultStatus,
    ) -> Result<PathBuf, StorageError> {
        self.0
            .lock()
            .unwrap()
            .push((input.to_path_buf(), result.clone(), status));
        Ok(PathBuf::from(format!("memory/{}.json", stem(input))))
    }
}

fn executor(tier: TierConfig) -> (RateLimitedExecutor, ManualClock) {
    let clock = ManualClock::new(
        NaiveDate::from_ymd_opt(2024, 9, 3)
            .unwrap()
            .and_hms_opt(11, 0, 0)
            .unwrap(),
    );
    let limiter = RateLimiter::new(&tier, Arc::new(clock.clone())).unwrap();
    let executor =
        RateLimitedExecutor::new(Arc::new(limiter), RetryPolicy::new(3, Duration::from_secs(2)));
    (executor, clock)
}

fn open_tier() -> TierConfig {
    TierConfig::new("Open", None, None, None)
}

fn inputs(names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(|n| PathBuf::from(format!("scans/{}.pdf", n))).collect()
}

#[tokio::test(start_paused = true)]
async fn test_successful_job_runs_every_step_in_order() {
    let log = CallLog::default();
    let sink = MemorySink::default();
    let (executor, _clock) = executor(open_tier());
    let runner = BatchRunner::new(
        ScriptedClient::with_log(&log).with_tokens("bylaw-1987-12", 3_400),
        sink.clone(),
        executor,
    );

    let summary = runner.run(&inputs(&["bylaw-1987-12"])).await;

    assert_eq!(
        log.calls(),
        vec![
            "upload:bylaw-1987-12",
            "count_tokens:bylaw-1987-12",
            "generate_content:bylaw-1987-12",
            "delete:bylaw-1987-12",
        ]
    );
    assert!(summary.all_succeeded());
    assert_eq!(summary.exit_code(), 0);

    let job = &summary.jobs()[0];
    assert_eq!(*job.state(), JobState::Done);
    assert_eq!(*job.token_count(), Some(3_400));
    assert_eq!(
        job.output().as_deref(),
        Some(Path::new("memory/bylaw-1987-12.json"))
    );

    let results = sink.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].1["tokens"], 3_400);
    assert_eq!(results[0].2, ResultStatus::Valid);

    let info = runner.executor().limiter().check_limits();
    assert_eq!(info.rpm().current, 4);
    assert_eq!(info.tpm().current, 3_400);
}

#[tokio::test(start_paused = true)]
async fn test_generate_retries_twice_then_records_once() {
    let log = CallLog::default();
    let (executor, _clock) = executor(open_tier());
    let runner = BatchRunner::new(
        ScriptedClient::with_log(&log)
            .with_tokens("b", 8_000)
            .failing("generate_content", 2),
        MemorySink::default(),
        executor,
    );

    let started = Instant::now();
    let summary = runner.run(&inputs(&["b"])).await;
    let elapsed = started.elapsed();

    assert!(summary.all_succeeded());
    assert_eq!(log.count("generate_content"), 3);
    assert!(elapsed >= Duration::from_secs(6));
    assert!(elapsed < Duration::from_secs(7));

    // Only the successful generate call consumed tokens.
    let info = runner.executor().limiter().check_limits();
    assert_eq!(info.tpm().current, 8_000);
    assert_eq!(info.rpm().current, 4);

    let attempts = summary.jobs()[0].attempts();
    assert!(attempts.contains(&("generate_content".to_string(), 3)));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_job_fails_and_batch_continues() {
    let log = CallLog::default();
    let (executor, _clock) = executor(open_tier());
    let runner = BatchRunner::new(ScriptedClient::with_log(&log), MemorySink::default(), executor);

    let summary = runner
        .run(&inputs(&["first", "unreachable-annex", "third"]))
        .await;

    assert_eq!(*summary.total(), 3);
    assert_eq!(*summary.succeeded(), 2);
    assert_eq!(summary.exit_code(), 1);
    assert_eq!(log.count("upload:unreachable-annex"), 3);
    assert_eq!(summary.failures().len(), 1);
    assert_eq!(
        summary.failures()[0].0,
        PathBuf::from("scans/unreachable-annex.pdf")
    );

    let failed = &summary.jobs()[1];
    assert_eq!(*failed.state(), JobState::Failed);
    assert!(matches!(
        failed.error().as_ref().unwrap().kind(),
        JobErrorKind::RetriesExhausted { attempts: 3, .. }
    ));

    // The failed upload never reached delete, and later jobs ran normally.
    assert_eq!(log.count("delete"), 2);
    assert_eq!(*summary.jobs()[2].state(), JobState::Done);
}

#[tokio::test(start_paused = true)]
async fn test_delete_failure_does_not_fail_the_job() {
    let log = CallLog::default();
    let sink = MemorySink::default();
    let (executor, _clock) = executor(open_tier());
    let runner = BatchRunner::new(
        ScriptedClient::with_log(&log).broken("delete"),
        sink.clone(),
        executor,
    );

    let summary = runner.run(&inputs(&["a"])).await;

    assert!(summary.all_succeeded());
    assert_eq!(log.count("delete"), 1);
    assert_eq!(sink.results().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_token_ceiling_skips_extraction_but_still_deletes() {
    let log = CallLog::default();
    let sink = MemorySink::default();
    let (executor, _clock) = executor(open_tier());
    let runner = BatchRunner::new(
        ScriptedClient::with_log(&log)
            .with_tokens("huge", 900_000)
            .with_tokens("small", 4_000),
        sink.clone(),
        executor,
    )
    .with_max_document_tokens(Some(500_000));

    let summary = runner.run(&inputs(&["huge", "small"])).await;

    assert_eq!(*summary.succeeded(), 1);
    assert_eq!(log.count("generate_content"), 1);
    assert_eq!(log.count("delete"), 2);
    assert!(matches!(
        summary.jobs()[0].error().as_ref().unwrap().kind(),
        JobErrorKind::TokenCeilingExceeded {
            tokens: 900_000,
            ceiling: 500_000
        }
    ));
    assert_eq!(sink.results().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_permanent_step_failure_is_not_retried() {
    let log = CallLog::default();
    let (executor, _clock) = executor(open_tier());
    let runner = BatchRunner::new(
        ScriptedClient::with_log(&log).broken("count_tokens"),
        MemorySink::default(),
        executor,
    );

    let summary = runner.run(&inputs(&["a"])).await;

    assert_eq!(summary.exit_code(), 1);
    assert_eq!(log.count("count_tokens"), 1);
    assert!(matches!(
        summary.jobs()[0].error().as_ref().unwrap().kind(),
        JobErrorKind::Permanent { .. }
    ));
    assert_eq!(*summary.jobs()[0].state(), JobState::Failed);
    assert_eq!(log.count("delete"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_generate_leaves_upload_in_place() {
    let log = CallLog::default();
    let sink = MemorySink::default();
    let (executor, _clock) = executor(open_tier());
    let runner = BatchRunner::new(
        ScriptedClient::with_log(&log).failing("generate_content", 99),
        sink.clone(),
        executor,
    );

    let summary = runner.run(&inputs(&["stubborn"])).await;

    assert_eq!(summary.exit_code(), 1);
    assert_eq!(log.count("generate_content"), 3);
    assert_eq!(log.count("delete"), 0);
    assert!(sink.results().is_empty());

    let job = &summary.jobs()[0];
    assert_eq!(*job.state(), JobState::Failed);
    assert!(job.output().is_none());
    assert!(matches!(
        job.error().as_ref().unwrap().kind(),
        JobErrorKind::RetriesExhausted { attempts: 3, .. }
    ));

    // Upload and count only; failed generate attempts are not recorded.
    let info = runner.executor().limiter().check_limits();
    assert_eq!(info.rpm().current, 2);
}

#[tokio::test(start_paused = true)]
async fn test_incomplete_result_is_persisted_as_invalid() {
    let log = CallLog::default();
    let sink = MemorySink::default();
    let (executor, _clock) = executor(open_tier());
    let urls: UrlMap = [(
        "thin.pdf".to_string(),
        "https://records.test/thin.pdf".to_string(),
    )]
    .into_iter()
    .collect();
    let runner = BatchRunner::new(ScriptedClient::with_log(&log), sink.clone(), executor)
        .with_validator(ResultValidator::new(["bylawNumber", "bylawYear", "bylawType"]))
        .with_url_map(urls);

    let summary = runner.run(&inputs(&["thin"])).await;

    // Invalid results still count as processed and the upload is removed.
    assert!(summary.all_succeeded());
    assert_eq!(*summary.invalid(), 1);
    assert_eq!(log.count("delete"), 1);
    assert_eq!(
        *summary.jobs()[0].result_status(),
        Some(ResultStatus::Invalid)
    );

    let results = sink.results();
    assert_eq!(results[0].2, ResultStatus::Invalid);
    assert!(results[0].1.get("urlOriginalDocument").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_valid_result_gets_source_url() {
    let log = CallLog::default();
    let sink = MemorySink::default();
    let (executor, _clock) = executor(open_tier());
    let urls: UrlMap = [(
        "bylaw-12.pdf".to_string(),
        "https://records.test/bylaw-12.pdf".to_string(),
    )]
    .into_iter()
    .collect();
    let runner = BatchRunner::new(ScriptedClient::with_log(&log), sink.clone(), executor)
        .with_validator(ResultValidator::new(["bylawNumber", "tokens"]))
        .with_url_map(urls);

    let summary = runner.run(&inputs(&["bylaw-12", "unlisted"])).await;

    assert!(summary.all_succeeded());
    assert_eq!(*summary.invalid(), 0);

    let results = sink.results();
    assert_eq!(
        results[0].1["urlOriginalDocument"],
        "https://records.test/bylaw-12.pdf"
    );
    assert!(results[1].1.get("urlOriginalDocument").is_none());
    assert_eq!(results[1].2, ResultStatus::Valid);
}

#[tokio::test(start_paused = true)]
async fn test_jobs_share_one_limiter() {
    let log = CallLog::default();
    let (executor, clock) = executor(TierConfig::new("Tight", Some(4), None, None));
    let runner = BatchRunner::new(ScriptedClient::with_log(&log), MemorySink::default(), executor);

    let summary = runner.run(&inputs(&["one", "two"])).await;

    assert!(summary.all_succeeded());
    // Four calls per job against a limit of four per minute: the second job
    // had to wait for the first job's calls to leave the window.
    assert!(!clock.sleeps().is_empty());
    assert!(clock.total_slept() >= Duration::from_secs(60));
}
