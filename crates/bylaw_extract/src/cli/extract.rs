//! Batch extraction command handler.

use crate::cli::ExtractArgs;
use bylaw_batch::{
    BatchRunner, BatchSummary, ExtractionPrompt, ExtractorConfig, GeminiFilesClient, JsonFileSink,
    ResultValidator, UrlMap, collect_errored_inputs, collect_inputs,
};
use bylaw_error::BylawResult;
use bylaw_rate_limit::{RateLimitedExecutor, RateLimiter, SystemClock};
use std::sync::Arc;
use tracing::{info, instrument};

/// Run one batch with a validated configuration.
///
/// Setup problems (bad settings, unreadable prompt or URL manifest, missing
/// API key, no input documents) are returned as errors. Per-document failures
/// are reported in the summary instead.
///
/// With `--error` only documents that have an error file in the output
/// directory are processed. Finding none is not an error.
#[instrument(skip_all, fields(input = %args.input.display()))]
pub async fn run_extract(args: &ExtractArgs, config: &ExtractorConfig) -> BylawResult<BatchSummary> {
    let tier = config.validate()?;
    let limiter = RateLimiter::new(&tier, Arc::new(SystemClock))?
        .with_rpd_wait(config.rate_limit.rpd_wait);
    info!(
        tier = %tier.name,
        rpd_wait = %config.rate_limit.rpd_wait,
        "Rate limiter ready"
    );
    let executor = RateLimitedExecutor::new(Arc::new(limiter), config.retry.policy());

    let urls = match &args.csv_file {
        Some(path) => UrlMap::from_csv(path)?,
        None => UrlMap::default(),
    };

    let prompt = ExtractionPrompt::from_files(&args.prompt_file, args.schema_file.as_deref())?;
    let validator = ResultValidator::from_schema(prompt.schema());
    let client = GeminiFilesClient::new(
        args.api_key.clone().unwrap_or_default(),
        config.gemini.clone(),
        prompt,
    )?;

    let inputs = if args.error {
        let inputs = collect_errored_inputs(&args.input, &args.output)?;
        if inputs.is_empty() {
            info!("No errored files found to reprocess");
        }
        inputs
    } else {
        collect_inputs(&args.input)?
    };

    let sink = JsonFileSink::new(&args.output).with_reprocessing(args.error);
    let runner = BatchRunner::new(client, sink, executor)
        .with_max_document_tokens(config.batch.max_document_tokens)
        .with_validator(validator)
        .with_url_map(urls);

    Ok(runner.run(&inputs).await)
}
