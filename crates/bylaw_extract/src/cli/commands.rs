//! CLI command definitions.

use bylaw_batch::ExtractorConfig;
use bylaw_rate_limit::{RpdWaitPolicy, tiers::GeminiTier};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// bylaw-extract - Rate-limited structured data extraction from by-law PDFs
#[derive(Parser, Debug)]
#[command(name = "bylaw-extract")]
#[command(about = "Extract structured data from by-law PDFs with the Gemini API", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file layered over the defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Also append logs to this file
    #[arg(short, long, global = true)]
    pub log_file: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload, extract and persist every PDF in a file or directory
    Extract(ExtractArgs),

    /// Print the resolved quota and retry settings
    Limits {
        /// Quota and retry overrides
        #[command(flatten)]
        quota: QuotaArgs,
    },
}

/// Arguments for the `extract` command.
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// PDF file, or directory of PDF files
    #[arg(short, long)]
    pub input: PathBuf,

    /// Directory for the JSON results
    #[arg(short, long)]
    pub output: PathBuf,

    /// Gemini API key
    #[arg(short = 'k', long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model identifier
    #[arg(short, long)]
    pub model: Option<String>,

    /// File holding the extraction prompt
    #[arg(long)]
    pub prompt_file: PathBuf,

    /// JSON schema the response must follow
    #[arg(long)]
    pub schema_file: Option<PathBuf>,

    /// Skip documents counted above this many tokens
    #[arg(long)]
    pub max_document_tokens: Option<u64>,

    /// CSV of `file name,url` rows; matching URLs are added to valid results
    #[arg(short, long)]
    pub csv_file: Option<PathBuf>,

    /// Only re-run inputs that have a `<stem>-error.json` in the output directory
    #[arg(long)]
    pub error: bool,

    /// Quota and retry overrides
    #[command(flatten)]
    pub quota: QuotaArgs,
}

impl ExtractArgs {
    /// Apply these flags over a loaded configuration.
    pub fn apply(&self, config: &mut ExtractorConfig) {
        self.quota.apply(config);
        if let Some(model) = &self.model {
            config.gemini.model = model.clone();
        }
        if self.max_document_tokens.is_some() {
            config.batch.max_document_tokens = self.max_document_tokens;
        }
    }
}

/// Quota and retry flags shared by every command.
#[derive(Args, Debug, Default, Clone)]
pub struct QuotaArgs {
    /// Quota preset (free, pay-as-you-go)
    #[arg(long)]
    pub tier: Option<GeminiTier>,

    /// Requests per minute
    #[arg(long)]
    pub rpm: Option<u32>,

    /// Tokens per minute
    #[arg(long)]
    pub tpm: Option<u64>,

    /// Requests per day
    #[arg(long)]
    pub rpd: Option<u32>,

    /// How to sleep on the daily quota (chunked, until-midnight)
    #[arg(long)]
    pub rpd_wait: Option<RpdWaitPolicy>,

    /// Attempts per call step, including the first
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Base backoff delay in seconds
    #[arg(long)]
    pub retry_delay: Option<u64>,
}

impl QuotaArgs {
    /// Apply these flags over a loaded configuration.
    pub fn apply(&self, config: &mut ExtractorConfig) {
        let rate_limit = &mut config.rate_limit;
        if self.tier.is_some() {
            rate_limit.tier = self.tier;
        }
        if self.rpm.is_some() {
            rate_limit.rpm = self.rpm;
        }
        if self.tpm.is_some() {
            rate_limit.tpm = self.tpm;
        }
        if self.rpd.is_some() {
            rate_limit.rpd = self.rpd;
        }
        if let Some(policy) = self.rpd_wait {
            rate_limit.rpd_wait = policy;
        }
        if let Some(max_retries) = self.max_retries {
            config.retry.max_retries = max_retries;
        }
        if let Some(delay) = self.retry_delay {
            config.retry.retry_delay_secs = delay;
        }
    }
}
