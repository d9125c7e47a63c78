//! bylaw-extract CLI binary.
//!
//! This binary provides command-line access to the extraction pipeline:
//! - Extract structured data from a PDF or a directory of PDFs
//! - Print the resolved quota configuration

use bylaw_extract::cli::{Cli, execute};
use bylaw_extract::init_logging;
use clap::Parser;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env before parsing so GEMINI_API_KEY can come from it
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match execute(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
