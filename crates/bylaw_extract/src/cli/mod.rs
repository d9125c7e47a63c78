//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the
//! `bylaw-extract` binary.

mod commands;
mod extract;
mod limits;

pub use commands::{Cli, Commands, ExtractArgs, QuotaArgs};
pub use extract::run_extract;
pub use limits::limits_report;

use bylaw_batch::ExtractorConfig;
use bylaw_error::BylawResult;
use tracing::error;

/// Execute a parsed command line and return the process exit status.
///
/// Configuration is loaded from the usual layers plus `--config`, then the
/// command's flags are applied on top.
pub async fn execute(cli: Cli) -> BylawResult<u8> {
    let mut config = ExtractorConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Extract(args) => {
            args.apply(&mut config);
            let summary = run_extract(&args, &config).await?;
            for (input, reason) in summary.failures() {
                error!("Failed: {} ({})", input.display(), reason);
            }
            Ok(summary.exit_code())
        }

        Commands::Limits { quota } => {
            quota.apply(&mut config);
            print!("{}", limits_report(&config)?);
            Ok(0)
        }
    }
}
