//! SQL Server schema to CSV export tool.
//!
//! Connects once, exports every base table of the configured schemas to
//! `{output}/{schema}/{table}.csv`, and disconnects.
//!
//! # Security Guarantees
//! - Read-only database operations only
//! - No credentials stored or logged
//! - A `.env` file never overrides variables that are already set

use clap::Parser;
use dbexport::{Cli, commands, exit_code_for};
use dbexport_core::init_logging;
use std::process::ExitCode;
use tracing::{debug, error};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Must run before parsing so env fallbacks see .env values
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.global.verbose, cli.global.quiet, cli.global.log_file.as_deref()) {
        eprintln!("Error: {}", e);
        return ExitCode::from(dbexport::EXIT_FATAL);
    }
    if let Ok(path) = &dotenv {
        debug!("Loaded environment from {}", path.display());
    }

    let result = commands::dispatch(cli.into_command()).await;
    if let Err(e) = &result {
        error!("{}", e);
        eprintln!("Error: {}", e);
    }

    ExitCode::from(exit_code_for(&result))
}
