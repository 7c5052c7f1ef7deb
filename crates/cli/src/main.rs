//! # DonkeyOps CLI
//!
//! Command-line tools for the DonkeyOps bot.
//!
//! # Commands
//!
//! - `maintain` - Run one repository maintenance sweep (stale, failing-tests, needs-rebase).
//!   Meant to be run on a schedule, for example from a CI cron job.
//! - `check-commit` - Validate a commit message against a `.donkeyops.yml`
//!
//! # Examples
//!
//! ```bash
//! # Mark and close stale pull requests
//! donkeyops maintain --action stale --repo rucio/rucio --token <token>
//!
//! # Check a commit message before pushing
//! donkeyops check-commit "feat(Core): add replica expiry #1234"
//! ```
//!
//! A `.env` file in the working directory is read on start-up.

#![deny(missing_docs)]

use clap::{Parser, Subcommand};
use std::process::{ExitCode, Termination};
use tracing::{debug, error};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// GitHub credentials and client creation.
mod auth;

/// Command implementations for the CLI.
mod commands;

/// Error types specific to the CLI.
mod errors;

use commands::{check_commit::CheckCommitArgs, maintain::MaintainArgs};
use errors::CliError;

/// Command-line interface for DonkeyOps.
#[derive(Parser)]
#[command(name = "donkeyops", author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// The subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run a maintenance check over the open pull requests of a repository
    Maintain(MaintainArgs),

    /// Validate a commit message
    CheckCommit(CheckCommitArgs),
}

/// Installs the log subscriber. `DONKEYOPS_LOG` takes precedence over `--verbose`.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_env("DONKEYOPS_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Maintain(args) => commands::maintain::execute(args).await.inspect_err(|e| {
            error!("Error running maintenance check: {}", e);
        }),
        Commands::CheckCommit(args) => commands::check_commit::execute(args).inspect_err(|e| {
            error!("Error checking commit message: {}", e);
        }),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv_loaded = dotenv::dotenv().is_ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);
    if dotenv_loaded {
        debug!("Loaded environment from .env");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            e.report()
        }
    }
}
