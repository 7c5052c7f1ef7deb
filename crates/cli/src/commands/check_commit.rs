use clap::Args;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use donkeyops_core::checks::commits::validate_commit_message;
use donkeyops_core::config::{RepositoryConfig, RuleSet, CONFIG_FILE_PATH};

use crate::errors::CliError;

#[cfg(test)]
#[path = "check_commit_tests.rs"]
mod tests;

/// Arguments for the check-commit command
#[derive(Args, Debug)]
pub struct CheckCommitArgs {
    /// The commit message to validate
    pub message: String,

    /// Repository configuration file. Defaults to `.donkeyops.yml` in the
    /// working directory, if it exists.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Validates a commit message the same way the bot validates pull request commits.
///
/// # Errors
///
/// Returns [`CliError::ValidationFailed`] with the warning text when the message
/// is invalid, and [`CliError::ConfigError`] when the configuration file cannot
/// be read.
pub fn execute(args: CheckCommitArgs) -> Result<(), CliError> {
    let rules = load_rules(args.config.as_deref())?;
    check_message(&args.message, &rules)?;

    println!("Commit message is valid.");
    Ok(())
}

fn check_message(message: &str, rules: &RuleSet) -> Result<(), CliError> {
    let outcome = validate_commit_message(
        message,
        &rules.types,
        &rules.components,
        &rules.commit_format,
    );

    match outcome.warning {
        None => Ok(()),
        Some(warning) => {
            info!("Commit message is invalid");
            Err(CliError::ValidationFailed(warning))
        }
    }
}

fn load_rules(path: Option<&Path>) -> Result<RuleSet, CliError> {
    let config = match path {
        Some(p) => RepositoryConfig::from_file(p)?,
        None if Path::new(CONFIG_FILE_PATH).exists() => {
            debug!(path = CONFIG_FILE_PATH, "Using repository configuration");
            RepositoryConfig::from_file(CONFIG_FILE_PATH)?
        }
        None => RepositoryConfig::default(),
    };

    Ok(config.rule_set())
}
