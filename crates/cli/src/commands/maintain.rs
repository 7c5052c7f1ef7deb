use chrono::Utc;
use clap::{Args, ValueEnum};
use tracing::{info, warn};

use donkeyops_core::maintenance::{
    run_check, MaintenanceAction, MaintenanceCheck, MaintenanceReport, DEFAULT_DAYS_UNTIL_STALE,
};
use donkeyops_developer_platforms::github::GitHubProvider;

use crate::auth::{create_client, AuthArgs};
use crate::errors::CliError;

#[cfg(test)]
#[path = "maintain_tests.rs"]
mod tests;

/// Largest accepted `--days-until-stale`, one hundred years.
const MAX_DAYS_UNTIL_STALE: i64 = 36_500;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckKind {
    /// Mark inactive pull requests and close them if they stay inactive
    Stale,

    /// Mark pull requests with failing CI and close them if nothing changes
    FailingTests,

    /// Mark pull requests with merge conflicts
    NeedsRebase,
}

/// Arguments for the maintain command
#[derive(Args, Debug)]
pub struct MaintainArgs {
    /// The check to run
    #[arg(short, long, value_enum)]
    pub action: CheckKind,

    /// Repository in `owner/name` form
    #[arg(short, long)]
    pub repo: String,

    /// Days without activity before a pull request counts as stale
    #[arg(long, default_value_t = DEFAULT_DAYS_UNTIL_STALE)]
    pub days_until_stale: i64,

    #[command(flatten)]
    pub auth: AuthArgs,
}

impl MaintainArgs {
    fn check(&self) -> Result<MaintenanceCheck, CliError> {
        match self.action {
            CheckKind::Stale => {
                if self.days_until_stale < 1 {
                    return Err(CliError::InvalidArguments(
                        "--days-until-stale must be at least 1".to_string(),
                    ));
                }
                if self.days_until_stale > MAX_DAYS_UNTIL_STALE {
                    return Err(CliError::InvalidArguments(format!(
                        "--days-until-stale must be at most {}",
                        MAX_DAYS_UNTIL_STALE
                    )));
                }
                Ok(MaintenanceCheck::Stale {
                    days_until_stale: self.days_until_stale,
                })
            }
            CheckKind::FailingTests => Ok(MaintenanceCheck::FailingTests),
            CheckKind::NeedsRebase => Ok(MaintenanceCheck::NeedsRebase),
        }
    }
}

/// Runs one maintenance sweep over a repository.
///
/// # Errors
///
/// Fails when the arguments are invalid, authentication fails, the open pull
/// requests cannot be listed, or any pull request could not be updated.
pub async fn execute(args: MaintainArgs) -> Result<(), CliError> {
    let (owner, repo) = split_repository(&args.repo)?;
    let check = args.check()?;

    let credentials = args.auth.credentials()?;
    let client = create_client(&credentials, owner, repo).await?;
    let provider = GitHubProvider::new(client);

    let report = run_check(&provider, owner, repo, check, Utc::now()).await?;
    for line in summarize(&report) {
        println!("{}", line);
    }

    if !report.failed.is_empty() {
        warn!(
            repository_owner = owner,
            repository = repo,
            failed = ?report.failed,
            "Some pull requests could not be processed"
        );
        return Err(CliError::NetworkError(format!(
            "{} pull request(s) could not be processed",
            report.failed.len()
        )));
    }

    info!(
        repository_owner = owner,
        repository = repo,
        check = check.name(),
        "Maintenance check completed"
    );
    Ok(())
}

fn split_repository(full_name: &str) -> Result<(&str, &str), CliError> {
    match full_name.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok((owner, repo))
        }
        _ => Err(CliError::InvalidArguments(format!(
            "Expected a repository in 'owner/name' form, got '{}'",
            full_name
        ))),
    }
}

fn summarize(report: &MaintenanceReport) -> Vec<String> {
    let mut lines = vec![format!("Examined {} open pull request(s)", report.examined)];
    lines.extend(report.actions.iter().map(|(number, action)| {
        let what = match action {
            MaintenanceAction::Close { .. } => "closed".to_string(),
            MaintenanceAction::Flag { label, .. } => format!("labeled '{}'", label),
            MaintenanceAction::Nothing => "unchanged".to_string(),
            MaintenanceAction::RemoveLabel { label } => format!("removed label '{}'", label),
            MaintenanceAction::Skip { reason } => format!("skipped ({})", reason),
        };
        format!("#{}: {}", number, what)
    }));
    lines.extend(report.failed.iter().map(|n| format!("#{}: failed", n)));
    lines
}
