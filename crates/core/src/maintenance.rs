//! # Repository Maintenance
//!
//! Sweeps over the open pull requests of a repository and nudges the ones that
//! need attention:
//!
//! - **stale**: no activity for a while. Marked first, closed if nothing happens.
//! - **failing-tests**: CI fails and nobody is working on it. Marked first, then closed.
//! - **needs-rebase**: merge conflicts with the target branch.
//!
//! A sweep runs once per call. Scheduling is up to the caller. Pull requests
//! labeled `no-bot` are left alone by every check.
//!
//! The decisions are pure functions of a pull request snapshot and the current
//! time. [`run_check`] gathers the inputs and carries out the decisions.

use chrono::{DateTime, TimeDelta, Utc};
use indoc::formatdoc;
use tracing::{debug, error, info, instrument, warn};

use donkeyops_developer_platforms::models::{IssueState, PullRequest};
use donkeyops_developer_platforms::PullRequestProvider;

use crate::errors::DonkeyOpsError;

#[cfg(test)]
#[path = "maintenance_tests.rs"]
mod tests;

pub const DEFAULT_DAYS_UNTIL_STALE: i64 = 14;

pub const FAILING_TESTS_CLOSE_DAYS: i64 = 3;

pub const FAILING_TESTS_LABEL: &str = "failing-tests";

pub const FAILING_TESTS_WARN_DAYS: i64 = 1;

pub const NEEDS_REBASE_LABEL: &str = "needs-rebase";

/// Pull requests with this label are never touched by maintenance checks.
pub const NO_BOT_LABEL: &str = "no-bot";

/// Days a pull request may stay labeled `stale` before it is closed.
pub const STALE_CLOSE_DAYS: i64 = 7;

pub const STALE_LABEL: &str = "stale";

/// One maintenance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceCheck {
    FailingTests,
    NeedsRebase,
    Stale { days_until_stale: i64 },
}

impl MaintenanceCheck {
    pub fn name(&self) -> &'static str {
        match self {
            MaintenanceCheck::FailingTests => "failing-tests",
            MaintenanceCheck::NeedsRebase => "needs-rebase",
            MaintenanceCheck::Stale { .. } => "stale",
        }
    }
}

/// What a check wants done to one pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaintenanceAction {
    /// Comment, then close.
    Close { comment: String },

    /// Comment, then add a label.
    Flag { comment: String, label: &'static str },

    /// Leave the pull request as it is.
    Nothing,

    RemoveLabel { label: &'static str },

    /// Excluded from the check, with the reason.
    Skip { reason: String },
}

/// Review activity on a pull request, as far as the stale check cares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewState {
    pub awaiting_review: bool,
    pub approved: bool,
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub examined: usize,

    /// Actions carried out, by pull request number. `Nothing` is not recorded.
    pub actions: Vec<(u64, MaintenanceAction)>,

    /// Pull requests for which carrying out the action failed.
    pub failed: Vec<u64>,
}

fn excluded(pr: &PullRequest) -> Option<MaintenanceAction> {
    if pr.has_label(NO_BOT_LABEL) {
        return Some(MaintenanceAction::Skip {
            reason: format!("labeled '{}'", NO_BOT_LABEL),
        });
    }
    None
}

fn inactive_for(pr: &PullRequest, now: DateTime<Utc>) -> Option<TimeDelta> {
    pr.updated_at.map(|updated| now - updated)
}

/// Decides what the failing-tests check does with a pull request.
///
/// `has_failing_tests` only matters for pull requests that are not labeled yet.
pub fn decide_failing_tests(
    pr: &PullRequest,
    now: DateTime<Utc>,
    has_failing_tests: bool,
) -> MaintenanceAction {
    if let Some(skip) = excluded(pr) {
        return skip;
    }
    let Some(inactive) = inactive_for(pr, now) else {
        return MaintenanceAction::Skip {
            reason: "no update time".to_string(),
        };
    };
    let inactive_days = inactive.num_days();

    if pr.has_label(FAILING_TESTS_LABEL) {
        if inactive_days >= FAILING_TESTS_CLOSE_DAYS {
            return MaintenanceAction::Close {
                comment: formatdoc!(
                    "
                    Closing this pull request because its CI checks have been failing and it has
                    been inactive for more than {days} days. Feel free to reopen it once the tests
                    are fixed.",
                    days = FAILING_TESTS_CLOSE_DAYS,
                ),
            };
        }
        return MaintenanceAction::Nothing;
    }

    if inactive_days >= FAILING_TESTS_WARN_DAYS && has_failing_tests {
        return MaintenanceAction::Flag {
            comment: formatdoc!(
                "
                This pull request has failing CI checks and has been inactive for
                {warn} day(s). It will be closed automatically in {close} days if the tests are
                not fixed or there is no further activity.",
                warn = FAILING_TESTS_WARN_DAYS,
                close = FAILING_TESTS_CLOSE_DAYS,
            ),
            label: FAILING_TESTS_LABEL,
        };
    }

    MaintenanceAction::Nothing
}

/// Decides what the needs-rebase check does with a pull request.
///
/// Relies on `mergeable`, which GitHub only computes on request. `None` means
/// it is not known yet and the pull request is skipped until the next sweep.
pub fn decide_needs_rebase(pr: &PullRequest) -> MaintenanceAction {
    if let Some(skip) = excluded(pr) {
        return skip;
    }

    let labeled = pr.has_label(NEEDS_REBASE_LABEL);
    match pr.mergeable {
        None => MaintenanceAction::Skip {
            reason: "mergeability not yet determined".to_string(),
        },
        Some(false) if !labeled => MaintenanceAction::Flag {
            comment: formatdoc!(
                "
                This pull request has merge conflicts with its target branch. Please rebase it
                on top of the latest target branch so that it can be merged."
            ),
            label: NEEDS_REBASE_LABEL,
        },
        Some(true) if labeled => MaintenanceAction::RemoveLabel {
            label: NEEDS_REBASE_LABEL,
        },
        Some(_) => MaintenanceAction::Nothing,
    }
}

/// Decides what the stale check does with a pull request.
///
/// `review` only matters for pull requests that are about to be marked stale.
pub fn decide_stale(
    pr: &PullRequest,
    now: DateTime<Utc>,
    days_until_stale: i64,
    review: ReviewState,
) -> MaintenanceAction {
    if let Some(skip) = excluded(pr) {
        return skip;
    }
    let Some(inactive) = inactive_for(pr, now) else {
        return MaintenanceAction::Skip {
            reason: "no update time".to_string(),
        };
    };

    if pr.has_label(STALE_LABEL) {
        if inactive > TimeDelta::days(STALE_CLOSE_DAYS) {
            return MaintenanceAction::Close {
                comment: formatdoc!(
                    "
                    Closing this pull request due to prolonged inactivity. Feel free to reopen it
                    if you would like to continue working on it."
                ),
            };
        }
        return MaintenanceAction::Nothing;
    }

    if !is_stale_candidate(pr, now, days_until_stale) {
        return MaintenanceAction::Nothing;
    }
    if review.awaiting_review {
        return MaintenanceAction::Skip {
            reason: "awaiting reviewer response".to_string(),
        };
    }
    if review.approved {
        return MaintenanceAction::Skip {
            reason: "has an approved review".to_string(),
        };
    }

    MaintenanceAction::Flag {
        comment: formatdoc!(
            "
            This pull request has had no activity for {days} days and has no pending review
            requests. It has been marked as **stale** and will be closed in {close} days unless
            there is new activity or a reviewer is assigned.",
            days = days_until_stale,
            close = STALE_CLOSE_DAYS,
        ),
        label: STALE_LABEL,
    }
}

/// Whether an unlabeled pull request has been inactive long enough to become stale.
///
/// A threshold too large to represent as a duration is never reached.
pub fn is_stale_candidate(pr: &PullRequest, now: DateTime<Utc>, days_until_stale: i64) -> bool {
    let Some(threshold) = TimeDelta::try_days(days_until_stale) else {
        return false;
    };
    !pr.has_label(STALE_LABEL) && inactive_for(pr, now).is_some_and(|i| i > threshold)
}

async fn apply_action<P: PullRequestProvider + ?Sized>(
    provider: &P,
    repo_owner: &str,
    repo_name: &str,
    pr_number: u64,
    action: &MaintenanceAction,
) -> Result<(), DonkeyOpsError> {
    match action {
        MaintenanceAction::Close { comment } => {
            provider
                .add_comment(repo_owner, repo_name, pr_number, comment)
                .await?;
            provider
                .update_issue_state(repo_owner, repo_name, pr_number, IssueState::Closed)
                .await?;
        }
        MaintenanceAction::Flag { comment, label } => {
            provider
                .add_comment(repo_owner, repo_name, pr_number, comment)
                .await?;
            provider
                .add_labels(repo_owner, repo_name, pr_number, &[label.to_string()])
                .await?;
        }
        MaintenanceAction::RemoveLabel { label } => {
            provider
                .remove_label(repo_owner, repo_name, pr_number, label)
                .await?;
        }
        MaintenanceAction::Nothing | MaintenanceAction::Skip { .. } => {}
    }

    Ok(())
}

async fn has_failing_tests<P: PullRequestProvider + ?Sized>(
    provider: &P,
    repo_owner: &str,
    repo_name: &str,
    pr: &PullRequest,
) -> bool {
    match provider
        .list_check_runs(repo_owner, repo_name, &pr.head_sha)
        .await
    {
        Ok(runs) => runs.iter().any(|r| r.is_failure()),
        Err(e) => {
            warn!(
                repository_owner = repo_owner,
                repository = repo_name,
                pull_request = pr.number,
                error = e.to_string(),
                "Could not fetch check runs. Treating the pull request as not failing."
            );
            false
        }
    }
}

async fn review_state<P: PullRequestProvider + ?Sized>(
    provider: &P,
    repo_owner: &str,
    repo_name: &str,
    pr_number: u64,
) -> Result<ReviewState, DonkeyOpsError> {
    let requested = provider
        .list_requested_reviewers(repo_owner, repo_name, pr_number)
        .await?;
    let awaiting_review = !requested.is_empty();

    let approved = if awaiting_review {
        false
    } else {
        provider
            .list_reviews(repo_owner, repo_name, pr_number)
            .await?
            .iter()
            .any(|r| r.is_approval())
    };

    Ok(ReviewState {
        awaiting_review,
        approved,
    })
}

async fn decide<P: PullRequestProvider + ?Sized>(
    provider: &P,
    repo_owner: &str,
    repo_name: &str,
    check: MaintenanceCheck,
    pr: &PullRequest,
    now: DateTime<Utc>,
) -> Result<MaintenanceAction, DonkeyOpsError> {
    if let Some(skip) = excluded(pr) {
        return Ok(skip);
    }

    let action = match check {
        MaintenanceCheck::Stale { days_until_stale } => {
            let review = if is_stale_candidate(pr, now, days_until_stale) {
                review_state(provider, repo_owner, repo_name, pr.number).await?
            } else {
                ReviewState::default()
            };
            decide_stale(pr, now, days_until_stale, review)
        }
        MaintenanceCheck::FailingTests => {
            let needs_check_runs = !pr.has_label(FAILING_TESTS_LABEL)
                && inactive_for(pr, now)
                    .is_some_and(|i| i.num_days() >= FAILING_TESTS_WARN_DAYS);
            let failing =
                needs_check_runs && has_failing_tests(provider, repo_owner, repo_name, pr).await;
            decide_failing_tests(pr, now, failing)
        }
        MaintenanceCheck::NeedsRebase => {
            // Listed pull requests do not carry mergeability.
            let detailed = provider
                .get_pull_request(repo_owner, repo_name, pr.number)
                .await?;
            decide_needs_rebase(&detailed)
        }
    };

    Ok(action)
}

/// Runs one check over every open pull request of a repository.
///
/// A failure for one pull request is logged and the sweep moves on to the next.
///
/// # Errors
///
/// Only fails when the open pull requests cannot be listed.
#[instrument(skip(provider))]
pub async fn run_check<P: PullRequestProvider + ?Sized>(
    provider: &P,
    repo_owner: &str,
    repo_name: &str,
    check: MaintenanceCheck,
    now: DateTime<Utc>,
) -> Result<MaintenanceReport, DonkeyOpsError> {
    info!(
        repository_owner = repo_owner,
        repository = repo_name,
        check = check.name(),
        "Running maintenance check"
    );

    let pulls = provider
        .list_open_pull_requests(repo_owner, repo_name)
        .await?;

    let mut report = MaintenanceReport {
        examined: pulls.len(),
        ..MaintenanceReport::default()
    };

    for pr in &pulls {
        let action = match decide(provider, repo_owner, repo_name, check, pr, now).await {
            Ok(a) => a,
            Err(e) => {
                error!(
                    repository_owner = repo_owner,
                    repository = repo_name,
                    pull_request = pr.number,
                    error = e.to_string(),
                    "Failed to evaluate pull request"
                );
                report.failed.push(pr.number);
                continue;
            }
        };

        match &action {
            MaintenanceAction::Nothing => continue,
            MaintenanceAction::Skip { reason } => {
                debug!(
                    repository_owner = repo_owner,
                    repository = repo_name,
                    pull_request = pr.number,
                    reason = reason.as_str(),
                    "Skipping pull request"
                );
            }
            _ => {
                if let Err(e) =
                    apply_action(provider, repo_owner, repo_name, pr.number, &action).await
                {
                    error!(
                        repository_owner = repo_owner,
                        repository = repo_name,
                        pull_request = pr.number,
                        error = e.to_string(),
                        "Failed to update pull request"
                    );
                    report.failed.push(pr.number);
                    continue;
                }
                info!(
                    repository_owner = repo_owner,
                    repository = repo_name,
                    pull_request = pr.number,
                    action = ?action,
                    "Updated pull request"
                );
            }
        }

        report.actions.push((pr.number, action));
    }

    Ok(report)
}
