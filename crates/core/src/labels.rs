//! # Labels
//!
//! Derives component labels for a pull request and applies them.
//!
//! Labels come from the title first: every allowed component whose name appears
//! in the title is a label. Only when the title names no component are the
//! commit messages consulted, using the component each commit declares.

use donkeyops_developer_platforms::models::Commit;
use donkeyops_developer_platforms::PullRequestProvider;
use tracing::{debug, error, info, instrument, warn};

use crate::checks::commits::{find_case_insensitive, parse_commit_message};

#[cfg(test)]
#[path = "labels_tests.rs"]
mod tests;

/// Labels named by the commit messages.
///
/// Each commit contributes the component it declares, if that component is
/// allowed. Whether the commit type is allowed does not matter here. Labels use
/// the casing of `allowed_components` and appear in that order.
pub fn detect_from_commits(commits: &[Commit], allowed_components: &[String]) -> Vec<String> {
    let declared: Vec<&str> = commits
        .iter()
        .filter_map(|c| parse_commit_message(&c.message))
        .filter_map(|p| find_case_insensitive(allowed_components, p.component))
        .collect();

    allowed_components
        .iter()
        .filter(|c| declared.contains(&c.as_str()))
        .cloned()
        .collect()
}

/// Labels named by a pull request title.
///
/// A component is a label when its name appears anywhere in the title, ignoring
/// case. Labels appear in the order of `allowed_components`.
///
/// # Examples
///
/// ```
/// use donkeyops_core::labels::detect_from_title;
///
/// let components = vec!["Core".to_string(), "Core & Internals".to_string(), "WebUI".to_string()];
/// let labels = detect_from_title("Add Core & Internals support", &components);
///
/// assert_eq!(labels, vec!["Core".to_string(), "Core & Internals".to_string()]);
/// ```
pub fn detect_from_title(title: &str, allowed_components: &[String]) -> Vec<String> {
    let title = title.to_lowercase();
    allowed_components
        .iter()
        .filter(|c| title.contains(&c.to_lowercase()))
        .cloned()
        .collect()
}

/// Labels for a pull request: from the title, or from the commits if the title
/// yields none.
pub fn detect_labels(title: &str, commits: &[Commit], allowed_components: &[String]) -> Vec<String> {
    let from_title = detect_from_title(title, allowed_components);
    if !from_title.is_empty() {
        return from_title;
    }

    detect_from_commits(commits, allowed_components)
}

/// Adds the labels the issue or pull request does not have yet.
///
/// Existing labels are read first and only missing ones are sent, in a single
/// call. Failures are logged and swallowed so that other work for the same
/// event can carry on.
///
/// # Returns
///
/// The labels that were added.
#[instrument(skip(provider))]
pub async fn apply_labels<P: PullRequestProvider + ?Sized>(
    provider: &P,
    repo_owner: &str,
    repo_name: &str,
    issue_number: u64,
    labels: &[String],
) -> Vec<String> {
    if labels.is_empty() {
        debug!(
            repository_owner = repo_owner,
            repository = repo_name,
            pull_request = issue_number,
            "No labels to apply"
        );
        return Vec::new();
    }

    let existing = match provider
        .list_labels(repo_owner, repo_name, issue_number)
        .await
    {
        Ok(l) => l,
        Err(e) => {
            error!(
                repository_owner = repo_owner,
                repository = repo_name,
                pull_request = issue_number,
                error = e.to_string(),
                "Failed to read the existing labels"
            );
            return Vec::new();
        }
    };

    let mut missing: Vec<String> = Vec::new();
    for label in labels {
        if !existing.iter().any(|l| &l.name == label) && !missing.contains(label) {
            missing.push(label.clone());
        }
    }

    if missing.is_empty() {
        debug!(
            repository_owner = repo_owner,
            repository = repo_name,
            pull_request = issue_number,
            "All labels are already present"
        );
        return Vec::new();
    }

    match provider
        .add_labels(repo_owner, repo_name, issue_number, &missing)
        .await
    {
        Ok(()) => {
            info!(
                repository_owner = repo_owner,
                repository = repo_name,
                pull_request = issue_number,
                labels = ?missing,
                "Added labels"
            );
            missing
        }
        Err(e) => {
            warn!(
                repository_owner = repo_owner,
                repository = repo_name,
                pull_request = issue_number,
                error = e.to_string(),
                "Failed to add labels"
            );
            Vec::new()
        }
    }
}
