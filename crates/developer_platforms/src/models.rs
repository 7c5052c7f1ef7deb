//! # Models
//!
//! This module contains the data models DonkeyOps exchanges with GitHub.
//!
//! They are deliberately small: each carries only the fields the bot reads,
//! so that test doubles can construct them without filling in the long tail
//! of GitHub API attributes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;

/// Number of characters of a commit SHA shown to users.
pub const SHORT_SHA_LENGTH: usize = 7;

/// A run of a GitHub check (CI job) against a commit.
///
/// # Examples
///
/// ```
/// use donkeyops_developer_platforms::models::CheckRun;
///
/// let run = CheckRun {
///     name: "unit-tests".to_string(),
///     conclusion: Some("failure".to_string()),
/// };
/// assert!(run.is_failure());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRun {
    /// The name of the check
    pub name: String,

    /// The conclusion of the run, absent while the run is in progress
    pub conclusion: Option<String>,
}

impl CheckRun {
    /// Returns `true` if the run concluded with a failure.
    pub fn is_failure(&self) -> bool {
        self.conclusion.as_deref() == Some("failure")
    }
}

/// Represents a comment on an issue or pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// The unique identifier of the comment
    pub id: u64,

    /// The text content of the comment
    pub body: String,
}

/// One commit of a pull request.
///
/// # Examples
///
/// ```
/// use donkeyops_developer_platforms::models::Commit;
///
/// let commit = Commit {
///     sha: "0123456789abcdef".to_string(),
///     message: "feat(Core): add thing #12".to_string(),
/// };
/// assert_eq!(commit.short_sha(), "0123456");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// The full commit hash
    pub sha: String,

    /// The full commit message, including any body
    pub message: String,
}

impl Commit {
    /// Returns the abbreviated hash used when reporting on a commit.
    pub fn short_sha(&self) -> &str {
        match self.sha.char_indices().nth(SHORT_SHA_LENGTH) {
            Some((index, _)) => &self.sha[..index],
            None => &self.sha,
        }
    }
}

/// A GitHub App installation, as referenced by webhook payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installation {
    /// The installation ID
    pub id: u64,
}

/// Target state for an issue or pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

/// Represents a label on an issue or pull request.
///
/// Label names are case sensitive as stored by GitHub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// The name of the label
    pub name: String,
}

/// Represents a pull request from GitHub.
///
/// # Examples
///
/// ```
/// use donkeyops_developer_platforms::models::PullRequest;
///
/// let pr = PullRequest {
///     number: 123,
///     title: "Add Core & Internals support".to_string(),
///     draft: false,
///     body: None,
///     head_sha: "abc".to_string(),
///     base_sha: "def".to_string(),
///     labels: Vec::new(),
///     mergeable: None,
///     updated_at: None,
/// };
/// assert!(!pr.has_label("stale"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// The pull request number
    pub number: u64,

    /// The title of the pull request
    pub title: String,

    /// Whether the pull request is a draft
    #[serde(default)]
    pub draft: bool,

    /// The description/body of the pull request, if any
    pub body: Option<String>,

    /// The SHA of the head commit
    pub head_sha: String,

    /// The SHA of the base commit
    pub base_sha: String,

    /// The labels currently applied to the pull request
    #[serde(default)]
    pub labels: Vec<Label>,

    /// Whether GitHub considers the pull request mergeable. `None` while
    /// GitHub has not computed it yet.
    pub mergeable: Option<bool>,

    /// The last time the pull request saw activity
    pub updated_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    /// Returns `true` if a label with exactly this name is applied.
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l.name == name)
    }
}

/// A repository, as referenced by webhook payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// The repository name without the owner
    pub name: String,

    /// The `owner/name` form of the repository name
    pub full_name: String,
}

impl Repository {
    /// Returns the owner part of `full_name`, if it has the `owner/name` shape.
    pub fn owner(&self) -> Option<&str> {
        match self.full_name.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() => Some(owner),
            _ => None,
        }
    }
}

/// Users and teams whose review has been requested but not yet given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedReviewers {
    /// Logins of the requested users
    pub users: Vec<String>,

    /// Slugs of the requested teams
    pub teams: Vec<String>,
}

impl RequestedReviewers {
    /// Returns `true` if no review is outstanding.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.teams.is_empty()
    }
}

/// A submitted pull request review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    /// The review ID
    pub id: u64,

    /// The review state as reported by GitHub, e.g. `APPROVED`
    pub state: String,
}

impl Review {
    /// Returns `true` if this review approved the pull request.
    pub fn is_approval(&self) -> bool {
        self.state == "APPROVED"
    }
}

/// The verdict submitted with a new pull request review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewEvent {
    Approve,
    Comment,
    RequestChanges,
}

impl ReviewEvent {
    /// The value GitHub expects in the `event` field of a review submission.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewEvent::Approve => "APPROVE",
            ReviewEvent::Comment => "COMMENT",
            ReviewEvent::RequestChanges => "REQUEST_CHANGES",
        }
    }
}

/// A GitHub user or app identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// The user ID
    pub id: u64,

    /// The login name
    pub login: String,
}
