//! # Webhook Events
//!
//! Decodes GitHub webhook deliveries into the events DonkeyOps reacts to.
//! Only the fields DonkeyOps uses are read; everything else in the payload is
//! ignored.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use donkeyops_developer_platforms::models::{Label, PullRequest};

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Failed to decode the '{0}' webhook payload: {1}")]
    InvalidPayload(String, String),
}

#[derive(Debug, Deserialize)]
struct RawComment {
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCommentPayload {
    action: String,
    repository: RawRepository,
    #[serde(default)]
    installation: Option<RawInstallation>,
    issue: RawIssue,
    comment: RawComment,
    #[serde(default)]
    sender: Option<RawSender>,
}

#[derive(Debug, Deserialize)]
struct RawGitRef {
    sha: String,
    #[serde(rename = "ref", default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawInstallation {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    number: u64,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawIssuePayload {
    action: String,
    repository: RawRepository,
    #[serde(default)]
    installation: Option<RawInstallation>,
    issue: RawIssue,
    #[serde(default)]
    sender: Option<RawSender>,
}

#[derive(Debug, Deserialize)]
struct RawLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    number: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    draft: Option<bool>,
    #[serde(default)]
    body: Option<String>,
    head: RawGitRef,
    base: RawGitRef,
    #[serde(default)]
    labels: Vec<RawLabel>,
    #[serde(default)]
    mergeable: Option<bool>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RawPullRequestPayload {
    action: String,
    repository: RawRepository,
    #[serde(default)]
    installation: Option<RawInstallation>,
    pull_request: RawPullRequest,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    name: String,
    owner: RawOwner,
}

#[derive(Debug, Deserialize)]
struct RawSender {
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

impl RawSender {
    fn is_bot(sender: &Option<RawSender>) -> bool {
        sender
            .as_ref()
            .and_then(|s| s.kind.as_deref())
            .is_some_and(|k| k == "Bot")
    }
}

/// Owner and name of the repository an event belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryCoordinates {
    pub owner: String,
    pub name: String,
}

impl From<RawRepository> for RepositoryCoordinates {
    fn from(r: RawRepository) -> Self {
        Self {
            owner: r.owner.login,
            name: r.name,
        }
    }
}

/// A pull request was opened, edited, synchronized, ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestEvent {
    pub action: String,
    pub repository: RepositoryCoordinates,
    pub installation_id: Option<u64>,
    pub pull_request: PullRequest,

    /// Branch the pull request was opened from.
    pub head_ref: Option<String>,
}

/// Text written by a user that may contain a slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentEvent {
    pub action: String,
    pub repository: RepositoryCoordinates,
    pub installation_id: Option<u64>,
    pub issue_number: u64,
    pub body: String,
    pub sender_is_bot: bool,
}

/// A decoded webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// `issue_comment`: the comment body may hold a command.
    IssueComment(CommentEvent),

    /// `issues`: the issue body may hold a command.
    Issues(CommentEvent),

    /// `pull_request`.
    PullRequest(PullRequestEvent),

    /// Any other event, by name.
    Other(String),
}

impl WebhookEvent {
    /// Decodes a delivery from its `X-GitHub-Event` name and JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::InvalidPayload`] when a known event has a body that
    /// lacks the fields DonkeyOps needs. Unknown events are never decoded and so
    /// never fail.
    pub fn from_delivery(event_name: &str, payload: &[u8]) -> Result<Self, WebhookError> {
        let invalid = |e: serde_json::Error| {
            WebhookError::InvalidPayload(event_name.to_string(), e.to_string())
        };

        match event_name {
            "pull_request" => {
                let raw: RawPullRequestPayload = serde_json::from_slice(payload).map_err(invalid)?;
                let pr = raw.pull_request;
                Ok(WebhookEvent::PullRequest(PullRequestEvent {
                    action: raw.action,
                    repository: raw.repository.into(),
                    installation_id: raw.installation.map(|i| i.id),
                    head_ref: pr.head.name,
                    pull_request: PullRequest {
                        number: pr.number,
                        title: pr.title.unwrap_or_default(),
                        draft: pr.draft.unwrap_or_default(),
                        body: pr.body,
                        head_sha: pr.head.sha,
                        base_sha: pr.base.sha,
                        labels: pr
                            .labels
                            .into_iter()
                            .map(|l| Label { name: l.name })
                            .collect(),
                        mergeable: pr.mergeable,
                        updated_at: pr.updated_at,
                    },
                }))
            }
            "issue_comment" => {
                let raw: RawCommentPayload = serde_json::from_slice(payload).map_err(invalid)?;
                Ok(WebhookEvent::IssueComment(CommentEvent {
                    action: raw.action,
                    sender_is_bot: RawSender::is_bot(&raw.sender),
                    repository: raw.repository.into(),
                    installation_id: raw.installation.map(|i| i.id),
                    issue_number: raw.issue.number,
                    body: raw.comment.body.unwrap_or_default(),
                }))
            }
            "issues" => {
                let raw: RawIssuePayload = serde_json::from_slice(payload).map_err(invalid)?;
                Ok(WebhookEvent::Issues(CommentEvent {
                    action: raw.action,
                    sender_is_bot: RawSender::is_bot(&raw.sender),
                    repository: raw.repository.into(),
                    installation_id: raw.installation.map(|i| i.id),
                    issue_number: raw.issue.number,
                    body: raw.issue.body.unwrap_or_default(),
                }))
            }
            other => Ok(WebhookEvent::Other(other.to_string())),
        }
    }

    /// The GitHub App installation the delivery was sent for.
    pub fn installation_id(&self) -> Option<u64> {
        match self {
            WebhookEvent::IssueComment(e) | WebhookEvent::Issues(e) => e.installation_id,
            WebhookEvent::PullRequest(e) => e.installation_id,
            WebhookEvent::Other(_) => None,
        }
    }

    /// The `X-GitHub-Event` name of the event.
    pub fn name(&self) -> &str {
        match self {
            WebhookEvent::IssueComment(_) => "issue_comment",
            WebhookEvent::Issues(_) => "issues",
            WebhookEvent::PullRequest(_) => "pull_request",
            WebhookEvent::Other(name) => name,
        }
    }

    pub fn repository(&self) -> Option<&RepositoryCoordinates> {
        match self {
            WebhookEvent::IssueComment(e) | WebhookEvent::Issues(e) => Some(&e.repository),
            WebhookEvent::PullRequest(e) => Some(&e.repository),
            WebhookEvent::Other(_) => None,
        }
    }
}
