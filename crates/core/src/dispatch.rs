//! # Command Dispatch
//!
//! Carries out a parsed [`Command`] against an issue or pull request.
//!
//! Every command either completes or ends with a comment telling the user what
//! went wrong. Errors never escape [`dispatch_command`].

use indoc::formatdoc;
use tracing::{debug, error, info, instrument, warn};

use donkeyops_developer_platforms::models::{IssueState, PullRequest, ReviewEvent};
use donkeyops_developer_platforms::PullRequestProvider;

use crate::commands::Command;
use crate::errors::DonkeyOpsError;
use crate::llm::{self, LlmClient, PullRequestContext, ReviewKind};

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;

/// Body of the review submitted by `/donkeyops approve`.
pub const APPROVAL_BODY: &str = "Approved via DonkeyOps.";

/// Lists every command. Posted for unknown commands.
pub fn help_message() -> String {
    formatdoc!(
        "
        Available DonkeyOps commands:

        - `/donkeyops label <label>`: add a label
        - `/donkeyops unlabel <label>`: remove a label
        - `/donkeyops close`: close this issue or pull request
        - `/donkeyops assign <user>`: assign a user
        - `/donkeyops unassign <user>`: unassign a user
        - `/donkeyops approve`: approve this pull request
        - `/donkeyops review`: post an AI code review of this pull request
        - `/donkeyops summary`: post an AI summary of this pull request
        - `/donkeyops ask <question>`: ask the AI a question about this pull request"
    )
}

fn llm_failure_message(command: &Command, port: u16) -> String {
    let action = match command {
        Command::Summary => "Failed to generate summary",
        Command::Ask { .. } => "Failed to answer the question",
        _ => "Failed to perform review",
    };

    format!(
        "{}. Make sure the Ollama service is running locally on port {}.",
        action, port
    )
}

fn pull_request_only_message(command: &str) -> String {
    format!(
        "The `/donkeyops {}` command is only available for pull requests.",
        command
    )
}

fn usage_message(command: &str, argument: &str) -> String {
    format!("Usage: `/donkeyops {} <{}>`", command, argument)
}

/// Runs a command on an issue or pull request.
///
/// Whether the target is a pull request is decided by asking the provider for a
/// pull request with `issue_number`. Commands that need a pull request answer
/// with an explanation when there is none.
#[instrument(skip(provider, llm))]
pub async fn dispatch_command<P, L>(
    provider: &P,
    llm: &L,
    repo_owner: &str,
    repo_name: &str,
    issue_number: u64,
    command: &Command,
) where
    P: PullRequestProvider + ?Sized,
    L: LlmClient + ?Sized,
{
    info!(
        repository_owner = repo_owner,
        repository = repo_name,
        pull_request = issue_number,
        command = command.name(),
        "Executing command"
    );

    let result = execute(provider, llm, repo_owner, repo_name, issue_number, command).await;
    if let Err(e) = result {
        error!(
            repository_owner = repo_owner,
            repository = repo_name,
            pull_request = issue_number,
            command = command.name(),
            error = e.to_string(),
            "Command failed"
        );

        let message = match e {
            DonkeyOpsError::LlmError(_) => llm_failure_message(command, llm.port()),
            _ => format!("Failed to execute command `{}`.", command.name()),
        };
        post_comment(provider, repo_owner, repo_name, issue_number, &message).await;
    }
}

async fn execute<P, L>(
    provider: &P,
    llm: &L,
    repo_owner: &str,
    repo_name: &str,
    issue_number: u64,
    command: &Command,
) -> Result<(), DonkeyOpsError>
where
    P: PullRequestProvider + ?Sized,
    L: LlmClient + ?Sized,
{
    match command {
        Command::Label { label: Some(label) } => {
            provider
                .add_labels(repo_owner, repo_name, issue_number, &[label.clone()])
                .await?;
        }
        Command::Unlabel { label: Some(label) } => {
            provider
                .remove_label(repo_owner, repo_name, issue_number, label)
                .await?;
        }
        Command::Label { label: None } | Command::Unlabel { label: None } => {
            let message = usage_message(command.name(), "label");
            try_comment(provider, repo_owner, repo_name, issue_number, &message).await?;
        }
        Command::Close => {
            provider
                .update_issue_state(repo_owner, repo_name, issue_number, IssueState::Closed)
                .await?;
        }
        Command::Assign { user: Some(user) } => {
            provider
                .add_assignees(repo_owner, repo_name, issue_number, &[user.clone()])
                .await?;
        }
        Command::Unassign { user: Some(user) } => {
            provider
                .remove_assignees(repo_owner, repo_name, issue_number, &[user.clone()])
                .await?;
        }
        Command::Assign { user: None } | Command::Unassign { user: None } => {
            let message = usage_message(command.name(), "username");
            try_comment(provider, repo_owner, repo_name, issue_number, &message).await?;
        }
        Command::Approve => {
            provider
                .create_review(
                    repo_owner,
                    repo_name,
                    issue_number,
                    ReviewEvent::Approve,
                    APPROVAL_BODY,
                )
                .await?;
        }
        Command::Review => {
            let Some(pr) =
                probe_pull_request(provider, repo_owner, repo_name, issue_number).await
            else {
                let message = pull_request_only_message(command.name());
                return try_comment(provider, repo_owner, repo_name, issue_number, &message).await;
            };
            respond_with_llm(provider, llm, repo_owner, repo_name, &pr, ReviewKind::Review)
                .await?;
        }
        Command::Summary => {
            let Some(pr) =
                probe_pull_request(provider, repo_owner, repo_name, issue_number).await
            else {
                let message = pull_request_only_message(command.name());
                return try_comment(provider, repo_owner, repo_name, issue_number, &message).await;
            };
            respond_with_llm(provider, llm, repo_owner, repo_name, &pr, ReviewKind::Summary)
                .await?;
        }
        Command::Ask { question } => {
            let Some(pr) =
                probe_pull_request(provider, repo_owner, repo_name, issue_number).await
            else {
                let message = pull_request_only_message(command.name());
                return try_comment(provider, repo_owner, repo_name, issue_number, &message).await;
            };
            let Some(question) = question else {
                let message = formatdoc!(
                    "
                    Please provide a question, for example:

                    `/donkeyops ask What does this change do?`"
                );
                return try_comment(provider, repo_owner, repo_name, issue_number, &message).await;
            };
            let kind = ReviewKind::Ask {
                question: question.clone(),
            };
            respond_with_llm(provider, llm, repo_owner, repo_name, &pr, kind).await?;
        }
        Command::Unknown { name } => {
            debug!(command = name.as_str(), "Unknown command. Posting help.");
            try_comment(provider, repo_owner, repo_name, issue_number, &help_message()).await?;
        }
    }

    Ok(())
}

/// Comments and logs failures. For messages that are themselves error reports.
async fn post_comment<P: PullRequestProvider + ?Sized>(
    provider: &P,
    repo_owner: &str,
    repo_name: &str,
    issue_number: u64,
    message: &str,
) {
    if let Err(e) = provider
        .add_comment(repo_owner, repo_name, issue_number, message)
        .await
    {
        error!(
            repository_owner = repo_owner,
            repository = repo_name,
            pull_request = issue_number,
            error = e.to_string(),
            "Failed to post comment"
        );
    }
}

async fn probe_pull_request<P: PullRequestProvider + ?Sized>(
    provider: &P,
    repo_owner: &str,
    repo_name: &str,
    issue_number: u64,
) -> Option<PullRequest> {
    match provider
        .get_pull_request(repo_owner, repo_name, issue_number)
        .await
    {
        Ok(pr) => Some(pr),
        Err(e) => {
            debug!(
                repository_owner = repo_owner,
                repository = repo_name,
                pull_request = issue_number,
                error = e.to_string(),
                "Target is not a pull request"
            );
            None
        }
    }
}

async fn respond_with_llm<P, L>(
    provider: &P,
    llm: &L,
    repo_owner: &str,
    repo_name: &str,
    pr: &PullRequest,
    kind: ReviewKind,
) -> Result<(), DonkeyOpsError>
where
    P: PullRequestProvider + ?Sized,
    L: LlmClient + ?Sized,
{
    let diff = provider
        .get_pull_request_diff(repo_owner, repo_name, pr.number)
        .await?;

    let context = PullRequestContext {
        repo_owner,
        repo_name,
        title: &pr.title,
        number: pr.number,
        diff: &diff,
    };

    let answer = llm::generate(llm, &kind, &context).await.inspect_err(|e| {
        warn!(
            repository_owner = repo_owner,
            repository = repo_name,
            pull_request = pr.number,
            error = e.to_string(),
            "LLM request failed"
        );
    })?;

    let body = match &kind {
        ReviewKind::Review => format!("## DonkeyOps Review\n\n{}", answer),
        ReviewKind::Summary => format!("## DonkeyOps Summary\n\n{}", answer),
        ReviewKind::Ask { question } => {
            format!("## DonkeyOps Answer\n\n> {}\n\n{}", question, answer)
        }
    };

    try_comment(provider, repo_owner, repo_name, pr.number, &body).await
}

async fn try_comment<P: PullRequestProvider + ?Sized>(
    provider: &P,
    repo_owner: &str,
    repo_name: &str,
    issue_number: u64,
    message: &str,
) -> Result<(), DonkeyOpsError> {
    provider
        .add_comment(repo_owner, repo_name, issue_number, message)
        .await
        .map_err(DonkeyOpsError::from)
}
