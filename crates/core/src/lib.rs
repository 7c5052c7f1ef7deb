//! # DonkeyOps Core
//!
//! The logic of the DonkeyOps GitHub bot:
//!
//! - Commit messages of pull requests are checked against the repository's
//!   commit conventions, and authors are told which commits need rewording
//! - Pull requests are labeled with the components their title or commits name
//! - `/donkeyops ...` slash commands in comments are carried out, including
//!   code reviews, summaries and answers produced by a local LLM
//! - Open pull requests can be swept for staleness, failing tests and merge
//!   conflicts (see [`maintenance`])
//!
//! Everything that talks to GitHub goes through the traits of
//! `donkeyops_developer_platforms`, and everything that talks to the LLM goes
//! through [`llm::LlmClient`].
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use donkeyops_core::{llm::{LlmSettings, OllamaClient}, webhook::WebhookEvent, DonkeyOps};
//! use donkeyops_developer_platforms::github::{create_token_client, GitHubProvider};
//! use anyhow::Result;
//!
//! async fn handle(event_name: &str, body: &[u8]) -> Result<()> {
//!     let client = create_token_client("ghp_...")?;
//!     let llm = OllamaClient::new(LlmSettings::default())?;
//!     let bot = DonkeyOps::new(GitHubProvider::new(client), llm);
//!
//!     let event = WebhookEvent::from_delivery(event_name, body)?;
//!     let outcome = bot.handle_event(&event).await;
//!     println!("{:?}", outcome);
//!
//!     Ok(())
//! }
//! ```

use tracing::{debug, error, info, instrument, warn};

use donkeyops_developer_platforms::models::PullRequest;
use donkeyops_developer_platforms::{ConfigFetcher, PullRequestProvider};

pub mod checks;
use checks::commits::build_commit_report;

pub mod commands;
use commands::{parse_slash_command, Command};

pub mod config;
use config::{preferred_reference, resolve_repository_config, RuleSet};

pub mod dispatch;

pub mod errors;
use errors::DonkeyOpsError;

pub mod labels;

pub mod llm;
use llm::LlmClient;

pub mod maintenance;

pub mod webhook;
use webhook::{CommentEvent, PullRequestEvent, WebhookEvent};

#[cfg(test)]
mod test_mocks;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// What [`DonkeyOps::handle_event`] did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// A slash command was found and carried out.
    CommandExecuted(Command),

    /// The event was not one DonkeyOps acts on.
    Ignored(String),

    /// The comment or issue body held no slash command.
    NoCommand,

    PullRequestProcessed {
        /// Whether a comment listing invalid commits was posted.
        commit_report_posted: bool,

        /// Labels added to the pull request.
        labels_added: Vec<String>,
    },
}

/// The DonkeyOps bot.
///
/// Holds the GitHub provider and the LLM client and reacts to webhook events.
/// It keeps no state between events.
#[derive(Debug)]
pub struct DonkeyOps<P, L>
where
    P: PullRequestProvider + ConfigFetcher,
    L: LlmClient,
{
    provider: P,
    llm: L,
}

impl<P, L> DonkeyOps<P, L>
where
    P: PullRequestProvider + ConfigFetcher,
    L: LlmClient,
{
    /// Validates the commits of a pull request and comments when some are invalid.
    ///
    /// # Returns
    ///
    /// `true` when a comment was posted.
    ///
    /// # Errors
    ///
    /// Fails when the commits cannot be listed or the comment cannot be posted.
    #[instrument(skip(self, rules))]
    pub async fn check_commits(
        &self,
        repo_owner: &str,
        repo_name: &str,
        pr_number: u64,
        rules: &RuleSet,
    ) -> Result<bool, DonkeyOpsError> {
        let commits = self
            .provider
            .list_commits(repo_owner, repo_name, pr_number)
            .await?;

        debug!(
            repository_owner = repo_owner,
            repository = repo_name,
            pull_request = pr_number,
            count = commits.len(),
            "Validating commit messages"
        );

        let Some(report) = build_commit_report(&commits, rules) else {
            info!(
                repository_owner = repo_owner,
                repository = repo_name,
                pull_request = pr_number,
                "All commit messages are valid"
            );
            return Ok(false);
        };

        self.provider
            .add_comment(repo_owner, repo_name, pr_number, &report)
            .await?;

        info!(
            repository_owner = repo_owner,
            repository = repo_name,
            pull_request = pr_number,
            "Commented on invalid commit messages"
        );

        Ok(true)
    }

    /// Finds the slash command in `body` and carries it out.
    ///
    /// Returns the command, or `None` if the text holds no command.
    #[instrument(skip(self, body))]
    pub async fn handle_command(
        &self,
        repo_owner: &str,
        repo_name: &str,
        issue_number: u64,
        body: &str,
    ) -> Option<Command> {
        let command: Command = parse_slash_command(body)?.into();

        dispatch::dispatch_command(
            &self.provider,
            &self.llm,
            repo_owner,
            repo_name,
            issue_number,
            &command,
        )
        .await;

        Some(command)
    }

    /// Reacts to one webhook event.
    ///
    /// Never fails. Problems are logged, or reported to users as comments where
    /// they caused a command to fail.
    #[instrument(skip(self, event), fields(event = event.name()))]
    pub async fn handle_event(&self, event: &WebhookEvent) -> EventOutcome {
        match event {
            WebhookEvent::PullRequest(e) => self.handle_pull_request_event(e).await,
            WebhookEvent::IssueComment(e) => {
                if e.action != "created" {
                    return EventOutcome::Ignored(format!("issue_comment.{}", e.action));
                }
                self.handle_comment_event(e).await
            }
            WebhookEvent::Issues(e) => {
                if e.action != "opened" {
                    return EventOutcome::Ignored(format!("issues.{}", e.action));
                }
                self.handle_comment_event(e).await
            }
            WebhookEvent::Other(name) => EventOutcome::Ignored(name.clone()),
        }
    }

    async fn handle_comment_event(&self, event: &CommentEvent) -> EventOutcome {
        if event.sender_is_bot {
            debug!(
                repository_owner = event.repository.owner.as_str(),
                repository = event.repository.name.as_str(),
                pull_request = event.issue_number,
                "Ignoring text written by a bot"
            );
            return EventOutcome::Ignored("sender is a bot".to_string());
        }

        match self
            .handle_command(
                &event.repository.owner,
                &event.repository.name,
                event.issue_number,
                &event.body,
            )
            .await
        {
            Some(command) => EventOutcome::CommandExecuted(command),
            None => EventOutcome::NoCommand,
        }
    }

    async fn handle_pull_request_event(&self, event: &PullRequestEvent) -> EventOutcome {
        let action = event.action.as_str();
        let run_commit_check = matches!(action, "opened" | "synchronize");
        let run_labeling = matches!(action, "opened" | "edited");
        if !run_commit_check && !run_labeling {
            return EventOutcome::Ignored(format!("pull_request.{}", action));
        }

        let owner = event.repository.owner.as_str();
        let repo = event.repository.name.as_str();
        let pr = &event.pull_request;

        let reference = preferred_reference(
            Some(pr.head_sha.as_str()),
            Some(pr.base_sha.as_str()),
            event.head_ref.as_deref(),
        );
        let rules = resolve_repository_config(&self.provider, owner, repo, reference)
            .await
            .rule_set();

        let mut commit_report_posted = false;
        if run_commit_check && rules.commit_check_enabled {
            match self.check_commits(owner, repo, pr.number, &rules).await {
                Ok(posted) => commit_report_posted = posted,
                Err(e) => error!(
                    repository_owner = owner,
                    repository = repo,
                    pull_request = pr.number,
                    error = e.to_string(),
                    "Commit message check failed"
                ),
            }
        }

        let mut labels_added = Vec::new();
        if run_labeling && rules.pr_labeling_enabled {
            match self.label_pull_request(owner, repo, pr, &rules).await {
                Ok(added) => labels_added = added,
                Err(e) => error!(
                    repository_owner = owner,
                    repository = repo,
                    pull_request = pr.number,
                    error = e.to_string(),
                    "Labeling failed"
                ),
            }
        }

        EventOutcome::PullRequestProcessed {
            commit_report_posted,
            labels_added,
        }
    }

    /// Labels a pull request with the components its title names, or failing
    /// that, the components its commits declare.
    ///
    /// # Returns
    ///
    /// The labels that were added.
    ///
    /// # Errors
    ///
    /// Fails only when the commits are needed and cannot be listed. Failures to
    /// read or write labels are logged.
    #[instrument(skip(self, pr, rules), fields(pull_request = pr.number))]
    pub async fn label_pull_request(
        &self,
        repo_owner: &str,
        repo_name: &str,
        pr: &PullRequest,
        rules: &RuleSet,
    ) -> Result<Vec<String>, DonkeyOpsError> {
        let mut detected = labels::detect_from_title(&pr.title, &rules.components);
        if detected.is_empty() {
            let commits = self
                .provider
                .list_commits(repo_owner, repo_name, pr.number)
                .await?;
            detected = labels::detect_from_commits(&commits, &rules.components);
        }

        if detected.is_empty() {
            warn!(
                repository_owner = repo_owner,
                repository = repo_name,
                pull_request = pr.number,
                "No component labels found for pull request"
            );
            return Ok(Vec::new());
        }

        Ok(labels::apply_labels(&self.provider, repo_owner, repo_name, pr.number, &detected).await)
    }

    /// Creates a new `DonkeyOps` instance.
    pub fn new(provider: P, llm: L) -> Self {
        Self { provider, llm }
    }
}
