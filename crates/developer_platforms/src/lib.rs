//! # DonkeyOps Developer Platforms
//!
//! The contract between DonkeyOps and the code-hosting platform it serves.
//!
//! The core logic never talks to GitHub directly. It receives an implementation
//! of [`PullRequestProvider`] (and [`ConfigFetcher`] where repository
//! configuration is needed), which keeps every check and command testable
//! without a live transport. [`github::GitHubProvider`] is the production
//! implementation.

use async_trait::async_trait;

pub mod errors;

pub mod github;

pub mod models;
use errors::Error;
use models::{
    CheckRun, Commit, IssueState, Label, PullRequest, RequestedReviewers, Review, ReviewEvent,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// Trait to fetch configuration files from remote repositories.
#[async_trait]
pub trait ConfigFetcher: Sync + Send {
    /// Fetch the content of a configuration file at the given path.
    ///
    /// When `reference` is `None` the repository's default branch is used.
    /// Returns `Ok(Some(content))` if found, `Ok(None)` if not found, or `Err`
    /// on any other failure. The content is returned decoded as UTF-8 text.
    async fn fetch_config(
        &self,
        repo_owner: &str,
        repo_name: &str,
        path: &str,
        reference: Option<&str>,
    ) -> Result<Option<String>, Error>;
}

/// Trait for the issue and pull request operations DonkeyOps performs.
///
/// On GitHub pull requests are issues, so every method taking an `issue_number`
/// works for both. Methods taking a `pr_number` only make sense for pull
/// requests and fail with [`Error::NotFound`] for plain issues.
///
/// # Example Implementation
///
/// ```rust,no_run
/// use async_trait::async_trait;
/// use donkeyops_developer_platforms::{errors::Error, models::*, PullRequestProvider};
///
/// struct ReadOnlyProvider;
///
/// #[async_trait]
/// impl PullRequestProvider for ReadOnlyProvider {
///     async fn get_pull_request(&self, _: &str, _: &str, pr_number: u64) -> Result<PullRequest, Error> {
///         Err(Error::NotFound(format!("pull request {}", pr_number)))
///     }
///     # async fn list_open_pull_requests(&self, _: &str, _: &str) -> Result<Vec<PullRequest>, Error> { unimplemented!() }
///     # async fn list_commits(&self, _: &str, _: &str, _: u64) -> Result<Vec<Commit>, Error> { unimplemented!() }
///     # async fn get_pull_request_diff(&self, _: &str, _: &str, _: u64) -> Result<String, Error> { unimplemented!() }
///     # async fn add_comment(&self, _: &str, _: &str, _: u64, _: &str) -> Result<(), Error> { unimplemented!() }
///     # async fn list_labels(&self, _: &str, _: &str, _: u64) -> Result<Vec<Label>, Error> { unimplemented!() }
///     # async fn add_labels(&self, _: &str, _: &str, _: u64, _: &[String]) -> Result<(), Error> { unimplemented!() }
///     # async fn remove_label(&self, _: &str, _: &str, _: u64, _: &str) -> Result<(), Error> { unimplemented!() }
///     # async fn add_assignees(&self, _: &str, _: &str, _: u64, _: &[String]) -> Result<(), Error> { unimplemented!() }
///     # async fn remove_assignees(&self, _: &str, _: &str, _: u64, _: &[String]) -> Result<(), Error> { unimplemented!() }
///     # async fn update_issue_state(&self, _: &str, _: &str, _: u64, _: IssueState) -> Result<(), Error> { unimplemented!() }
///     # async fn create_review(&self, _: &str, _: &str, _: u64, _: ReviewEvent, _: &str) -> Result<(), Error> { unimplemented!() }
///     # async fn list_reviews(&self, _: &str, _: &str, _: u64) -> Result<Vec<Review>, Error> { unimplemented!() }
///     # async fn list_requested_reviewers(&self, _: &str, _: &str, _: u64) -> Result<RequestedReviewers, Error> { unimplemented!() }
///     # async fn list_check_runs(&self, _: &str, _: &str, _: &str) -> Result<Vec<CheckRun>, Error> { unimplemented!() }
/// }
/// ```
#[async_trait]
pub trait PullRequestProvider: Sync + Send {
    /// Retrieves a pull request.
    ///
    /// Fails with [`Error::NotFound`] when `pr_number` refers to a plain issue.
    /// DonkeyOps relies on this to decide whether a comment was made on a
    /// pull request.
    async fn get_pull_request(
        &self,
        repo_owner: &str,
        repo_name: &str,
        pr_number: u64,
    ) -> Result<PullRequest, Error>;

    /// Lists all open pull requests, least recently updated first.
    async fn list_open_pull_requests(
        &self,
        repo_owner: &str,
        repo_name: &str,
    ) -> Result<Vec<PullRequest>, Error>;

    /// Lists the commits of a pull request in the order GitHub returns them.
    async fn list_commits(
        &self,
        repo_owner: &str,
        repo_name: &str,
        pr_number: u64,
    ) -> Result<Vec<Commit>, Error>;

    /// Gets the changes of a pull request as a unified diff.
    async fn get_pull_request_diff(
        &self,
        repo_owner: &str,
        repo_name: &str,
        pr_number: u64,
    ) -> Result<String, Error>;

    /// Adds a comment to an issue or pull request.
    ///
    /// # Arguments
    ///
    /// * `repo_owner` - The owner of the repository
    /// * `repo_name` - The name of the repository
    /// * `issue_number` - The issue or pull request number
    /// * `comment` - The comment text to add. Supports Markdown
    async fn add_comment(
        &self,
        repo_owner: &str,
        repo_name: &str,
        issue_number: u64,
        comment: &str,
    ) -> Result<(), Error>;

    /// Lists the labels applied to an issue or pull request.
    async fn list_labels(
        &self,
        repo_owner: &str,
        repo_name: &str,
        issue_number: u64,
    ) -> Result<Vec<Label>, Error>;

    /// Adds labels to an issue or pull request in a single call.
    async fn add_labels(
        &self,
        repo_owner: &str,
        repo_name: &str,
        issue_number: u64,
        labels: &[String],
    ) -> Result<(), Error>;

    /// Removes a label from an issue or pull request.
    async fn remove_label(
        &self,
        repo_owner: &str,
        repo_name: &str,
        issue_number: u64,
        label: &str,
    ) -> Result<(), Error>;

    /// Adds assignees to an issue or pull request.
    async fn add_assignees(
        &self,
        repo_owner: &str,
        repo_name: &str,
        issue_number: u64,
        assignees: &[String],
    ) -> Result<(), Error>;

    /// Removes assignees from an issue or pull request.
    async fn remove_assignees(
        &self,
        repo_owner: &str,
        repo_name: &str,
        issue_number: u64,
        assignees: &[String],
    ) -> Result<(), Error>;

    /// Opens or closes an issue or pull request.
    async fn update_issue_state(
        &self,
        repo_owner: &str,
        repo_name: &str,
        issue_number: u64,
        state: IssueState,
    ) -> Result<(), Error>;

    /// Submits a review on a pull request.
    ///
    /// # Arguments
    ///
    /// * `repo_owner` - The owner of the repository
    /// * `repo_name` - The name of the repository
    /// * `pr_number` - The pull request number
    /// * `event` - The review verdict
    /// * `body` - The review text. Supports Markdown
    async fn create_review(
        &self,
        repo_owner: &str,
        repo_name: &str,
        pr_number: u64,
        event: ReviewEvent,
        body: &str,
    ) -> Result<(), Error>;

    /// Lists the reviews submitted on a pull request.
    async fn list_reviews(
        &self,
        repo_owner: &str,
        repo_name: &str,
        pr_number: u64,
    ) -> Result<Vec<Review>, Error>;

    /// Lists the users and teams whose review is still pending.
    async fn list_requested_reviewers(
        &self,
        repo_owner: &str,
        repo_name: &str,
        pr_number: u64,
    ) -> Result<RequestedReviewers, Error>;

    /// Lists the check runs reported against a commit.
    async fn list_check_runs(
        &self,
        repo_owner: &str,
        repo_name: &str,
        commit_sha: &str,
    ) -> Result<Vec<CheckRun>, Error>;
}
