use async_trait::async_trait;
use base64::Engine;
use jsonwebtoken::EncodingKey;
use octocrab::{params, Octocrab};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    errors::Error,
    models::{
        CheckRun, Commit, IssueState, Label, PullRequest, RequestedReviewers, Review, ReviewEvent,
        User,
    },
    ConfigFetcher, PullRequestProvider,
};

#[cfg(test)]
#[path = "github_tests.rs"]
mod tests;

/// Page size used for all paginated GitHub requests.
const PER_PAGE: u8 = 100;

#[derive(Debug, Deserialize)]
struct RawCheckRun {
    name: String,
    conclusion: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCheckRuns {
    check_runs: Vec<RawCheckRun>,
}

#[derive(Debug, Deserialize)]
struct RawCommit {
    sha: String,
    commit: RawCommitDetail,
}

#[derive(Debug, Deserialize)]
struct RawCommitDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RawRequestedReviewers {
    #[serde(default)]
    users: Vec<RawUser>,
    #[serde(default)]
    teams: Vec<RawTeam>,
}

#[derive(Debug, Deserialize)]
struct RawReview {
    id: u64,
    state: String,
}

#[derive(Debug, Deserialize)]
struct RawTeam {
    slug: String,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    login: String,
}

/// Authenticates with GitHub using an installation access token for a specific app installation.
///
/// Every webhook delivery names the installation it was sent for. The returned
/// client acts on behalf of that installation only.
///
/// # Arguments
///
/// * `octocrab` - A client authenticated as the GitHub App.
/// * `installation_id` - The ID of the GitHub App installation.
/// * `repository_owner` - The owner of the repository associated with the installation.
/// * `source_repository` - The name of the repository associated with the installation.
///
/// # Errors
///
/// Returns [`Error::FailedToCreateAccessToken`] if GitHub refuses to issue a
/// token for the installation.
#[instrument(skip(octocrab))]
pub async fn authenticate_with_access_token(
    octocrab: &Octocrab,
    installation_id: u64,
    repository_owner: &str,
    source_repository: &str,
) -> Result<Octocrab, Error> {
    debug!(
        repository_owner = repository_owner,
        repository = source_repository,
        installation_id,
        "Finding installation"
    );

    let (api_with_token, _) = octocrab
        .installation_and_token(installation_id.into())
        .await
        .map_err(|e| {
            log_octocrab_error("Failed to create a token for the installation", e);
            Error::FailedToCreateAccessToken(
                repository_owner.to_string(),
                source_repository.to_string(),
                installation_id,
            )
        })?;

    info!(
        repository_owner = repository_owner,
        repository = source_repository,
        installation_id,
        "Created access token for installation",
    );

    Ok(api_with_token)
}

/// Creates an `Octocrab` client authenticated as a GitHub App using a JWT token.
///
/// # Arguments
///
/// * `app_id` - The ID of the GitHub App.
/// * `private_key` - The private key associated with the GitHub App, in PEM format.
///
/// # Returns
///
/// The app client together with the identity of the app.
///
/// # Example
///
/// ```rust,no_run
/// use donkeyops_developer_platforms::github::create_app_client;
///
/// # async fn run() -> Result<(), donkeyops_developer_platforms::errors::Error> {
/// let pem = std::fs::read_to_string("donkeyops.private-key.pem").unwrap();
/// let (client, app) = create_app_client(123456, &pem).await?;
/// println!("Authenticated as {}", app.login);
/// # Ok(())
/// # }
/// ```
#[instrument(skip(private_key))]
pub async fn create_app_client(app_id: u64, private_key: &str) -> Result<(Octocrab, User), Error> {
    let key = EncodingKey::from_rsa_pem(private_key.as_bytes()).map_err(|e| {
        Error::AuthError(format!(
            "Failed to translate the private key. Error was: {}",
            e
        ))
    })?;

    let octocrab = Octocrab::builder()
        .app(app_id.into(), key)
        .build()
        .map_err(|_| Error::AuthError("Failed to create a client for the app.".to_string()))?;

    info!(app_id, "Created client for the GitHub app");

    let app = match octocrab.current().app().await {
        Ok(a) => a,
        Err(e) => {
            log_octocrab_error(
                "Failed to retrieve App information for the currently authenticated app",
                e,
            );
            return Err(Error::InvalidResponse);
        }
    };

    let user = User {
        id: app.id.into_inner(),
        login: app.name,
    };

    Ok((octocrab, user))
}

/// Creates a client that acts on behalf of the app installation covering a repository.
///
/// Used by one-shot tools that know the repository but not the installation ID.
#[instrument(skip(app_client))]
pub async fn create_repository_installation_client(
    app_client: &Octocrab,
    repository_owner: &str,
    repository: &str,
) -> Result<Octocrab, Error> {
    let installation = app_client
        .apps()
        .get_repository_installation(repository_owner, repository)
        .await
        .map_err(|e| {
            log_octocrab_error("Failed to find the app installation for the repository", e);
            Error::FailedToFindAppInstallation(
                repository_owner.to_string(),
                repository.to_string(),
            )
        })?;

    authenticate_with_access_token(
        app_client,
        installation.id.into_inner(),
        repository_owner,
        repository,
    )
    .await
}

#[instrument(skip(token))]
pub fn create_token_client(token: &str) -> Result<Octocrab, Error> {
    Octocrab::builder()
        .personal_token(token.to_string())
        .build()
        .map_err(|_| Error::AuthError("Failed to create a client for the token.".to_string()))
}

fn is_not_found(e: &octocrab::Error) -> bool {
    match e {
        octocrab::Error::GitHub { source, .. } => source.status_code.as_u16() == 404,
        _ => false,
    }
}

fn log_octocrab_error(message: &str, e: octocrab::Error) {
    match e {
        octocrab::Error::GitHub { source, .. } => error!(
            error_message = source.message.as_str(),
            status = source.status_code.as_u16(),
            "{}. Received an error from GitHub",
            message
        ),
        octocrab::Error::Serde { source, .. } => error!(
            error_message = source.to_string(),
            "{}. Failed to decode the response.",
            message
        ),
        _ => error!(error_message = e.to_string(), "{}", message),
    };
}

fn to_pull_request(pr: octocrab::models::pulls::PullRequest) -> PullRequest {
    PullRequest {
        number: pr.number,
        title: pr.title.unwrap_or_default(),
        draft: pr.draft.unwrap_or_default(),
        body: pr.body,
        head_sha: pr.head.sha.clone(),
        base_sha: pr.base.sha.clone(),
        labels: pr
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(|l| Label { name: l.name })
            .collect(),
        mergeable: pr.mergeable,
        updated_at: pr.updated_at,
    }
}

/// [`PullRequestProvider`] and [`ConfigFetcher`] backed by the GitHub REST API.
#[derive(Debug)]
pub struct GitHubProvider {
    client: Octocrab,
}

impl GitHubProvider {
    pub async fn fetch_default_branch(
        &self,
        repo_owner: &str,
        repo_name: &str,
    ) -> Result<String, Error> {
        let repo = match self.client.repos(repo_owner, repo_name).get().await {
            Ok(r) => r,
            Err(e) => {
                log_octocrab_error("Failed to get repository information", e);
                return Err(Error::InvalidResponse);
            }
        };
        let branch = repo.default_branch.unwrap_or("main".to_string());

        Ok(branch)
    }

    /// Fetch the content of a file from the repository at the given reference.
    /// Returns Ok(Some(content)) if found, Ok(None) if not found, or Err on error.
    pub async fn fetch_file_content(
        &self,
        repo_owner: &str,
        repo_name: &str,
        path: &str,
        reference: &str,
    ) -> Result<Option<String>, Error> {
        let content_result = self
            .client
            .repos(repo_owner, repo_name)
            .get_content()
            .path(path)
            .r#ref(reference)
            .send()
            .await;

        match content_result {
            Ok(response) => {
                let Some(file) = response.items.into_iter().next() else {
                    return Ok(None);
                };
                let Some(content) = file.content else {
                    return Ok(None);
                };

                // GitHub returns base64 content wrapped at 60 columns
                let decoded = base64::engine::general_purpose::STANDARD
                    .decode(content.replace('\n', ""))
                    .map_err(|_| Error::InvalidResponse)?;
                let content_str = String::from_utf8(decoded).map_err(|_| Error::InvalidResponse)?;
                Ok(Some(content_str))
            }
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => {
                log_octocrab_error("Failed to fetch file content", e);
                Err(Error::ApiError())
            }
        }
    }

    /// Collects every page of a list endpoint that pages with `page`/`per_page`.
    async fn get_all_pages<T>(&self, route: &str) -> Result<Vec<T>, octocrab::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut page: u32 = 1;
        loop {
            let parameters = [
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ];
            let batch: Vec<T> = self.client.get(route, Some(&parameters)).await?;
            let count = batch.len();
            items.extend(batch);

            if count < PER_PAGE as usize {
                break;
            }
            page += 1;
        }

        Ok(items)
    }

    pub fn new(client: Octocrab) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ConfigFetcher for GitHubProvider {
    #[instrument]
    async fn fetch_config(
        &self,
        repo_owner: &str,
        repo_name: &str,
        path: &str,
        reference: Option<&str>,
    ) -> Result<Option<String>, Error> {
        let reference = match reference {
            Some(r) => r.to_string(),
            None => self.fetch_default_branch(repo_owner, repo_name).await?,
        };
        self.fetch_file_content(repo_owner, repo_name, path, &reference)
            .await
    }
}

#[async_trait]
impl PullRequestProvider for GitHubProvider {
    #[instrument]
    async fn get_pull_request(
        &self,
        repo_owner: &str,
        repo_name: &str,
        pr_number: u64,
    ) -> Result<PullRequest, Error> {
        match self
            .client
            .pulls(repo_owner, repo_name)
            .get(pr_number)
            .await
        {
            Ok(pr) => Ok(to_pull_request(pr)),
            Err(e) if is_not_found(&e) => {
                debug!(
                    repository_owner = repo_owner,
                    repository = repo_name,
                    pull_request = pr_number,
                    "No pull request with this number"
                );
                Err(Error::NotFound(format!(
                    "pull request {} in {}/{}",
                    pr_number, repo_owner, repo_name
                )))
            }
            Err(e) => {
                log_octocrab_error("Failed to get pull request information", e);
                Err(Error::InvalidResponse)
            }
        }
    }

    #[instrument]
    async fn list_open_pull_requests(
        &self,
        repo_owner: &str,
        repo_name: &str,
    ) -> Result<Vec<PullRequest>, Error> {
        let mut current_page = match self
            .client
            .pulls(repo_owner, repo_name)
            .list()
            .state(params::State::Open)
            .sort(params::pulls::Sort::Updated)
            .direction(params::Direction::Ascending)
            .per_page(PER_PAGE)
            .send()
            .await
        {
            Ok(p) => p,
            Err(e) => {
                log_octocrab_error("Failed to list open pull requests", e);
                return Err(Error::InvalidResponse);
            }
        };

        let mut pulls = current_page.take_items();
        while let Ok(Some(mut new_page)) = self.client.get_page(&current_page.next).await {
            pulls.extend(new_page.take_items());

            current_page = new_page;
        }

        Ok(pulls.into_iter().map(to_pull_request).collect())
    }

    #[instrument]
    async fn list_commits(
        &self,
        repo_owner: &str,
        repo_name: &str,
        pr_number: u64,
    ) -> Result<Vec<Commit>, Error> {
        let route = format!("/repos/{}/{}/pulls/{}/commits", repo_owner, repo_name, pr_number);
        let commits: Vec<RawCommit> = self.get_all_pages(&route).await.map_err(|e| {
            log_octocrab_error("Failed to list commits for pull request", e);
            Error::InvalidResponse
        })?;

        Ok(commits
            .into_iter()
            .map(|c| Commit {
                sha: c.sha,
                message: c.commit.message,
            })
            .collect())
    }

    #[instrument]
    async fn get_pull_request_diff(
        &self,
        repo_owner: &str,
        repo_name: &str,
        pr_number: u64,
    ) -> Result<String, Error> {
        self.client
            .pulls(repo_owner, repo_name)
            .get_diff(pr_number)
            .await
            .map_err(|e| {
                log_octocrab_error("Failed to get the diff for pull request", e);
                Error::InvalidResponse
            })
    }

    #[instrument(skip(comment))]
    async fn add_comment(
        &self,
        repo_owner: &str,
        repo_name: &str,
        issue_number: u64,
        comment: &str,
    ) -> Result<(), Error> {
        match self
            .client
            .issues(repo_owner, repo_name)
            .create_comment(issue_number, comment)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                log_octocrab_error("Failed to add comment", e);
                Err(Error::FailedToUpdatePullRequest(
                    "Failed to add comment".to_string(),
                ))
            }
        }
    }

    #[instrument]
    async fn list_labels(
        &self,
        repo_owner: &str,
        repo_name: &str,
        issue_number: u64,
    ) -> Result<Vec<Label>, Error> {
        let mut current_page = match self
            .client
            .issues(repo_owner, repo_name)
            .list_labels_for_issue(issue_number)
            .send()
            .await
        {
            Ok(p) => p,
            Err(e) => {
                log_octocrab_error("Failed to list all labels for issue", e);
                return Err(Error::InvalidResponse);
            }
        };

        let mut labels = current_page.take_items();
        while let Ok(Some(mut new_page)) = self.client.get_page(&current_page.next).await {
            labels.extend(new_page.take_items());

            current_page = new_page;
        }

        let result = labels.into_iter().map(|l| Label { name: l.name }).collect();

        Ok(result)
    }

    #[instrument]
    async fn add_labels(
        &self,
        repo_owner: &str,
        repo_name: &str,
        issue_number: u64,
        labels: &[String],
    ) -> Result<(), Error> {
        match self
            .client
            .issues(repo_owner, repo_name)
            .add_labels(issue_number, labels)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                log_octocrab_error("Failed to add new labels", e);
                Err(Error::FailedToUpdatePullRequest(
                    "Failed to add labels".to_string(),
                ))
            }
        }
    }

    #[instrument]
    async fn remove_label(
        &self,
        repo_owner: &str,
        repo_name: &str,
        issue_number: u64,
        label: &str,
    ) -> Result<(), Error> {
        match self
            .client
            .issues(repo_owner, repo_name)
            .remove_label(issue_number, label)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                log_octocrab_error("Failed to remove label", e);
                Err(Error::FailedToUpdatePullRequest(
                    "Failed to remove label".to_string(),
                ))
            }
        }
    }

    #[instrument]
    async fn add_assignees(
        &self,
        repo_owner: &str,
        repo_name: &str,
        issue_number: u64,
        assignees: &[String],
    ) -> Result<(), Error> {
        let logins: Vec<&str> = assignees.iter().map(String::as_str).collect();
        match self
            .client
            .issues(repo_owner, repo_name)
            .add_assignees(issue_number, &logins)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                log_octocrab_error("Failed to add assignees", e);
                Err(Error::FailedToUpdatePullRequest(
                    "Failed to add assignees".to_string(),
                ))
            }
        }
    }

    #[instrument]
    async fn remove_assignees(
        &self,
        repo_owner: &str,
        repo_name: &str,
        issue_number: u64,
        assignees: &[String],
    ) -> Result<(), Error> {
        let logins: Vec<&str> = assignees.iter().map(String::as_str).collect();
        match self
            .client
            .issues(repo_owner, repo_name)
            .remove_assignees(issue_number, &logins)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                log_octocrab_error("Failed to remove assignees", e);
                Err(Error::FailedToUpdatePullRequest(
                    "Failed to remove assignees".to_string(),
                ))
            }
        }
    }

    #[instrument]
    async fn update_issue_state(
        &self,
        repo_owner: &str,
        repo_name: &str,
        issue_number: u64,
        state: IssueState,
    ) -> Result<(), Error> {
        let state = match state {
            IssueState::Open => octocrab::models::IssueState::Open,
            IssueState::Closed => octocrab::models::IssueState::Closed,
        };

        match self
            .client
            .issues(repo_owner, repo_name)
            .update(issue_number)
            .state(state)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                log_octocrab_error("Failed to update issue state", e);
                Err(Error::FailedToUpdatePullRequest(
                    "Failed to update state".to_string(),
                ))
            }
        }
    }

    #[instrument(skip(body))]
    async fn create_review(
        &self,
        repo_owner: &str,
        repo_name: &str,
        pr_number: u64,
        event: ReviewEvent,
        body: &str,
    ) -> Result<(), Error> {
        let route = format!("/repos/{}/{}/pulls/{}/reviews", repo_owner, repo_name, pr_number);
        let payload = json!({
            "event": event.as_str(),
            "body": body,
        });

        let response: Result<serde_json::Value, _> =
            self.client.post(route, Some(&payload)).await;
        match response {
            Ok(_) => Ok(()),
            Err(e) => {
                log_octocrab_error("Failed to submit review", e);
                Err(Error::FailedToUpdatePullRequest(
                    "Failed to submit review".to_string(),
                ))
            }
        }
    }

    #[instrument]
    async fn list_reviews(
        &self,
        repo_owner: &str,
        repo_name: &str,
        pr_number: u64,
    ) -> Result<Vec<Review>, Error> {
        let route = format!("/repos/{}/{}/pulls/{}/reviews", repo_owner, repo_name, pr_number);
        let reviews: Vec<RawReview> = self.get_all_pages(&route).await.map_err(|e| {
            log_octocrab_error("Failed to list reviews for pull request", e);
            Error::InvalidResponse
        })?;

        Ok(reviews
            .into_iter()
            .map(|r| Review {
                id: r.id,
                state: r.state,
            })
            .collect())
    }

    #[instrument]
    async fn list_requested_reviewers(
        &self,
        repo_owner: &str,
        repo_name: &str,
        pr_number: u64,
    ) -> Result<RequestedReviewers, Error> {
        let route = format!(
            "/repos/{}/{}/pulls/{}/requested_reviewers",
            repo_owner, repo_name, pr_number
        );
        let requested: RawRequestedReviewers =
            self.client.get(route, None::<&()>).await.map_err(|e| {
                log_octocrab_error("Failed to list requested reviewers", e);
                Error::InvalidResponse
            })?;

        Ok(RequestedReviewers {
            users: requested.users.into_iter().map(|u| u.login).collect(),
            teams: requested.teams.into_iter().map(|t| t.slug).collect(),
        })
    }

    #[instrument]
    async fn list_check_runs(
        &self,
        repo_owner: &str,
        repo_name: &str,
        commit_sha: &str,
    ) -> Result<Vec<CheckRun>, Error> {
        let route = format!(
            "/repos/{}/{}/commits/{}/check-runs",
            repo_owner, repo_name, commit_sha
        );
        let mut runs = Vec::new();
        let mut page: u32 = 1;
        loop {
            let parameters = [
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ];
            let batch: RawCheckRuns = self
                .client
                .get(&route, Some(&parameters))
                .await
                .map_err(|e| {
                    warn!(
                        repository_owner = repo_owner,
                        repository = repo_name,
                        commit = commit_sha,
                        page,
                        "Failed to list check runs"
                    );
                    log_octocrab_error("Failed to list check runs", e);
                    Error::InvalidResponse
                })?;
            let count = batch.check_runs.len();
            runs.extend(batch.check_runs);

            if count < PER_PAGE as usize {
                break;
            }
            page += 1;
        }

        Ok(runs
            .into_iter()
            .map(|r| CheckRun {
                name: r.name,
                conclusion: r.conclusion,
            })
            .collect())
    }
}
