//! In-memory providers shared by the unit tests of this crate.
//!
//! Every mock records what it was asked to do in shared state so that tests can
//! assert on the side effects of an operation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use donkeyops_developer_platforms::errors::Error;
use donkeyops_developer_platforms::models::{
    CheckRun, Commit, IssueState, Label, PullRequest, RequestedReviewers, Review, ReviewEvent,
};
use donkeyops_developer_platforms::{ConfigFetcher, PullRequestProvider};

use crate::llm::{LlmClient, LlmError, DEFAULT_LLM_PORT};

#[derive(Debug, Default)]
pub struct ProviderState {
    pub pull_requests: HashMap<u64, PullRequest>,
    pub commits: Vec<Commit>,
    pub diff: String,
    pub labels: HashMap<u64, Vec<String>>,
    pub reviews: HashMap<u64, Vec<Review>>,
    pub requested_reviewers: HashMap<u64, RequestedReviewers>,
    pub check_runs: HashMap<String, Vec<CheckRun>>,
    pub config: Option<String>,

    pub fail_add_labels: bool,
    pub fail_check_runs: bool,
    pub fail_diff: bool,
    pub fail_list_commits: bool,
    pub fail_list_labels: bool,
    pub fail_remove_label: bool,

    pub comments: Vec<(u64, String)>,
    pub add_label_calls: Vec<(u64, Vec<String>)>,
    pub removed_labels: Vec<(u64, String)>,
    pub assigned: Vec<(u64, Vec<String>)>,
    pub unassigned: Vec<(u64, Vec<String>)>,
    pub state_changes: Vec<(u64, IssueState)>,
    pub created_reviews: Vec<(u64, ReviewEvent, String)>,
    pub config_refs: Vec<Option<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    pub state: Arc<Mutex<ProviderState>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn comments(&self) -> Vec<(u64, String)> {
        self.state.lock().unwrap().comments.clone()
    }

    pub fn with_pull_request(self, pr: PullRequest) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.labels.insert(
                pr.number,
                pr.labels.iter().map(|l| l.name.clone()).collect(),
            );
            state.pull_requests.insert(pr.number, pr);
        }
        self
    }

    pub fn update<F: FnOnce(&mut ProviderState)>(self, f: F) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            f(&mut *state);
        }
        self
    }
}

pub fn pull_request(number: u64, title: &str) -> PullRequest {
    PullRequest {
        number,
        title: title.to_string(),
        draft: false,
        body: None,
        head_sha: format!("head{}", number),
        base_sha: format!("base{}", number),
        labels: Vec::new(),
        mergeable: None,
        updated_at: None,
    }
}

#[async_trait]
impl ConfigFetcher for MockProvider {
    async fn fetch_config(
        &self,
        _repo_owner: &str,
        _repo_name: &str,
        _path: &str,
        reference: Option<&str>,
    ) -> Result<Option<String>, Error> {
        let mut state = self.state.lock().unwrap();
        state.config_refs.push(reference.map(|r| r.to_string()));
        Ok(state.config.clone())
    }
}

#[async_trait]
impl PullRequestProvider for MockProvider {
    async fn get_pull_request(
        &self,
        _repo_owner: &str,
        _repo_name: &str,
        pr_number: u64,
    ) -> Result<PullRequest, Error> {
        let state = self.state.lock().unwrap();
        match state.pull_requests.get(&pr_number) {
            Some(pr) => {
                let mut pr = pr.clone();
                pr.labels = state
                    .labels
                    .get(&pr_number)
                    .map(|names| {
                        names
                            .iter()
                            .map(|n| Label { name: n.clone() })
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(pr)
            }
            None => Err(Error::NotFound(format!("pull request {}", pr_number))),
        }
    }

    async fn list_open_pull_requests(
        &self,
        repo_owner: &str,
        repo_name: &str,
    ) -> Result<Vec<PullRequest>, Error> {
        let mut numbers: Vec<u64> = self
            .state
            .lock()
            .unwrap()
            .pull_requests
            .keys()
            .copied()
            .collect();
        numbers.sort();

        let mut pulls = Vec::new();
        for number in numbers {
            pulls.push(self.get_pull_request(repo_owner, repo_name, number).await?);
        }
        Ok(pulls)
    }

    async fn list_commits(
        &self,
        _repo_owner: &str,
        _repo_name: &str,
        _pr_number: u64,
    ) -> Result<Vec<Commit>, Error> {
        let state = self.state.lock().unwrap();
        if state.fail_list_commits {
            return Err(Error::ApiError());
        }
        Ok(state.commits.clone())
    }

    async fn get_pull_request_diff(
        &self,
        _repo_owner: &str,
        _repo_name: &str,
        _pr_number: u64,
    ) -> Result<String, Error> {
        let state = self.state.lock().unwrap();
        if state.fail_diff {
            return Err(Error::InvalidResponse);
        }
        Ok(state.diff.clone())
    }

    async fn add_comment(
        &self,
        _repo_owner: &str,
        _repo_name: &str,
        issue_number: u64,
        comment: &str,
    ) -> Result<(), Error> {
        self.state
            .lock()
            .unwrap()
            .comments
            .push((issue_number, comment.to_string()));
        Ok(())
    }

    async fn list_labels(
        &self,
        _repo_owner: &str,
        _repo_name: &str,
        issue_number: u64,
    ) -> Result<Vec<Label>, Error> {
        let state = self.state.lock().unwrap();
        if state.fail_list_labels {
            return Err(Error::ApiError());
        }
        Ok(state
            .labels
            .get(&issue_number)
            .map(|names| names.iter().map(|n| Label { name: n.clone() }).collect())
            .unwrap_or_default())
    }

    async fn add_labels(
        &self,
        _repo_owner: &str,
        _repo_name: &str,
        issue_number: u64,
        labels: &[String],
    ) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        if state.fail_add_labels {
            return Err(Error::FailedToUpdatePullRequest(
                "Failed to add labels".to_string(),
            ));
        }
        state.add_label_calls.push((issue_number, labels.to_vec()));
        let current = state.labels.entry(issue_number).or_default();
        for label in labels {
            if !current.contains(label) {
                current.push(label.clone());
            }
        }
        Ok(())
    }

    async fn remove_label(
        &self,
        _repo_owner: &str,
        _repo_name: &str,
        issue_number: u64,
        label: &str,
    ) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        if state.fail_remove_label {
            return Err(Error::FailedToUpdatePullRequest(
                "Failed to remove label".to_string(),
            ));
        }
        state.removed_labels.push((issue_number, label.to_string()));
        if let Some(current) = state.labels.get_mut(&issue_number) {
            current.retain(|l| l != label);
        }
        Ok(())
    }

    async fn add_assignees(
        &self,
        _repo_owner: &str,
        _repo_name: &str,
        issue_number: u64,
        assignees: &[String],
    ) -> Result<(), Error> {
        self.state
            .lock()
            .unwrap()
            .assigned
            .push((issue_number, assignees.to_vec()));
        Ok(())
    }

    async fn remove_assignees(
        &self,
        _repo_owner: &str,
        _repo_name: &str,
        issue_number: u64,
        assignees: &[String],
    ) -> Result<(), Error> {
        self.state
            .lock()
            .unwrap()
            .unassigned
            .push((issue_number, assignees.to_vec()));
        Ok(())
    }

    async fn update_issue_state(
        &self,
        _repo_owner: &str,
        _repo_name: &str,
        issue_number: u64,
        state: IssueState,
    ) -> Result<(), Error> {
        self.state
            .lock()
            .unwrap()
            .state_changes
            .push((issue_number, state));
        Ok(())
    }

    async fn create_review(
        &self,
        _repo_owner: &str,
        _repo_name: &str,
        pr_number: u64,
        event: ReviewEvent,
        body: &str,
    ) -> Result<(), Error> {
        self.state
            .lock()
            .unwrap()
            .created_reviews
            .push((pr_number, event, body.to_string()));
        Ok(())
    }

    async fn list_reviews(
        &self,
        _repo_owner: &str,
        _repo_name: &str,
        pr_number: u64,
    ) -> Result<Vec<Review>, Error> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .reviews
            .get(&pr_number)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_requested_reviewers(
        &self,
        _repo_owner: &str,
        _repo_name: &str,
        pr_number: u64,
    ) -> Result<RequestedReviewers, Error> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .requested_reviewers
            .get(&pr_number)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_check_runs(
        &self,
        _repo_owner: &str,
        _repo_name: &str,
        commit_sha: &str,
    ) -> Result<Vec<CheckRun>, Error> {
        let state = self.state.lock().unwrap();
        if state.fail_check_runs {
            return Err(Error::InvalidResponse);
        }
        Ok(state
            .check_runs
            .get(commit_sha)
            .cloned()
            .unwrap_or_default())
    }
}

/// LLM that answers every prompt with a fixed text, or fails with a status code.
#[derive(Debug, Clone, Default)]
pub struct MockLlm {
    pub response: String,
    pub fail_with_status: Option<u16>,
    pub port: Option<u16>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl MockLlm {
    pub fn failing(status: u16) -> Self {
        Self {
            fail_with_status: Some(status),
            ..Self::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn responding(response: &str) -> Self {
        Self {
            response: response.to_string(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.fail_with_status {
            Some(status) => Err(LlmError::UnexpectedStatus(status)),
            None => Ok(self.response.clone()),
        }
    }

    fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_LLM_PORT)
    }
}
