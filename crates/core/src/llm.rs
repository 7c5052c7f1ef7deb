//! # LLM Reviews
//!
//! Code reviews, change summaries and answers to questions about a pull request
//! are produced by a local [Ollama](https://ollama.com) service. This module
//! builds the prompts and talks to that service.
//!
//! The service is expected at `http://localhost:11434/api/generate` unless
//! configured otherwise. Requests are not streamed: one prompt in, one complete
//! answer out, within a bounded time.

use async_trait::async_trait;
use indoc::formatdoc;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[cfg(test)]
#[path = "llm_tests.rs"]
mod tests;

pub const DEFAULT_LLM_ENDPOINT: &str = "http://localhost:11434/api/generate";

pub const DEFAULT_LLM_MODEL: &str = "llama3.2";

pub const DEFAULT_LLM_TIMEOUT_SECONDS: u64 = 300;

/// Port of the default endpoint. Named in error comments so users know what to start.
pub const DEFAULT_LLM_PORT: u16 = 11434;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Failed to create the HTTP client for the LLM service: {0}")]
    ClientCreation(String),

    #[error("LLM service returned a response that could not be read: {0}")]
    InvalidResponse(String),

    #[error("Request to the LLM service failed: {0}")]
    RequestFailed(String),

    #[error("LLM service did not answer within {0} seconds")]
    TimedOut(u64),

    #[error("LLM service responded with HTTP status {0}")]
    UnexpectedStatus(u16),
}

/// A text generation service.
#[async_trait]
pub trait LlmClient: Sync + Send {
    /// Sends a prompt and returns the generated text unchanged.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    /// Port the service listens on. Named in failure comments.
    fn port(&self) -> u16 {
        DEFAULT_LLM_PORT
    }
}

/// Port of `endpoint`, or the scheme's default port when none is given.
/// Falls back to [`DEFAULT_LLM_PORT`] for endpoints that do not parse.
pub fn endpoint_port(endpoint: &str) -> u16 {
    reqwest::Url::parse(endpoint)
        .ok()
        .and_then(|url| url.port_or_known_default())
        .unwrap_or(DEFAULT_LLM_PORT)
}

/// Where and how to reach the LLM service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub endpoint: String,
    pub model: String,

    /// Upper bound for a whole request, including reading the answer.
    pub timeout: Duration,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_LLM_ENDPOINT.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECONDS),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,

    #[serde(default)]
    done: bool,
}

/// [`LlmClient`] for the Ollama `/api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl OllamaClient {
    pub fn new(settings: LlmSettings) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| LlmError::ClientCreation(e.to_string()))?;

        Ok(Self { http, settings })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    #[instrument(skip(self, prompt))]
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let request = GenerateRequest {
            model: &self.settings.model,
            prompt,
            stream: false,
        };

        debug!(
            endpoint = self.settings.endpoint.as_str(),
            model = self.settings.model.as_str(),
            prompt_length = prompt.len(),
            "Sending prompt to the LLM service"
        );

        let timeout_seconds = self.settings.timeout.as_secs();
        let response = self
            .http
            .post(&self.settings.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    warn!(timeout_seconds, "LLM service timed out");
                    LlmError::TimedOut(timeout_seconds)
                } else {
                    warn!(error = e.to_string(), "Failed to reach the LLM service");
                    LlmError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "LLM service returned an error status");
            return Err(LlmError::UnexpectedStatus(status.as_u16()));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::TimedOut(timeout_seconds)
            } else {
                LlmError::InvalidResponse(e.to_string())
            }
        })?;

        info!(
            response_length = body.response.len(),
            done = body.done,
            "Received answer from the LLM service"
        );

        Ok(body.response)
    }

    fn port(&self) -> u16 {
        endpoint_port(&self.settings.endpoint)
    }
}

/// What the LLM should produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewKind {
    Review,
    Summary,
    Ask { question: String },
}

/// The pull request data a prompt is built from.
#[derive(Debug, Clone, Copy)]
pub struct PullRequestContext<'a> {
    pub repo_owner: &'a str,
    pub repo_name: &'a str,
    pub title: &'a str,
    pub number: u64,
    pub diff: &'a str,
}

/// Builds the prompt for one kind of request.
pub fn build_prompt(kind: &ReviewKind, context: &PullRequestContext<'_>) -> String {
    match kind {
        ReviewKind::Review => formatdoc!(
            "
            You are an experienced software engineer reviewing a pull request.

            Repository: {owner}/{repo}
            Pull request #{number}: {title}

            Review the changes below. Point out bugs, security problems, performance issues
            and code that is hard to maintain. Suggest concrete improvements. Keep the review
            concise and format it as Markdown.

            ```diff
            {diff}
            ```
            ",
            owner = context.repo_owner,
            repo = context.repo_name,
            number = context.number,
            title = context.title,
            diff = context.diff,
        ),
        ReviewKind::Summary => formatdoc!(
            "
            You are an experienced software engineer summarizing a pull request.

            Repository: {owner}/{repo}
            Pull request #{number}: {title}

            Summarize what the changes below do and why they matter. Start with a one sentence
            overview, then list the main changes. Format the summary as Markdown.

            ```diff
            {diff}
            ```
            ",
            owner = context.repo_owner,
            repo = context.repo_name,
            number = context.number,
            title = context.title,
            diff = context.diff,
        ),
        ReviewKind::Ask { question } => formatdoc!(
            "
            You are an experienced software engineer answering a question about a pull request.

            Repository: {owner}/{repo}
            Pull request #{number}: {title}

            Question: {question}

            Answer the question using the changes below. If the changes do not contain enough
            information to answer, say so. Format the answer as Markdown.

            ```diff
            {diff}
            ```
            ",
            owner = context.repo_owner,
            repo = context.repo_name,
            number = context.number,
            title = context.title,
            question = question,
            diff = context.diff,
        ),
    }
}

/// Builds the prompt for `kind` and asks the LLM.
pub async fn generate<L: LlmClient + ?Sized>(
    llm: &L,
    kind: &ReviewKind,
    context: &PullRequestContext<'_>,
) -> Result<String, LlmError> {
    let prompt = build_prompt(kind, context);
    llm.generate(&prompt).await
}
