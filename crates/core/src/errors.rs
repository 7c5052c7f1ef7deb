use thiserror::Error;

use crate::llm::LlmError;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

#[derive(Error, Debug)]
pub enum DonkeyOpsError {
    #[error("Git provider error: {0}")]
    GitProviderError(#[from] donkeyops_developer_platforms::errors::Error),

    #[error("LLM service error: {0}")]
    LlmError(#[from] LlmError),
}

/// Errors raised while reading a `.donkeyops.yml` document.
#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("Failed to read the configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse the configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
