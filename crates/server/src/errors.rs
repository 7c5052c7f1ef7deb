use thiserror::Error;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Server errors. None of these occur while handling a delivery; they stop the
/// server from starting.
#[derive(Error, Debug)]
pub enum ServerError {
    /// GitHub App authentication error
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The LLM client could not be created
    #[error("LLM client error: {0}")]
    LlmError(#[from] donkeyops_core::llm::LlmError),
}
