#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Error types for developer platform operations.
///
/// This enum represents the failures that can occur when DonkeyOps talks to
/// GitHub. Each variant carries enough context for a log line; none of them
/// carry a source error because octocrab errors are logged at the call site
/// and never handed to callers.
///
/// # Examples
///
/// ```rust
/// use donkeyops_developer_platforms::errors::Error;
///
/// let auth_error = Error::AuthError("Invalid token".to_string());
/// assert_eq!(auth_error.to_string(), "Authentication failed: Invalid token");
///
/// let missing = Error::NotFound("rucio/rucio#42".to_string());
/// assert_eq!(missing.to_string(), "Resource not found: rucio/rucio#42");
/// ```
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Generic API request failure.
    ///
    /// Used when GitHub rejected a read request for a reason other than
    /// the resource not existing.
    #[error("API request failed")]
    ApiError(),

    /// Authentication failed with the platform.
    ///
    /// The credentials (token, app key, installation) are invalid, expired,
    /// or insufficient for the requested operation.
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Failed to create an installation access token for a repository.
    ///
    /// Parameters: repository owner, repository name, installation ID
    #[error("Failed to create an app access token for repository: {0}/{1}. For installation with ID: {2}")]
    FailedToCreateAccessToken(String, String, u64),

    /// Failed to find the app installation for a repository.
    ///
    /// Parameters: repository owner, repository name
    #[error("Failed to find installation for repository: {0}/{1}")]
    FailedToFindAppInstallation(String, String),

    /// Failed to modify an issue or pull request.
    ///
    /// Covers comments, labels, assignees, state changes and reviews. The
    /// string names the operation that failed.
    #[error("Failed to update the issue or pull request: {0}")]
    FailedToUpdatePullRequest(String),

    /// The response from GitHub was not in the expected format, or the
    /// request could not be completed.
    #[error("Invalid response format")]
    InvalidResponse,

    /// The requested resource does not exist.
    ///
    /// Returned, for instance, when a pull request lookup is made with the
    /// number of a plain issue.
    #[error("Resource not found: {0}")]
    NotFound(String),
}
