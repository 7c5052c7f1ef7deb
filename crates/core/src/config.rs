//! Repository configuration for DonkeyOps.
//!
//! Repositories tune the bot through a `.donkeyops.yml` file at their root. Every
//! field in that file is optional and each one falls back to its built-in default
//! on its own: an absent field means "use the default", while a field that is
//! present but empty (for example `valid_components: []`) is taken literally.
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

use donkeyops_developer_platforms::ConfigFetcher;

use crate::errors::ConfigLoadError;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Path of the repository configuration file, relative to the repository root.
pub const CONFIG_FILE_PATH: &str = ".donkeyops.yml";

/// Display-only description of the expected commit message shape.
pub const DEFAULT_COMMIT_FORMAT: &str = "<type>(<component>): <short_message> #<issue_number>";

/// Components accepted in commit messages and used as PR labels.
pub const DEFAULT_VALID_COMPONENTS: [&str; 20] = [
    "Testing",
    "Clients",
    "Core",
    "WebUI",
    "Database",
    "API",
    "Documentation",
    "Infrastructure",
    "Security",
    "Performance",
    "Monitoring",
    "Deployment",
    "CI/CD",
    "Dependencies",
    "Bug Fix",
    "Feature",
    "Enhancement",
    "Core & Internals",
    "Refactoring",
    "Docs",
];

/// Commit types accepted in commit messages.
pub const DEFAULT_VALID_TYPES: [&str; 11] = [
    "build", "chore", "ci", "docs", "feat", "fix", "perf", "refactor", "revert", "style", "test",
];

lazy_static! {
    /// Structure of a commit message: `type(component): message #123`.
    ///
    /// Capture groups: 1 = type, 2 = component, 3 = short message, 4 = issue number.
    pub static ref COMMIT_MESSAGE_REGEX: Regex =
        Regex::new(r"^([a-zA-Z-]+)\(([^)]+)\):\s*(.+?)\s*#(\d+)$")
            .expect("Failed to compile commit message regex");
}

/// The `conventional_commits` section of `.donkeyops.yml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConventionalCommitsConfig {
    #[serde(default)]
    pub type_enum: Option<Vec<String>>,

    #[serde(default)]
    pub valid_components: Option<Vec<String>>,

    /// Accepted for compatibility. The issue number suffix is always required.
    #[serde(default)]
    pub require_issue_number: Option<bool>,

    #[serde(default)]
    pub commit_format: Option<String>,

    #[serde(default)]
    pub enabled: Option<bool>,
}

/// The `pr_labeling` section of `.donkeyops.yml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrLabelingConfig {
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// The parsed contents of a `.donkeyops.yml` file.
///
/// Nothing in here is defaulted. Use the accessors, or [`RepositoryConfig::rule_set`],
/// to read effective values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepositoryConfig {
    #[serde(default)]
    pub conventional_commits: Option<ConventionalCommitsConfig>,

    #[serde(default)]
    pub pr_labeling: Option<PrLabelingConfig>,
}

impl RepositoryConfig {
    /// Whether the commit message check runs. Defaults to `true`.
    pub fn commit_check_enabled(&self) -> bool {
        self.conventional_commits
            .as_ref()
            .and_then(|c| c.enabled)
            .unwrap_or(true)
    }

    /// The display-only commit format template.
    pub fn commit_format(&self) -> String {
        self.conventional_commits
            .as_ref()
            .and_then(|c| c.commit_format.clone())
            .unwrap_or_else(|| DEFAULT_COMMIT_FORMAT.to_string())
    }

    /// Loads a configuration from a local file.
    ///
    /// Unlike [`resolve_repository_config`] this reports problems to the caller,
    /// so tools can tell a user that their file is broken.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parses the text of a `.donkeyops.yml` document.
    ///
    /// An empty document is a valid, empty configuration.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigLoadError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Option<RepositoryConfig> = serde_yaml::from_str(content)?;
        Ok(config.unwrap_or_default())
    }

    /// Whether labels are derived from titles and commits. Defaults to `true`.
    pub fn pr_labeling_enabled(&self) -> bool {
        self.pr_labeling
            .as_ref()
            .and_then(|c| c.enabled)
            .unwrap_or(true)
    }

    /// Reserved setting, see [`ConventionalCommitsConfig::require_issue_number`].
    pub fn require_issue_number(&self) -> bool {
        self.conventional_commits
            .as_ref()
            .and_then(|c| c.require_issue_number)
            .unwrap_or(true)
    }

    /// Builds the effective rules for one event.
    pub fn rule_set(&self) -> RuleSet {
        RuleSet {
            types: self.valid_types(),
            components: self.valid_components(),
            commit_format: self.commit_format(),
            commit_check_enabled: self.commit_check_enabled(),
            pr_labeling_enabled: self.pr_labeling_enabled(),
        }
    }

    /// The allowed components, in declaration order.
    pub fn valid_components(&self) -> Vec<String> {
        self.conventional_commits
            .as_ref()
            .and_then(|c| c.valid_components.clone())
            .unwrap_or_else(|| DEFAULT_VALID_COMPONENTS.iter().map(|s| s.to_string()).collect())
    }

    /// The allowed commit types, in declaration order.
    pub fn valid_types(&self) -> Vec<String> {
        self.conventional_commits
            .as_ref()
            .and_then(|c| c.type_enum.clone())
            .unwrap_or_else(|| DEFAULT_VALID_TYPES.iter().map(|s| s.to_string()).collect())
    }
}

/// Effective validation and labeling rules for one repository event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    /// Allowed commit types, compared case-insensitively.
    pub types: Vec<String>,

    /// Allowed components, compared case-insensitively. The declared casing is canonical.
    pub components: Vec<String>,

    pub commit_format: String,

    pub commit_check_enabled: bool,

    pub pr_labeling_enabled: bool,
}

impl Default for RuleSet {
    fn default() -> Self {
        RepositoryConfig::default().rule_set()
    }
}

/// Picks the ref to read the configuration from: head commit, then base commit,
/// then the ref named by the event. `None` means the default branch.
pub fn preferred_reference<'a>(
    head_sha: Option<&'a str>,
    base_sha: Option<&'a str>,
    event_ref: Option<&'a str>,
) -> Option<&'a str> {
    [head_sha, base_sha, event_ref]
        .into_iter()
        .flatten()
        .find(|r| !r.trim().is_empty())
}

/// Fetches and parses `.donkeyops.yml` at the given ref.
///
/// Never fails. A missing file, a fetch failure or a parse error all produce an
/// empty configuration, which means built-in defaults everywhere.
#[instrument(skip(fetcher))]
pub async fn resolve_repository_config(
    fetcher: &dyn ConfigFetcher,
    repo_owner: &str,
    repo_name: &str,
    reference: Option<&str>,
) -> RepositoryConfig {
    let content = match fetcher
        .fetch_config(repo_owner, repo_name, CONFIG_FILE_PATH, reference)
        .await
    {
        Ok(Some(c)) => c,
        Ok(None) => {
            debug!(
                repository_owner = repo_owner,
                repository = repo_name,
                "No repository configuration found. Using defaults."
            );
            return RepositoryConfig::default();
        }
        Err(e) => {
            warn!(
                repository_owner = repo_owner,
                repository = repo_name,
                error = e.to_string(),
                "Failed to fetch the repository configuration. Using defaults."
            );
            return RepositoryConfig::default();
        }
    };

    match RepositoryConfig::from_yaml(&content) {
        Ok(config) => {
            info!(
                repository_owner = repo_owner,
                repository = repo_name,
                "Loaded repository configuration"
            );
            config
        }
        Err(e) => {
            warn!(
                repository_owner = repo_owner,
                repository = repo_name,
                error = e.to_string(),
                "Failed to parse the repository configuration. Using defaults."
            );
            RepositoryConfig::default()
        }
    }
}
