//! Server configuration.
//!
//! Values come from an optional TOML file and from `DONKEYOPS_*` environment
//! variables, the latter taking precedence.
//!
//! ```toml
//! [server]
//! port = 3000
//!
//! [github]
//! app_id = 123456
//! private_key_path = "donkeyops.private-key.pem"
//!
//! [llm]
//! endpoint = "http://localhost:11434/api/generate"
//! model = "llama3.2"
//! timeout_seconds = 300
//! ```

use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use tracing::{debug, error};

use donkeyops_core::llm::{
    LlmSettings, DEFAULT_LLM_ENDPOINT, DEFAULT_LLM_MODEL, DEFAULT_LLM_TIMEOUT_SECONDS,
};

use crate::errors::ServerError;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

pub const DEFAULT_CONFIG_FILE: &str = "donkeyops.toml";
pub const DEFAULT_PORT: u16 = 3000;

pub const APP_ID_KEY: &str = "DONKEYOPS_APP_ID";
pub const LLM_ENDPOINT_KEY: &str = "DONKEYOPS_LLM_ENDPOINT";
pub const LLM_MODEL_KEY: &str = "DONKEYOPS_LLM_MODEL";
pub const LLM_TIMEOUT_KEY: &str = "DONKEYOPS_LLM_TIMEOUT_SECONDS";
pub const PORT_KEY: &str = "DONKEYOPS_PORT";
pub const PRIVATE_KEY_KEY: &str = "DONKEYOPS_PRIVATE_KEY";
pub const WEBHOOK_SECRET_KEY: &str = "DONKEYOPS_WEBHOOK_SECRET";

/// The contents of a `donkeyops.toml` file. Every value is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub github: GitHubSection,

    #[serde(default)]
    pub llm: LlmSection,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ServerSection {
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct GitHubSection {
    pub app_id: Option<u64>,
    pub private_key_path: Option<PathBuf>,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct LlmSection {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
}

impl FileConfig {
    pub fn from_toml(content: &str) -> Result<Self, ServerError> {
        toml::from_str(content).map_err(|e| {
            ServerError::ConfigError(format!("Failed to parse the configuration file: {}", e))
        })
    }

    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let content = fs::read_to_string(path).map_err(|e| {
            error!(
                path = path.display().to_string(),
                error = e.to_string(),
                "Failed to read the configuration file"
            );
            ServerError::ConfigError(format!(
                "Failed to read the configuration file '{}'",
                path.display()
            ))
        })?;

        Self::from_toml(&content)
    }
}

/// Effective server settings.
#[derive(Clone)]
pub struct ServerConfig {
    pub app_id: u64,
    pub private_key: String,
    pub port: u16,

    /// Deliveries are only verified when a secret is set.
    pub webhook_secret: Option<String>,

    pub llm: LlmSettings,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("app_id", &self.app_id)
            .field("port", &self.port)
            .field("webhook_secret_set", &self.webhook_secret.is_some())
            .field("llm", &self.llm)
            .finish()
    }
}

impl ServerConfig {
    /// Combines file values with environment values.
    ///
    /// `env` looks up a variable by name. The server passes the process
    /// environment.
    pub fn resolve<F>(file: FileConfig, env: F) -> Result<Self, ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_id = match env(APP_ID_KEY) {
            Some(v) => parse_value(APP_ID_KEY, &v)?,
            None => file.github.app_id.ok_or_else(|| {
                ServerError::ConfigError(format!(
                    "No GitHub App ID configured. Set {} or [github] app_id.",
                    APP_ID_KEY
                ))
            })?,
        };

        let private_key = match (env(PRIVATE_KEY_KEY), file.github.private_key_path) {
            (Some(v), _) => read_private_key(&v)?,
            (None, Some(path)) => read_key_file(&path)?,
            (None, None) => {
                return Err(ServerError::ConfigError(format!(
                    "No GitHub App private key configured. Set {} or [github] private_key_path.",
                    PRIVATE_KEY_KEY
                )))
            }
        };

        let port = match env(PORT_KEY) {
            Some(v) => parse_value(PORT_KEY, &v)?,
            None => file.server.port.unwrap_or(DEFAULT_PORT),
        };

        let webhook_secret = env(WEBHOOK_SECRET_KEY)
            .or(file.github.webhook_secret)
            .filter(|s| !s.is_empty());

        let timeout_seconds = match env(LLM_TIMEOUT_KEY) {
            Some(v) => parse_value(LLM_TIMEOUT_KEY, &v)?,
            None => file
                .llm
                .timeout_seconds
                .unwrap_or(DEFAULT_LLM_TIMEOUT_SECONDS),
        };
        if timeout_seconds == 0 {
            return Err(ServerError::ConfigError(format!(
                "The LLM timeout must be at least 1 second. Check {} or [llm] timeout_seconds.",
                LLM_TIMEOUT_KEY
            )));
        }

        let llm = LlmSettings {
            endpoint: env(LLM_ENDPOINT_KEY)
                .or(file.llm.endpoint)
                .unwrap_or_else(|| DEFAULT_LLM_ENDPOINT.to_string()),
            model: env(LLM_MODEL_KEY)
                .or(file.llm.model)
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            timeout: Duration::from_secs(timeout_seconds),
        };

        debug!(
            app_id,
            port,
            llm_endpoint = llm.endpoint.as_str(),
            llm_model = llm.model.as_str(),
            "Resolved server configuration"
        );

        Ok(Self {
            app_id,
            private_key,
            port,
            webhook_secret,
            llm,
        })
    }
}

/// Loads the server configuration.
///
/// An explicitly named file must exist. Without one, `donkeyops.toml` in the
/// working directory is read if present.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig, ServerError> {
    let file = match path {
        Some(p) => FileConfig::load(p)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                FileConfig::load(default_path)?
            } else {
                debug!("No configuration file found. Using environment variables only.");
                FileConfig::default()
            }
        }
    };

    ServerConfig::resolve(file, |key| std::env::var(key).ok())
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ServerError> {
    value.trim().parse().map_err(|_| {
        error!(input = value, "Failed to parse the {} key", key);
        ServerError::ConfigError(format!("The value of {} is not valid", key))
    })
}

/// Accepts either the PEM text itself or the path of a PEM file.
fn read_private_key(value: &str) -> Result<String, ServerError> {
    if value.contains("-----BEGIN") {
        return Ok(value.to_string());
    }

    read_key_file(Path::new(value))
}

fn read_key_file(path: &Path) -> Result<String, ServerError> {
    fs::read_to_string(path).map_err(|e| {
        error!(
            path = path.display().to_string(),
            error = e.to_string(),
            "Failed to read the private key file"
        );
        ServerError::ConfigError(format!(
            "Failed to read the private key file '{}'",
            path.display()
        ))
    })
}
