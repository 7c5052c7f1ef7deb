use clap::Args;
use octocrab::Octocrab;
use std::{fs, path::Path};
use tracing::{debug, info};

use donkeyops_developer_platforms::github::{
    create_app_client, create_repository_installation_client, create_token_client,
};

use crate::errors::CliError;

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;

/// GitHub credentials. App credentials win over a token when both are given.
#[derive(Args, Debug, Default)]
pub struct AuthArgs {
    /// GitHub App ID
    #[arg(long, env = "APP_ID")]
    pub app_id: Option<u64>,

    /// GitHub App private key, as PEM text or the path of a PEM file
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Personal access token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(PartialEq, Eq)]
pub enum Credentials {
    App { app_id: u64, private_key: String },
    Token(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::App { app_id, .. } => f.debug_struct("App").field("app_id", app_id).finish(),
            Credentials::Token(_) => f.write_str("Token"),
        }
    }
}

impl AuthArgs {
    pub fn credentials(&self) -> Result<Credentials, CliError> {
        match (self.app_id, &self.private_key, &self.token) {
            (Some(app_id), Some(key), _) => Ok(Credentials::App {
                app_id,
                private_key: read_private_key(key)?,
            }),
            (_, _, Some(token)) => {
                debug!("No complete GitHub App credentials. Using token.");
                Ok(Credentials::Token(token.clone()))
            }
            _ => Err(CliError::AuthError(
                "No GitHub credentials. Provide --app-id and --private-key, or --token."
                    .to_string(),
            )),
        }
    }
}

/// Creates a client allowed to act on `owner/repo`.
pub async fn create_client(
    credentials: &Credentials,
    repo_owner: &str,
    repo_name: &str,
) -> Result<Octocrab, CliError> {
    match credentials {
        Credentials::App {
            app_id,
            private_key,
        } => {
            info!(app_id, "Using GitHub App authentication");
            let (app_client, _) = create_app_client(*app_id, private_key).await?;
            Ok(create_repository_installation_client(&app_client, repo_owner, repo_name).await?)
        }
        Credentials::Token(token) => {
            info!("Using token authentication");
            Ok(create_token_client(token)?)
        }
    }
}

fn read_private_key(value: &str) -> Result<String, CliError> {
    if value.contains("-----BEGIN") {
        return Ok(value.to_string());
    }

    fs::read_to_string(Path::new(value)).map_err(|e| {
        CliError::ConfigError(format!(
            "Failed to load the app key from '{}': {}",
            value, e
        ))
    })
}
