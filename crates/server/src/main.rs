use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::get,
    Router,
};
use clap::Parser;
use hmac::{Hmac, Mac};
use octocrab::Octocrab;
use sha2::Sha256;
use std::{path::PathBuf, sync::Arc};
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::EnvFilter;

use donkeyops_core::{
    llm::OllamaClient,
    webhook::{WebhookEvent, WebhookError},
    DonkeyOps,
};
use donkeyops_developer_platforms::github::{
    authenticate_with_access_token, create_app_client, GitHubProvider,
};

mod config;
use config::{load_config, ServerConfig};

mod errors;
use errors::ServerError;

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;

const EVENT_HEADER: &str = "X-GitHub-Event";
const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";
const WEBHOOK_PATH: &str = "/api/donkeyops";

#[derive(Parser, Debug)]
#[command(name = "donkeyops_server", about = "DonkeyOps GitHub webhook server", version)]
struct Args {
    /// Path of the TOML configuration file
    #[arg(long, env = "DONKEYOPS_CONFIG")]
    config: Option<PathBuf>,
}

pub struct AppState {
    pub octocrab: Octocrab,
    pub llm: OllamaClient,
    pub webhook_secret: Option<String>,
}

async fn create_github_app(config: &ServerConfig) -> Result<Octocrab, ServerError> {
    info!(app_id = config.app_id, "Creating GitHub app client");

    let (octocrab, app) = create_app_client(config.app_id, &config.private_key)
        .await
        .map_err(|e| {
            ServerError::AuthError(format!(
                "Failed to load the GitHub provider. Error was: {}",
                e
            ))
        })?;

    info!(app = app.login.as_str(), "Authenticated as GitHub app");

    Ok(octocrab)
}

#[instrument(skip(_state))]
async fn handle_get_request(State(_state): State<Arc<AppState>>) -> StatusCode {
    debug!("Received health check");
    StatusCode::OK
}

#[instrument(skip(state, headers, body))]
async fn handle_post_request(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, StatusCode> {
    info!("Received webhook delivery");

    if let Some(secret) = &state.webhook_secret {
        if !verify_github_signature(secret, &headers, &body) {
            warn!("Webhook did not have valid signature");
            return Err(StatusCode::UNAUTHORIZED);
        }
        debug!("Webhook has valid signature");
    }

    let Some(event_name) = headers.get(EVENT_HEADER).and_then(|v| v.to_str().ok()) else {
        warn!("Webhook delivery did not name its event");
        return Err(StatusCode::BAD_REQUEST);
    };

    let event = WebhookEvent::from_delivery(event_name, body.as_bytes()).map_err(
        |WebhookError::InvalidPayload(name, reason)| {
            error!(
                event = name.as_str(),
                error = reason.as_str(),
                "Could not decode webhook payload"
            );
            StatusCode::BAD_REQUEST
        },
    )?;

    let Some(repository) = event.repository() else {
        info!(event = event_name, "Event type means no processing required");
        return Ok(StatusCode::OK);
    };

    let Some(installation_id) = event.installation_id() else {
        warn!(
            repository_owner = repository.owner.as_str(),
            repository = repository.name.as_str(),
            "Web hook payload did not include installation information. Cannot process changes."
        );
        return Err(StatusCode::BAD_REQUEST);
    };

    let api_with_token = authenticate_with_access_token(
        &state.octocrab,
        installation_id,
        &repository.owner,
        &repository.name,
    )
    .await
    .map_err(|e| {
        error!(
            repository_owner = repository.owner.as_str(),
            repository = repository.name.as_str(),
            error = e.to_string(),
            "Failed to authenticate with GitHub"
        );
        StatusCode::UNAUTHORIZED
    })?;

    let bot = DonkeyOps::new(GitHubProvider::new(api_with_token), state.llm.clone());
    let outcome = bot.handle_event(&event).await;

    info!(
        repository_owner = repository.owner.as_str(),
        repository = repository.name.as_str(),
        event = event_name,
        outcome = ?outcome,
        "Processed webhook delivery"
    );

    Ok(StatusCode::OK)
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("DONKEYOPS_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Checks the `X-Hub-Signature-256` header against the HMAC-SHA256 of the body.
fn verify_github_signature(secret: &str, headers: &HeaderMap, body: &str) -> bool {
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let Some(digest) = signature.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(digest) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };

    mac.update(body.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            WEBHOOK_PATH,
            get(handle_get_request).post(handle_post_request),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    init_logging();

    let args = Args::parse();
    info!("Starting DonkeyOps server");

    let config = load_config(args.config.as_deref())?;
    if config.webhook_secret.is_none() {
        warn!("No webhook secret configured. Deliveries will not be verified.");
    }

    let octocrab = create_github_app(&config).await?;
    let llm = OllamaClient::new(config.llm.clone())?;

    let state = Arc::new(AppState {
        octocrab,
        llm,
        webhook_secret: config.webhook_secret.clone(),
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(addr.as_str()).await?;

    info!("Listening on {}", addr);
    axum::serve(listener, router(state)).await?;

    Ok(())
}
