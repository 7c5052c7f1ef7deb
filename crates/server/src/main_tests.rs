use super::{handle_get_request, handle_post_request, verify_github_signature, AppState};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
};
use donkeyops_core::llm::{LlmSettings, OllamaClient};
use hmac::{Hmac, Mac};
use octocrab::Octocrab;
use serde_json::json;
use sha2::Sha256;
use std::sync::Arc;

fn state(webhook_secret: Option<&str>) -> Arc<AppState> {
    Arc::new(AppState {
        octocrab: Octocrab::default(),
        llm: OllamaClient::new(LlmSettings::default()).unwrap(),
        webhook_secret: webhook_secret.map(|s| s.to_string()),
    })
}

fn sign(secret: &str, body: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body.as_bytes());
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

fn headers_for(event: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("X-GitHub-Event", event.parse().unwrap());
    headers
}

#[test]
fn test_verify_github_signature_valid_signature() {
    let mut headers = HeaderMap::new();
    headers.insert(
        "X-Hub-Signature-256",
        sign("test_secret", "test_body").parse().unwrap(),
    );

    assert!(
        verify_github_signature("test_secret", &headers, "test_body"),
        "Signature verification should pass with a valid signature"
    );
}

#[test]
fn test_verify_github_signature_wrong_secret() {
    let mut headers = HeaderMap::new();
    headers.insert(
        "X-Hub-Signature-256",
        sign("other_secret", "test_body").parse().unwrap(),
    );

    assert!(!verify_github_signature("test_secret", &headers, "test_body"));
}

#[test]
fn test_verify_github_signature_invalid_signature() {
    let mut headers = HeaderMap::new();
    headers.insert(
        "X-Hub-Signature-256",
        "sha256=invalid_signature".parse().unwrap(),
    );

    assert!(
        !verify_github_signature("test_secret", &headers, "test_body"),
        "Signature verification should fail with an invalid signature"
    );
}

#[test]
fn test_verify_github_signature_missing_prefix() {
    let signature = sign("test_secret", "test_body");
    let mut headers = HeaderMap::new();
    headers.insert(
        "X-Hub-Signature-256",
        signature.trim_start_matches("sha256=").parse().unwrap(),
    );

    assert!(!verify_github_signature("test_secret", &headers, "test_body"));
}

#[test]
fn test_verify_github_signature_missing_header() {
    let headers = HeaderMap::new();

    assert!(
        !verify_github_signature("test_secret", &headers, "test_body"),
        "Signature verification should fail when the header is missing"
    );
}

#[tokio::test]
async fn test_health_check() {
    assert_eq!(handle_get_request(State(state(None))).await, StatusCode::OK);
}

#[tokio::test]
async fn test_handle_post_request_invalid_signature() {
    let body = json!({ "zen": "Keep it logically awesome." }).to_string();

    let result =
        handle_post_request(State(state(Some("secret"))), headers_for("ping"), body).await;

    assert_eq!(result, Err(StatusCode::UNAUTHORIZED));
}

#[tokio::test]
async fn test_handle_post_request_signed_ping_is_accepted() {
    let body = json!({ "zen": "Keep it logically awesome." }).to_string();
    let mut headers = headers_for("ping");
    headers.insert(
        "X-Hub-Signature-256",
        sign("secret", &body).parse().unwrap(),
    );

    let result = handle_post_request(State(state(Some("secret"))), headers, body).await;

    assert_eq!(result, Ok(StatusCode::OK));
}

#[tokio::test]
async fn test_handle_post_request_without_event_name() {
    let result = handle_post_request(State(state(None)), HeaderMap::new(), "{}".to_string()).await;

    assert_eq!(result, Err(StatusCode::BAD_REQUEST));
}

#[tokio::test]
async fn test_handle_post_request_undecodable_payload() {
    let result = handle_post_request(
        State(state(None)),
        headers_for("pull_request"),
        "{}".to_string(),
    )
    .await;

    assert_eq!(result, Err(StatusCode::BAD_REQUEST));
}

#[tokio::test]
async fn test_handle_post_request_without_installation() {
    let body = json!({
        "action": "created",
        "repository": {
            "name": "rucio",
            "owner": { "login": "rucio" }
        },
        "issue": { "number": 1 },
        "comment": { "body": "/donkeyops close" }
    })
    .to_string();

    let result =
        handle_post_request(State(state(None)), headers_for("issue_comment"), body).await;

    assert_eq!(result, Err(StatusCode::BAD_REQUEST));
}
