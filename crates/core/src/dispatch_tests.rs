use super::*;
use crate::commands::{parse_slash_command, Command};
use crate::test_mocks::{pull_request, MockLlm, MockProvider};

const OWNER: &str = "rucio";
const REPO: &str = "rucio";

async fn run(provider: &MockProvider, llm: &MockLlm, number: u64, body: &str) {
    let command: Command = parse_slash_command(body)
        .expect("Test body should contain a command")
        .into();
    dispatch_command(provider, llm, OWNER, REPO, number, &command).await;
}

fn provider_with_pr() -> MockProvider {
    MockProvider::new()
        .with_pull_request(pull_request(7, "feat(Core): add replica expiry #7"))
        .update(|s| s.diff = "+expiry = 3".to_string())
}

#[tokio::test]
async fn test_label_adds_first_argument() {
    let provider = provider_with_pr();
    let llm = MockLlm::default();

    run(&provider, &llm, 7, "/donkeyops label Core extra").await;

    let state = provider.state.lock().unwrap();
    assert_eq!(state.add_label_calls, vec![(7, vec!["Core".to_string()])]);
    assert!(state.comments.is_empty());
}

#[tokio::test]
async fn test_label_without_argument_posts_usage() {
    let provider = provider_with_pr();
    let llm = MockLlm::default();

    run(&provider, &llm, 7, "/donkeyops label").await;

    let comments = provider.comments();
    assert_eq!(comments.len(), 1);
    assert!(comments[0].1.contains("Usage: `/donkeyops label <label>`"));
    assert!(provider.state.lock().unwrap().add_label_calls.is_empty());
}

#[tokio::test]
async fn test_unlabel_removes_label() {
    let provider = provider_with_pr();
    let llm = MockLlm::default();

    run(&provider, &llm, 7, "/donkeyops unlabel Core").await;

    assert_eq!(
        provider.state.lock().unwrap().removed_labels,
        vec![(7, "Core".to_string())]
    );
}

#[tokio::test]
async fn test_unlabel_failure_posts_generic_error() {
    let provider = provider_with_pr().update(|s| s.fail_remove_label = true);
    let llm = MockLlm::default();

    run(&provider, &llm, 7, "/donkeyops unlabel Core").await;

    let comments = provider.comments();
    assert_eq!(comments.len(), 1);
    assert!(comments[0].1.contains("Failed to execute command `unlabel`"));
}

#[tokio::test]
async fn test_close_works_on_plain_issue() {
    let provider = MockProvider::new();
    let llm = MockLlm::default();

    run(&provider, &llm, 3, "/donkeyops close").await;

    assert_eq!(
        provider.state.lock().unwrap().state_changes,
        vec![(3, IssueState::Closed)]
    );
}

#[tokio::test]
async fn test_assign_and_unassign_strip_at_sign() {
    let provider = MockProvider::new();
    let llm = MockLlm::default();

    run(&provider, &llm, 3, "/donkeyops assign @octocat").await;
    run(&provider, &llm, 3, "/donkeyops unassign hubot").await;

    let state = provider.state.lock().unwrap();
    assert_eq!(state.assigned, vec![(3, vec!["octocat".to_string()])]);
    assert_eq!(state.unassigned, vec![(3, vec!["hubot".to_string()])]);
}

#[tokio::test]
async fn test_assign_without_user_posts_usage() {
    let provider = MockProvider::new();
    let llm = MockLlm::default();

    run(&provider, &llm, 3, "/donkeyops assign").await;

    let comments = provider.comments();
    assert_eq!(comments.len(), 1);
    assert!(comments[0].1.contains("Usage: `/donkeyops assign <username>`"));
}

#[tokio::test]
async fn test_approve_submits_fixed_review() {
    let provider = provider_with_pr();
    let llm = MockLlm::default();

    run(&provider, &llm, 7, "/donkeyops approve").await;

    assert_eq!(
        provider.state.lock().unwrap().created_reviews,
        vec![(7, ReviewEvent::Approve, APPROVAL_BODY.to_string())]
    );
}

#[tokio::test]
async fn test_review_posts_llm_answer() {
    let provider = provider_with_pr();
    let llm = MockLlm::responding("Looks good to me.");

    run(&provider, &llm, 7, "/donkeyops review").await;

    let comments = provider.comments();
    assert_eq!(comments.len(), 1);
    assert!(comments[0].1.contains("Looks good to me."));

    let prompts = llm.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("+expiry = 3"));
    assert!(prompts[0].contains("feat(Core): add replica expiry #7"));
}

#[tokio::test]
async fn test_summary_posts_llm_answer() {
    let provider = provider_with_pr();
    let llm = MockLlm::responding("Adds replica expiry.");

    run(&provider, &llm, 7, "/donkeyops summary").await;

    let comments = provider.comments();
    assert_eq!(comments.len(), 1);
    assert!(comments[0].1.contains("Summary"));
    assert!(comments[0].1.contains("Adds replica expiry."));
}

#[tokio::test]
async fn test_ask_sends_joined_question() {
    let provider = provider_with_pr();
    let llm = MockLlm::responding("Yes.");

    run(&provider, &llm, 7, "/donkeyops ask is the expiry   configurable?").await;

    let prompts = llm.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("is the expiry configurable?"));

    let comments = provider.comments();
    assert!(comments[0].1.contains("Yes."));
    assert!(comments[0].1.contains("is the expiry configurable?"));
}

#[tokio::test]
async fn test_ask_without_question_on_pull_request() {
    let provider = provider_with_pr();
    let llm = MockLlm::responding("unused");

    run(&provider, &llm, 7, "/donkeyops ask").await;

    let comments = provider.comments();
    assert_eq!(comments.len(), 1);
    assert!(comments[0].1.contains("Please provide a question"));
    assert!(llm.prompts().is_empty());
}

#[tokio::test]
async fn test_llm_commands_on_plain_issue_never_call_llm() {
    for (body, command) in [
        ("/donkeyops review", "review"),
        ("/donkeyops summary", "summary"),
        ("/donkeyops ask what is this?", "ask"),
        ("/donkeyops ask", "ask"),
    ] {
        let provider = MockProvider::new();
        let llm = MockLlm::responding("unused");

        run(&provider, &llm, 3, body).await;

        let comments = provider.comments();
        assert_eq!(comments.len(), 1, "{} should post one comment", body);
        assert!(comments[0].1.contains(&format!(
            "The `/donkeyops {}` command is only available for pull requests.",
            command
        )));
        assert!(llm.prompts().is_empty(), "{} must not call the LLM", body);
    }
}

#[tokio::test]
async fn test_llm_failure_names_port() {
    for (body, expected) in [
        ("/donkeyops review", "Failed to perform review"),
        ("/donkeyops summary", "Failed to generate summary"),
        ("/donkeyops ask why?", "Failed to answer the question"),
    ] {
        let provider = provider_with_pr();
        let llm = MockLlm::failing(503);

        run(&provider, &llm, 7, body).await;

        let comments = provider.comments();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].1.contains(expected));
        assert!(comments[0].1.contains("11434"));
    }
}

#[tokio::test]
async fn test_llm_failure_names_configured_port() {
    let provider = provider_with_pr();
    let llm = MockLlm {
        port: Some(8080),
        ..MockLlm::failing(500)
    };

    run(&provider, &llm, 7, "/donkeyops review").await;

    let comments = provider.comments();
    assert_eq!(comments.len(), 1);
    assert_eq!(
        comments[0].1,
        "Failed to perform review. Make sure the Ollama service is running locally on port 8080."
    );
}

#[tokio::test]
async fn test_diff_failure_is_not_reported_as_llm_failure() {
    let provider = provider_with_pr().update(|s| s.fail_diff = true);
    let llm = MockLlm::responding("unused");

    run(&provider, &llm, 7, "/donkeyops summary").await;

    let comments = provider.comments();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].1, "Failed to execute command `summary`.");
    assert!(llm.prompts().is_empty());
}

#[tokio::test]
async fn test_unknown_command_posts_help() {
    let provider = MockProvider::new();
    let llm = MockLlm::default();

    run(&provider, &llm, 3, "/donkeyops dance").await;

    let comments = provider.comments();
    assert_eq!(comments.len(), 1);
    for command in [
        "label", "unlabel", "close", "assign", "unassign", "approve", "review", "summary", "ask",
    ] {
        assert!(
            comments[0].1.contains(&format!("/donkeyops {}", command)),
            "Help should mention {}",
            command
        );
    }
}

#[tokio::test]
async fn test_command_names_are_exact_case() {
    let provider = MockProvider::new();
    let llm = MockLlm::default();

    run(&provider, &llm, 3, "/donkeyops Close").await;

    assert!(provider.state.lock().unwrap().state_changes.is_empty());
    assert!(provider.comments()[0].1.contains("Available DonkeyOps commands"));
}
