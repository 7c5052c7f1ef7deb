use super::*;
use donkeyops_developer_platforms::models::Commit;

use crate::test_mocks::{pull_request, MockLlm, MockProvider};
use crate::webhook::RepositoryCoordinates;

fn commit(sha: &str, message: &str) -> Commit {
    Commit {
        sha: sha.to_string(),
        message: message.to_string(),
    }
}

fn repository() -> RepositoryCoordinates {
    RepositoryCoordinates {
        owner: "rucio".to_string(),
        name: "rucio".to_string(),
    }
}

fn pull_request_event(action: &str, title: &str) -> WebhookEvent {
    WebhookEvent::PullRequest(PullRequestEvent {
        action: action.to_string(),
        repository: repository(),
        installation_id: Some(1),
        pull_request: pull_request(7, title),
        head_ref: Some("feature".to_string()),
    })
}

fn comment_event(body: &str, sender_is_bot: bool) -> WebhookEvent {
    WebhookEvent::IssueComment(CommentEvent {
        action: "created".to_string(),
        repository: repository(),
        installation_id: Some(1),
        issue_number: 7,
        body: body.to_string(),
        sender_is_bot,
    })
}

#[tokio::test]
async fn test_opened_pull_request_reports_invalid_commits() {
    let provider = MockProvider::new().update(|s| {
        s.commits = vec![
            commit("1111111aaaa", "bad message"),
            commit("2222222bbbb", "feat(Core): fix #1"),
        ];
    });
    let bot = DonkeyOps::new(provider.clone(), MockLlm::default());

    let outcome = bot
        .handle_event(&pull_request_event("opened", "Improve things"))
        .await;

    let comments = provider.comments();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].0, 7);
    assert!(comments[0].1.contains("Found 1 commit(s)"));
    assert!(comments[0].1.contains("bad message"));
    assert!(!comments[0].1.contains("feat(Core): fix #1"));

    // The title names no component, so labels come from the valid commit.
    assert_eq!(
        outcome,
        EventOutcome::PullRequestProcessed {
            commit_report_posted: true,
            labels_added: vec!["Core".to_string()],
        }
    );
}

#[tokio::test]
async fn test_valid_commits_produce_no_comment() {
    let provider = MockProvider::new()
        .update(|s| s.commits = vec![commit("1111111aaaa", "fix(Transfers): retry on timeout #12")]);
    let bot = DonkeyOps::new(provider.clone(), MockLlm::default());

    let outcome = bot
        .handle_event(&pull_request_event("synchronize", "Transfers: retry"))
        .await;

    assert!(provider.comments().is_empty());
    assert_eq!(
        outcome,
        EventOutcome::PullRequestProcessed {
            commit_report_posted: false,
            labels_added: Vec::new(),
        }
    );
}

#[tokio::test]
async fn test_edited_pull_request_is_only_labeled() {
    let provider =
        MockProvider::new().update(|s| s.commits = vec![commit("1111111aaaa", "bad message")]);
    let bot = DonkeyOps::new(provider.clone(), MockLlm::default());

    let outcome = bot
        .handle_event(&pull_request_event("edited", "WebUI and Clients tweaks"))
        .await;

    assert!(provider.comments().is_empty());
    assert_eq!(
        outcome,
        EventOutcome::PullRequestProcessed {
            commit_report_posted: false,
            labels_added: vec!["Clients".to_string(), "WebUI".to_string()],
        }
    );
}

#[tokio::test]
async fn test_unhandled_pull_request_action_is_ignored() {
    let provider = MockProvider::new();
    let bot = DonkeyOps::new(provider.clone(), MockLlm::default());

    let outcome = bot.handle_event(&pull_request_event("closed", "Core")).await;

    assert_eq!(outcome, EventOutcome::Ignored("pull_request.closed".to_string()));
    assert!(provider.state.lock().unwrap().config_refs.is_empty());
}

#[tokio::test]
async fn test_repository_config_can_disable_both_checks() {
    let provider = MockProvider::new().update(|s| {
        s.commits = vec![commit("1111111aaaa", "bad message")];
        s.config = Some(
            "conventional_commits:\n  enabled: false\npr_labeling:\n  enabled: false\n".to_string(),
        );
    });
    let bot = DonkeyOps::new(provider.clone(), MockLlm::default());

    let outcome = bot
        .handle_event(&pull_request_event("opened", "Core fix"))
        .await;

    assert_eq!(
        outcome,
        EventOutcome::PullRequestProcessed {
            commit_report_posted: false,
            labels_added: Vec::new(),
        }
    );
    let state = provider.state.lock().unwrap();
    assert!(state.comments.is_empty());
    assert!(state.add_label_calls.is_empty());
}

#[tokio::test]
async fn test_repository_config_components_are_used() {
    let provider = MockProvider::new().update(|s| {
        s.config = Some(
            "conventional_commits:\n  valid_components:\n    - Scheduler\n".to_string(),
        );
        s.commits = vec![commit("1111111aaaa", "feat(Core): add thing #3")];
    });
    let bot = DonkeyOps::new(provider.clone(), MockLlm::default());

    bot.handle_event(&pull_request_event("opened", "Scheduler rework"))
        .await;

    let state = provider.state.lock().unwrap();
    assert_eq!(state.comments.len(), 1);
    assert!(state.comments[0].1.contains("Invalid Component Warning"));
    assert_eq!(
        state.add_label_calls,
        vec![(7, vec!["Scheduler".to_string()])]
    );
}

#[tokio::test]
async fn test_configuration_is_read_at_head_commit() {
    let provider = MockProvider::new();
    let bot = DonkeyOps::new(provider.clone(), MockLlm::default());

    bot.handle_event(&pull_request_event("opened", "Core fix"))
        .await;

    assert_eq!(
        provider.state.lock().unwrap().config_refs,
        vec![Some("head7".to_string())]
    );
}

#[tokio::test]
async fn test_commit_listing_failure_does_not_stop_labeling() {
    let provider = MockProvider::new().update(|s| s.fail_list_commits = true);
    let bot = DonkeyOps::new(provider.clone(), MockLlm::default());

    let outcome = bot
        .handle_event(&pull_request_event("opened", "Core fix"))
        .await;

    assert_eq!(
        outcome,
        EventOutcome::PullRequestProcessed {
            commit_report_posted: false,
            labels_added: vec!["Core".to_string()],
        }
    );
}

#[tokio::test]
async fn test_comment_command_is_dispatched() {
    let provider = MockProvider::new();
    let bot = DonkeyOps::new(provider.clone(), MockLlm::default());

    let outcome = bot
        .handle_event(&comment_event("Please\n/donkeyops label Core", false))
        .await;

    assert_eq!(
        outcome,
        EventOutcome::CommandExecuted(Command::Label {
            label: Some("Core".to_string())
        })
    );
    assert_eq!(
        provider.state.lock().unwrap().add_label_calls,
        vec![(7, vec!["Core".to_string()])]
    );
}

#[tokio::test]
async fn test_comment_without_command() {
    let provider = MockProvider::new();
    let bot = DonkeyOps::new(provider.clone(), MockLlm::default());

    let outcome = bot
        .handle_event(&comment_event("Looks good to me", false))
        .await;

    assert_eq!(outcome, EventOutcome::NoCommand);
    assert!(provider.comments().is_empty());
}

#[tokio::test]
async fn test_bot_comments_are_ignored() {
    let provider = MockProvider::new();
    let bot = DonkeyOps::new(provider.clone(), MockLlm::default());

    let outcome = bot
        .handle_event(&comment_event("/donkeyops close", true))
        .await;

    assert!(matches!(outcome, EventOutcome::Ignored(_)));
    let state = provider.state.lock().unwrap();
    assert!(state.state_changes.is_empty());
    assert!(state.comments.is_empty());
}

#[tokio::test]
async fn test_edited_comments_are_ignored() {
    let provider = MockProvider::new();
    let bot = DonkeyOps::new(provider.clone(), MockLlm::default());

    let event = WebhookEvent::IssueComment(CommentEvent {
        action: "edited".to_string(),
        repository: repository(),
        installation_id: None,
        issue_number: 7,
        body: "/donkeyops close".to_string(),
        sender_is_bot: false,
    });

    assert_eq!(
        bot.handle_event(&event).await,
        EventOutcome::Ignored("issue_comment.edited".to_string())
    );
}

#[tokio::test]
async fn test_opened_issue_body_is_parsed_for_commands() {
    let provider = MockProvider::new();
    let bot = DonkeyOps::new(provider.clone(), MockLlm::default());

    let event = WebhookEvent::Issues(CommentEvent {
        action: "opened".to_string(),
        repository: repository(),
        installation_id: None,
        issue_number: 9,
        body: "/donkeyops assign @octocat".to_string(),
        sender_is_bot: false,
    });

    let outcome = bot.handle_event(&event).await;

    assert_eq!(
        outcome,
        EventOutcome::CommandExecuted(Command::Assign {
            user: Some("octocat".to_string())
        })
    );
    assert_eq!(
        provider.state.lock().unwrap().assigned,
        vec![(9, vec!["octocat".to_string()])]
    );
}

#[tokio::test]
async fn test_other_events_are_ignored() {
    let bot = DonkeyOps::new(MockProvider::new(), MockLlm::default());

    let outcome = bot.handle_event(&WebhookEvent::Other("push".to_string())).await;

    assert_eq!(outcome, EventOutcome::Ignored("push".to_string()));
}
