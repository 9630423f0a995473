//! Pull request webhook handling.

use serde_json::json;

use repo_compliance_lib::error::AppError;
use repo_compliance_lib::models::ActionStatus;
use repo_compliance_lib::services::WebhookOutcome;

use super::support::{CATALOG_WITH_OWNER, Harness, LOG_ONLY_CONFIG, ORG};

const PR_CONFIG: &str = r#"
access_control:
  authorized_team: acme/platform
policies:
  - type: has_catalog_info_yaml
    action: [comment-on-prs, block-prs]
    pr_comment:
      message: "Compliance problems:\n{violations}"
  - type: correct_workflow_permissions
    action: block_prs
    status_check:
      name: Policy Gate
  - type: catalog_info_has_owner
    action: create-issue
"#;

fn pull_request_payload(action: &str, number: u64, sha: &str) -> Vec<u8> {
    json!({
        "action": action,
        "number": number,
        "pull_request": {
            "number": number,
            "html_url": format!("https://github.com/{}/bare/pull/{}", ORG, number),
            "head": { "sha": sha, "ref": "feature" }
        },
        "repository": {
            "id": 7,
            "name": "bare",
            "full_name": format!("{}/bare", ORG),
            "owner": { "login": ORG, "type": "Organization" }
        }
    })
    .to_string()
    .into_bytes()
}

fn harness_with_bare_repository(config: &str) -> Harness {
    let h = Harness::new(config);
    h.github.add_repository(7, "bare");
    h.github.set_workflow_permission("bare", "write");
    h.github.add_pull_request("bare", 5, "abc123");
    h
}

/// 1. An opened pull request gets a comment and a failing check, without a scan.
#[actix_rt::test]
async fn test_opened_pull_request_is_commented_and_blocked() {
    let h = harness_with_bare_repository(PR_CONFIG);

    let outcome = h
        .services
        .webhooks
        .handle_event(
            "pull_request",
            Some("opened"),
            &pull_request_payload("opened", 5, "abc123"),
            Some("delivery-1"),
        )
        .await
        .unwrap();

    let WebhookOutcome::Processed {
        repository,
        pull_request,
        violations,
        comment,
        status_check,
    } = outcome
    else {
        panic!("expected a processed outcome");
    };
    assert_eq!(repository, "acme/bare");
    assert_eq!(pull_request, 5);
    assert_eq!(violations, 2);
    assert_eq!(comment.unwrap().status, ActionStatus::Success);
    assert_eq!(status_check.unwrap().status, ActionStatus::Success);

    let comments = h.github.comments("bare", 5);
    assert_eq!(comments.len(), 1);
    // Only the policy configured to comment is listed
    assert_eq!(comments[0].body, "Compliance problems:\n- `has_catalog_info_yaml`");

    let runs = h.github.check_runs("bare");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].name, "Policy Gate");
    assert_eq!(runs[0].head_sha, "abc123");
    assert_eq!(runs[0].conclusion.as_deref(), Some("failure"));

    assert!(h.store.scans().is_empty());
    assert_eq!(h.github.calls("create_issue"), 0);
}

/// 2. Redelivered pushes update the same check run and do not repeat the comment.
#[actix_rt::test]
async fn test_repeated_synchronize_is_idempotent() {
    let h = harness_with_bare_repository(PR_CONFIG);
    let payload = pull_request_payload("synchronize", 5, "abc123");

    for _ in 0..3 {
        h.services
            .webhooks
            .handle_event("pull_request", Some("synchronize"), &payload, None)
            .await
            .unwrap();
    }

    assert_eq!(h.github.comments("bare", 5).len(), 1);
    assert_eq!(h.github.check_runs("bare").len(), 1);
    assert_eq!(h.github.calls("create_check_run"), 1);
    assert_eq!(h.github.calls("update_check_run"), 2);
}

/// 3. A compliant repository gets a passing check and no comment.
#[actix_rt::test]
async fn test_compliant_pull_request_passes() {
    let h = harness_with_bare_repository(PR_CONFIG);
    h.github.add_file("bare", "catalog-info.yaml", CATALOG_WITH_OWNER);
    h.github.set_workflow_permission("bare", "read");

    let outcome = h
        .services
        .webhooks
        .handle_event(
            "pull_request",
            Some("reopened"),
            &pull_request_payload("reopened", 5, "def456"),
            None,
        )
        .await
        .unwrap();

    let WebhookOutcome::Processed {
        violations,
        comment,
        ..
    } = outcome
    else {
        panic!("expected a processed outcome");
    };
    assert_eq!(violations, 0);
    assert_eq!(comment.unwrap().status, ActionStatus::Skipped);
    assert!(h.github.comments("bare", 5).is_empty());

    let runs = h.github.check_runs("bare");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].conclusion.as_deref(), Some("success"));
}

/// 4. Events and actions outside pull request updates are ignored.
#[actix_rt::test]
async fn test_unhandled_deliveries_are_ignored() {
    let h = harness_with_bare_repository(PR_CONFIG);
    let webhooks = &h.services.webhooks;

    let ping = webhooks
        .handle_event("ping", None, br#"{"zen":"Keep it logically awesome."}"#, None)
        .await
        .unwrap();
    assert_eq!(
        ping,
        WebhookOutcome::Ignored {
            reason: "ping".to_string()
        }
    );

    let issues = webhooks
        .handle_event("issues", Some("opened"), b"{}", None)
        .await
        .unwrap();
    assert!(matches!(issues, WebhookOutcome::Ignored { .. }));

    let closed = webhooks
        .handle_event(
            "pull_request",
            Some("closed"),
            &pull_request_payload("closed", 5, "abc123"),
            None,
        )
        .await
        .unwrap();
    assert!(matches!(closed, WebhookOutcome::Ignored { .. }));

    assert_eq!(h.github.calls("list_issue_comments"), 0);
    assert_eq!(h.github.calls("list_check_runs"), 0);
}

/// 5. Without pull request policies there is nothing to do.
#[actix_rt::test]
async fn test_no_pull_request_policies() {
    let h = harness_with_bare_repository(LOG_ONLY_CONFIG);

    let outcome = h
        .services
        .webhooks
        .handle_event(
            "pull_request",
            Some("opened"),
            &pull_request_payload("opened", 5, "abc123"),
            None,
        )
        .await
        .unwrap();
    assert!(matches!(outcome, WebhookOutcome::Ignored { .. }));
    assert_eq!(h.github.calls("get_file_content"), 0);
}

/// 6. A pull_request delivery that is not a pull request payload is rejected.
#[actix_rt::test]
async fn test_unreadable_payload_is_invalid_input() {
    let h = harness_with_bare_repository(PR_CONFIG);

    let result = h
        .services
        .webhooks
        .handle_event("pull_request", Some("opened"), br#"{"action":"opened"}"#, None)
        .await;
    assert!(matches!(result, Err(AppError::InvalidInput(_))));
}
