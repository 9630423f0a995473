//! Remediation actions: idempotent side effects and per-action isolation.

use repo_compliance_lib::models::{ActionStatus, Violation};
use repo_compliance_lib::services::actions::{COMMENT_HEADER, build_comment};

use super::support::{Harness, single_policy_config};

/// Run one scan over a single non-compliant repository and wait for remediation.
async fn scan_and_remediate(h: &Harness) -> uuid::Uuid {
    let run = h.services.scans.run_scan().await.unwrap();
    if let Some(remediation) = run.remediation {
        remediation.await.unwrap().unwrap();
    }
    run.summary.scan_id
}

fn bare_repository(h: &Harness) {
    h.github.add_repository(7, "bare");
}

/// 1. create-issue opens one issue and skips on later scans.
#[actix_rt::test]
async fn test_create_issue_is_idempotent() {
    let h = Harness::new(&single_policy_config("has_catalog_info_yaml", "create-issue"));
    bare_repository(&h);

    scan_and_remediate(&h).await;
    scan_and_remediate(&h).await;

    assert_eq!(h.github.calls("create_issue"), 1);
    let issues = h.github.issues("bare");
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].title, "Compliance violation: has_catalog_info_yaml");

    let logs = h.store.action_logs();
    assert_eq!(logs.len(), 2);
    let created = logs
        .iter()
        .find(|l| l.status == ActionStatus::Success)
        .unwrap();
    assert!(created.details.starts_with("Created issue #"));
    let skipped = logs
        .iter()
        .find(|l| l.status == ActionStatus::Skipped)
        .unwrap();
    assert!(skipped.details.contains("already exists"));
}

/// 2. An open issue with the same title, in any case, counts as existing.
#[actix_rt::test]
async fn test_existing_issue_title_matches_case_insensitively() {
    let h = Harness::new(&single_policy_config("has_catalog_info_yaml", "create-issue"));
    bare_repository(&h);
    h.github.add_open_issue(
        "bare",
        "  COMPLIANCE VIOLATION: has_catalog_info_yaml ",
        "compliance",
    );

    scan_and_remediate(&h).await;

    assert_eq!(h.github.calls("create_issue"), 0);
    assert_eq!(h.store.action_logs()[0].status, ActionStatus::Skipped);
}

/// 3. Issue title and labels come from the policy's issue settings.
#[actix_rt::test]
async fn test_issue_settings_are_applied() {
    let config = "access_control:\n  authorized_team: acme/platform\npolicies:\n  - type: has_catalog_info_yaml\n    action: create-issue\n    issue:\n      title: Add a catalog file\n      labels: [backstage, compliance]\n";
    let h = Harness::new(config);
    bare_repository(&h);
    // Same title under a different label is not a duplicate
    h.github.add_open_issue("bare", "Add a catalog file", "compliance");

    scan_and_remediate(&h).await;

    assert_eq!(h.github.calls("create_issue"), 1);
    let titles: Vec<String> = h.github.issues("bare").into_iter().map(|i| i.title).collect();
    assert_eq!(titles, vec!["Add a catalog file", "Add a catalog file"]);
}

/// 4. archive-repo skips repositories that are already archived.
#[actix_rt::test]
async fn test_archive_skips_archived_repository() {
    let h = Harness::new(&single_policy_config("has_catalog_info_yaml", "archive-repo"));
    bare_repository(&h);
    h.github.set_archived(7, true);

    scan_and_remediate(&h).await;

    assert_eq!(h.github.calls("archive_repository"), 0);
    let log = &h.store.action_logs()[0];
    assert_eq!(log.status, ActionStatus::Skipped);
    assert!(log.details.contains("already archived"));
}

/// 5. archive-repo archives an active repository.
#[actix_rt::test]
async fn test_archive_archives_active_repository() {
    let h = Harness::new(&single_policy_config("has_catalog_info_yaml", "archive_repo"));
    bare_repository(&h);

    scan_and_remediate(&h).await;

    assert!(h.github.is_archived(7));
    let log = &h.store.action_logs()[0];
    assert_eq!(log.status, ActionStatus::Success);
    assert_eq!(log.action_type, "archive_repo");
}

/// 6. A repository deleted upstream fails the archive action without aborting the batch.
#[actix_rt::test]
async fn test_archive_of_deleted_repository_is_recorded_as_failed() {
    let h = Harness::new(&single_policy_config("has_catalog_info_yaml", "log-only"));
    bare_repository(&h);
    let scan_id = scan_and_remediate(&h).await;

    h.source.set(&single_policy_config(
        "has_catalog_info_yaml",
        "[archive-repo, log-only]",
    ));
    h.services.config.get_config(true).await.unwrap();
    h.github.remove_repository(7);

    let summary = h
        .services
        .executor
        .process_actions_for_scan(scan_id)
        .await
        .unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.succeeded, 1);

    let failed = h
        .store
        .action_logs()
        .into_iter()
        .find(|l| l.status == ActionStatus::Failed)
        .unwrap();
    assert_eq!(failed.action_type, "archive-repo");
    assert!(failed.details.contains("was not found"));
}

/// 7. Unknown actions are logged as failed and the remaining actions still run.
#[actix_rt::test]
async fn test_unknown_action_is_recorded_and_isolated() {
    let h = Harness::new(&single_policy_config(
        "has_catalog_info_yaml",
        "[delete-repo, Log_Only]",
    ));
    bare_repository(&h);

    scan_and_remediate(&h).await;

    let logs = h.store.action_logs();
    assert_eq!(logs.len(), 2);
    let unknown = logs.iter().find(|l| l.action_type == "delete-repo").unwrap();
    assert_eq!(unknown.status, ActionStatus::Failed);
    assert_eq!(unknown.details, "Unknown action: delete-repo");
    let logged = logs.iter().find(|l| l.action_type == "Log_Only").unwrap();
    assert_eq!(logged.status, ActionStatus::Success);
}

/// 8. comment-on-prs comments once per pull request across scans and policies.
#[actix_rt::test]
async fn test_pull_request_comments_are_not_duplicated() {
    let config = "access_control:\n  authorized_team: acme/platform\npolicies:\n  - type: has_catalog_info_yaml\n    action: comment-on-prs\n  - type: correct_workflow_permissions\n    action: comment_on_prs\n";
    let h = Harness::new(config);
    bare_repository(&h);
    h.github.set_workflow_permission("bare", "write");
    h.github.add_pull_request("bare", 11, "sha-11");
    h.github.add_pull_request("bare", 12, "sha-12");

    scan_and_remediate(&h).await;

    for pr in [11, 12] {
        let comments = h.github.comments("bare", pr);
        assert_eq!(comments.len(), 1);
        assert!(comments[0].body.starts_with(COMMENT_HEADER));
        assert!(comments[0].body.contains("`has_catalog_info_yaml`"));
        assert!(comments[0].body.contains("`correct_workflow_permissions`"));
    }

    let logs = h.store.action_logs();
    assert_eq!(logs.len(), 2);
    assert_eq!(
        logs.iter().filter(|l| l.status == ActionStatus::Success).count(),
        1
    );
    assert!(
        logs.iter()
            .any(|l| l.status == ActionStatus::Skipped && l.details.contains("already applied"))
    );

    scan_and_remediate(&h).await;
    assert_eq!(h.github.calls("create_issue_comment"), 2);
}

/// 9. Comments by people do not count as an earlier compliance comment.
#[actix_rt::test]
async fn test_human_comment_does_not_suppress_bot_comment() {
    let h = Harness::new(&single_policy_config("has_catalog_info_yaml", "comment-on-prs"));
    bare_repository(&h);
    h.github.add_pull_request("bare", 3, "sha-3");
    let pasted = build_comment(&[Violation::new("has_catalog_info_yaml", "missing")], None);
    h.github.add_comment("bare", 3, &pasted, "octocat", "User");

    scan_and_remediate(&h).await;

    assert_eq!(h.github.comments("bare", 3).len(), 2);
}

/// 10. block-prs updates a matching check run in place.
#[actix_rt::test]
async fn test_block_prs_updates_existing_check_run() {
    let h = Harness::new(&single_policy_config("has_catalog_info_yaml", "block-prs"));
    bare_repository(&h);
    h.github.add_pull_request("bare", 5, "sha-5");
    let existing = h.github.add_check_run("bare", "compliance check", "sha-5");

    scan_and_remediate(&h).await;

    assert_eq!(h.github.calls("create_check_run"), 0);
    let runs = h.github.check_runs("bare");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].id, existing);
    assert_eq!(runs[0].status, "completed");
    assert_eq!(runs[0].conclusion.as_deref(), Some("failure"));
}

/// 11. Pull request actions skip repositories without open pull requests.
#[actix_rt::test]
async fn test_pull_request_actions_skip_without_open_prs() {
    let h = Harness::new(&single_policy_config(
        "has_catalog_info_yaml",
        "[comment-on-prs, block-prs]",
    ));
    bare_repository(&h);

    scan_and_remediate(&h).await;

    let logs = h.store.action_logs();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.status == ActionStatus::Skipped));
    assert!(logs[0].details.contains("No open pull requests"));
}

/// 12. A passing pull request gets a success check and no comment.
#[actix_rt::test]
async fn test_clean_pull_request_gets_success_check() {
    let h = Harness::new(&single_policy_config("has_catalog_info_yaml", "block-prs"));
    let repo = h.repo(7, "bare");
    bare_repository(&h);

    let comment = h
        .services
        .executor
        .comment_on_pull_request(&repo, 1, &[], None)
        .await
        .unwrap();
    assert_eq!(comment.status, ActionStatus::Skipped);
    assert_eq!(h.github.calls("create_issue_comment"), 0);

    let check = h
        .services
        .executor
        .update_pull_request_status_check(&repo, "sha-1", &[], Some("Policy Gate"))
        .await
        .unwrap();
    assert_eq!(check.status, ActionStatus::Success);

    let runs = h.github.check_runs("bare");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].name, "Policy Gate");
    assert_eq!(runs[0].head_sha, "sha-1");
    assert_eq!(runs[0].conclusion.as_deref(), Some("success"));

    // Repeated pushes to the same commit reuse the check run
    let violations = vec![Violation::new("has_catalog_info_yaml", "missing")];
    for _ in 0..2 {
        h.services
            .executor
            .update_pull_request_status_check(&repo, "sha-2", &violations, None)
            .await
            .unwrap();
    }
    let on_sha: Vec<_> = h
        .github
        .check_runs("bare")
        .into_iter()
        .filter(|r| r.head_sha == "sha-2")
        .collect();
    assert_eq!(on_sha.len(), 1);
    assert_eq!(on_sha[0].name, "Compliance Check");
    assert_eq!(on_sha[0].conclusion.as_deref(), Some("failure"));
}

/// 13. Pull request comments list only violations of policies that request them.
#[actix_rt::test]
async fn test_pull_request_comment_lists_only_requesting_policies() {
    let config = "access_control:\n  authorized_team: acme/platform\npolicies:\n  - type: has_catalog_info_yaml\n    action: log-only\n    pr_comment:\n      message: Catalog template\n  - type: correct_workflow_permissions\n    action: comment-on-prs\n";
    let h = Harness::new(config);
    bare_repository(&h);
    h.github.set_workflow_permission("bare", "write");
    h.github.add_pull_request("bare", 11, "sha-11");

    scan_and_remediate(&h).await;

    let comments = h.github.comments("bare", 11);
    assert_eq!(comments.len(), 1);
    assert!(comments[0].body.starts_with(COMMENT_HEADER));
    assert!(comments[0].body.contains("`correct_workflow_permissions`"));
    assert!(!comments[0].body.contains("has_catalog_info_yaml"));

    let logs = h.store.action_logs();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.status == ActionStatus::Success));
}

/// 14. A refused archive is recorded as a permission failure and other actions still run.
#[actix_rt::test]
async fn test_forbidden_archive_is_recorded_as_failed() {
    let h = Harness::new(&single_policy_config(
        "has_catalog_info_yaml",
        "[archive-repo, log-only]",
    ));
    bare_repository(&h);
    h.github.forbid_archive();

    scan_and_remediate(&h).await;

    assert!(!h.github.is_archived(7));
    let logs = h.store.action_logs();
    assert_eq!(logs.len(), 2);
    let failed: Vec<_> = logs
        .iter()
        .filter(|l| l.status == ActionStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].action_type, "archive-repo");
    assert!(failed[0].details.contains("Insufficient permissions"));
    let logged = logs.iter().find(|l| l.action_type == "log-only").unwrap();
    assert_eq!(logged.status, ActionStatus::Success);
}

/// 15. Repository locks are released once remediation and webhook actions finish.
#[actix_rt::test]
async fn test_repository_locks_are_released() {
    let h = Harness::new(&single_policy_config(
        "has_catalog_info_yaml",
        "[comment-on-prs, block-prs]",
    ));
    let repo = h.repo(7, "bare");
    bare_repository(&h);
    h.github.add_pull_request("bare", 4, "sha-4");

    scan_and_remediate(&h).await;
    assert_eq!(h.services.executor.locked_repositories(), 0);

    let violations = vec![Violation::new("has_catalog_info_yaml", "missing")];
    h.services
        .executor
        .comment_on_pull_request(&repo, 4, &violations, None)
        .await
        .unwrap();
    h.services
        .executor
        .update_pull_request_status_check(&repo, "sha-4", &violations, None)
        .await
        .unwrap();
    assert_eq!(h.services.executor.locked_repositories(), 0);
}
