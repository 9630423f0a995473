//! Scan orchestration: inventory reconciliation, evaluation and remediation handoff.

use repo_compliance_lib::db::ComplianceStore;
use repo_compliance_lib::models::{ActionStatus, ScanStatus};

use super::support::{CATALOG_WITH_OWNER, Harness, LOG_ONLY_CONFIG, StaticConfigSource};

fn seed_two_repositories(h: &Harness) {
    h.github.add_repository(1, "good");
    h.github.add_file("good", "catalog-info.yaml", CATALOG_WITH_OWNER);
    h.github.set_workflow_permission("good", "read");

    h.github.add_repository(2, "bare");
    h.github.set_workflow_permission("bare", "write");
}

/// 1. A scan persists violations, compliance flags and log-only audit entries.
#[actix_rt::test]
async fn test_scan_records_violations_and_remediates() {
    let h = Harness::new(LOG_ONLY_CONFIG);
    seed_two_repositories(&h);

    let run = h.services.scans.run_scan().await.unwrap();
    assert_eq!(run.summary.status, ScanStatus::Completed);
    assert_eq!(run.summary.repositories_scanned, 2);
    // bare: no catalog file and write permissions; the owner check defers to presence
    assert_eq!(run.summary.violations_found, 2);
    assert!(run.summary.unsupported_policies.is_empty());

    let good = h.store.repository(1).unwrap();
    let bare = h.store.repository(2).unwrap();
    assert_eq!(good.is_compliant, Some(true));
    assert_eq!(bare.is_compliant, Some(false));
    assert!(bare.last_scanned_at.is_some());

    let mut violated: Vec<String> = h
        .store
        .violations()
        .iter()
        .filter_map(|v| h.store.policy_type_of(v.policy_id))
        .collect();
    violated.sort();
    assert_eq!(
        violated,
        vec!["correct_workflow_permissions", "has_catalog_info_yaml"]
    );

    let summary = run
        .remediation
        .expect("violations should start remediation")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 0);

    let logs = h.store.action_logs();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.action_type == "log-only"));
    assert!(logs.iter().all(|l| l.status == ActionStatus::Success));

    let scan = h
        .services
        .store
        .latest_completed_scan()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(scan.id, run.summary.scan_id);
    assert!(scan.completed_at.is_some());
}

/// 2. A clean organization completes without starting remediation.
#[actix_rt::test]
async fn test_clean_scan_starts_no_remediation() {
    let h = Harness::new(LOG_ONLY_CONFIG);
    h.github.add_repository(1, "good");
    h.github.add_file("good", "catalog-info.yaml", CATALOG_WITH_OWNER);

    let run = h.services.scans.run_scan().await.unwrap();
    assert_eq!(run.summary.status, ScanStatus::Completed);
    assert_eq!(run.summary.violations_found, 0);
    assert!(run.remediation.is_none());
    assert!(h.store.action_logs().is_empty());
}

/// 3. Repositories that left the organization are deleted with their history.
#[actix_rt::test]
async fn test_removed_repository_is_purged() {
    let h = Harness::new(LOG_ONLY_CONFIG);
    seed_two_repositories(&h);

    let first = h.services.scans.run_scan().await.unwrap();
    first.remediation.unwrap().await.unwrap().unwrap();
    assert!(h.store.violations().iter().any(|v| v.repository_id == 2));
    assert!(!h.store.action_logs().is_empty());

    h.github.remove_repository(2);
    let second = h.services.scans.run_scan().await.unwrap();

    assert_eq!(second.summary.repositories_removed, 1);
    assert!(h.store.repository(2).is_none());
    assert!(h.store.violations().iter().all(|v| v.repository_id != 2));
    assert!(h.store.action_logs().is_empty());
}

/// 4. A renamed repository keeps its identity and picks up the new name.
#[actix_rt::test]
async fn test_renamed_repository_is_updated_in_place() {
    let h = Harness::new(LOG_ONLY_CONFIG);
    seed_two_repositories(&h);
    h.services.scans.perform_scan().await.unwrap();

    h.github.rename_repository(1, "good-renamed");
    let summary = h.services.scans.perform_scan().await.unwrap();

    assert_eq!(summary.repositories_removed, 0);
    assert_eq!(h.store.repository(1).unwrap().name, "good-renamed");
    assert_eq!(h.services.store.list_repositories().await.unwrap().len(), 2);
}

/// 5. Concurrent invocations each get their own scan record.
#[actix_rt::test]
async fn test_concurrent_scans_create_separate_records() {
    let h = Harness::new(LOG_ONLY_CONFIG);
    seed_two_repositories(&h);

    let (a, b) = tokio::join!(
        h.services.scans.perform_scan(),
        h.services.scans.perform_scan()
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.scan_id, b.scan_id);
    assert_eq!(a.status, ScanStatus::Completed);
    assert_eq!(b.status, ScanStatus::Completed);
    assert_eq!(h.store.scans().len(), 2);
}

/// 6. An evaluator failure for one repository does not affect the others.
#[actix_rt::test]
async fn test_evaluator_failure_is_contained() {
    let h = Harness::new(LOG_ONLY_CONFIG);
    seed_two_repositories(&h);
    h.github.add_repository(3, "flaky");
    h.github.fail_repository("flaky");

    let run = h.services.scans.run_scan().await.unwrap();
    assert_eq!(run.summary.status, ScanStatus::Completed);
    assert_eq!(run.summary.repositories_scanned, 3);
    assert_eq!(run.summary.violations_found, 2);
    assert!(h.store.violations().iter().all(|v| v.repository_id == 2));
}

/// 7. A GitHub failure during inventory marks the scan Failed without remediation.
#[actix_rt::test]
async fn test_listing_failure_marks_scan_failed() {
    let h = Harness::new(LOG_ONLY_CONFIG);
    seed_two_repositories(&h);
    h.github.fail_repository_listing();

    let run = h.services.scans.run_scan().await.unwrap();
    assert_eq!(run.summary.status, ScanStatus::Failed);
    assert!(run.remediation.is_none());

    let scan = h
        .services
        .store
        .get_scan(run.summary.scan_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(scan.status, ScanStatus::Failed);
    assert!(scan.error_message.unwrap().contains("listing failed"));
    assert!(scan.completed_at.is_some());
    assert!(h.services.store.latest_completed_scan().await.unwrap().is_none());
}

/// 8. A missing configuration file fails the scan.
#[actix_rt::test]
async fn test_missing_configuration_fails_scan() {
    let h = Harness::with_source(StaticConfigSource::missing());
    seed_two_repositories(&h);

    let summary = h.services.scans.perform_scan().await.unwrap();
    assert_eq!(summary.status, ScanStatus::Failed);
    assert_eq!(h.github.calls("list_org_repositories"), 0);
}

/// 9. Configured types without an evaluator are catalogued and reported, not fatal.
#[actix_rt::test]
async fn test_unsupported_policy_type_is_reported() {
    let config = format!(
        "{}  - type: has_codeowners\n    action: create-issue\n",
        LOG_ONLY_CONFIG.trim_start()
    );
    let h = Harness::new(&config);
    seed_two_repositories(&h);

    let run = h.services.scans.run_scan().await.unwrap();
    assert_eq!(run.summary.status, ScanStatus::Completed);
    assert_eq!(run.summary.unsupported_policies, vec!["has_codeowners"]);

    let policies = h.services.store.list_policies().await.unwrap();
    assert_eq!(policies.len(), 4);
    let unsupported = policies
        .iter()
        .find(|p| p.policy_type == "has_codeowners")
        .unwrap();
    assert_eq!(unsupported.default_actions, vec!["create-issue"]);
}

/// 10. Rejected credentials fail the scan instead of reporting repositories compliant.
#[actix_rt::test]
async fn test_authentication_failure_marks_scan_failed() {
    let h = Harness::new(LOG_ONLY_CONFIG);
    seed_two_repositories(&h);
    h.github.revoke_credentials();

    let run = h.services.scans.run_scan().await.unwrap();
    assert_eq!(run.summary.status, ScanStatus::Failed);
    assert!(run.remediation.is_none());

    let scan = h
        .services
        .store
        .get_scan(run.summary.scan_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(scan.status, ScanStatus::Failed);
    assert!(scan.error_message.unwrap().contains("Bad credentials"));
    assert!(h.store.violations().is_empty());
    for id in [1, 2] {
        assert_eq!(h.store.repository(id).unwrap().is_compliant, None);
    }
}
