//! Policy evaluators run through the evaluation engine.

use std::sync::Arc;

use async_trait::async_trait;

use repo_compliance_lib::error::GitHubError;
use repo_compliance_lib::models::{AppConfig, PolicyConfig, RepositoryRef, Violation};
use repo_compliance_lib::services::PolicyEngine;
use repo_compliance_lib::services::policies::{
    CATALOG_INFO_HAS_OWNER, CORRECT_WORKFLOW_PERMISSIONS, HAS_CATALOG_INFO_YAML, PolicyEvaluator,
};

use super::support::{CATALOG_WITH_OWNER, FakeGitHub, LOG_ONLY_CONFIG, ORG};

fn all_policies() -> Vec<PolicyConfig> {
    AppConfig::parse(LOG_ONLY_CONFIG).unwrap().policies
}

fn repo(name: &str) -> RepositoryRef {
    RepositoryRef::new(1, ORG, name)
}

async fn violated_types(github: Arc<FakeGitHub>, name: &str) -> Vec<String> {
    let engine = PolicyEngine::with_default_evaluators(github);
    engine
        .evaluate_repository(&repo(name), &all_policies())
        .await
        .unwrap()
        .into_iter()
        .map(|v| v.policy_type)
        .collect()
}

/// 1. A missing manifest is reported once, by the presence policy.
#[actix_rt::test]
async fn test_missing_catalog_is_a_presence_violation_only() {
    let github = Arc::new(FakeGitHub::new());

    let violated = violated_types(github, "svc").await;
    assert_eq!(violated, vec![HAS_CATALOG_INFO_YAML]);
}

/// 2. A manifest with an owner satisfies both catalog policies.
#[actix_rt::test]
async fn test_catalog_with_owner_is_compliant() {
    let github = Arc::new(FakeGitHub::new());
    github.add_file("svc", "catalog-info.yaml", CATALOG_WITH_OWNER);

    assert!(violated_types(github, "svc").await.is_empty());
}

/// 3. Manifests without a usable owner violate the owner policy.
#[actix_rt::test]
async fn test_catalog_without_owner_violates_owner_policy() {
    for manifest in [
        "apiVersion: backstage.io/v1alpha1\nkind: Component\n",
        "spec:\n  type: service\n",
        "spec:\n  owner: '   '\n",
        "spec: [not, a, mapping]\n",
        "spec:\n  owner: [a, b]\n",
        "spec: {owner: : :\n",
    ] {
        let github = Arc::new(FakeGitHub::new());
        github.add_file("svc", "catalog-info.yaml", manifest);

        let violated = violated_types(github, "svc").await;
        assert_eq!(violated, vec![CATALOG_INFO_HAS_OWNER], "manifest: {:?}", manifest);
    }
}

/// 4. Only the exact secure workflow permission is compliant; no setting is compliant.
#[actix_rt::test]
async fn test_workflow_permissions() {
    let cases = [
        (Some("read"), false),
        (Some("write"), true),
        (Some("Read"), true),
        (None, false),
    ];

    for (permission, expect_violation) in cases {
        let github = Arc::new(FakeGitHub::new());
        github.add_file("svc", "catalog-info.yaml", CATALOG_WITH_OWNER);
        if let Some(value) = permission {
            github.set_workflow_permission("svc", value);
        }

        let violated = violated_types(github, "svc").await;
        assert_eq!(
            violated.contains(&CORRECT_WORKFLOW_PERMISSIONS.to_string()),
            expect_violation,
            "permission: {:?}",
            permission
        );
    }
}

/// 5. Configured types without an evaluator are skipped.
#[actix_rt::test]
async fn test_unknown_policy_type_is_skipped() {
    let github = Arc::new(FakeGitHub::new());
    let engine = PolicyEngine::with_default_evaluators(github);
    let config = AppConfig::parse(
        "access_control:\n  authorized_team: acme/platform\npolicies:\n  - type: has_codeowners\n",
    )
    .unwrap();

    assert!(!engine.supports("has_codeowners"));
    assert!(
        engine
            .evaluate_repository(&repo("svc"), &config.policies)
            .await
            .unwrap()
            .is_empty()
    );
}

struct Broken;

#[async_trait]
impl PolicyEvaluator for Broken {
    fn policy_type_key(&self) -> &str {
        "broken"
    }

    fn description(&self) -> &str {
        "Always errors"
    }

    async fn evaluate(&self, _repo: &RepositoryRef) -> Result<Option<Violation>, GitHubError> {
        Err(GitHubError::RateLimited { reset_at: None })
    }
}

struct AlwaysViolated;

#[async_trait]
impl PolicyEvaluator for AlwaysViolated {
    fn policy_type_key(&self) -> &str {
        "always"
    }

    fn description(&self) -> &str {
        "Always violated"
    }

    async fn evaluate(&self, _repo: &RepositoryRef) -> Result<Option<Violation>, GitHubError> {
        Ok(Some(Violation::new("always", "violated")))
    }
}

/// 6. An erroring evaluator records nothing and does not stop the others.
#[actix_rt::test]
async fn test_evaluator_error_is_no_determination() {
    let engine = PolicyEngine::new(vec![Arc::new(Broken), Arc::new(AlwaysViolated)]);
    let config = AppConfig::parse(
        "access_control:\n  authorized_team: acme/platform\npolicies:\n  - type: broken\n  - type: always\n",
    )
    .unwrap();

    let violations = engine
        .evaluate_repository(&repo("svc"), &config.policies)
        .await
        .unwrap();
    assert_eq!(violations, vec![Violation::new("always", "violated")]);
}

struct Unauthenticated;

#[async_trait]
impl PolicyEvaluator for Unauthenticated {
    fn policy_type_key(&self) -> &str {
        "unauthenticated"
    }

    fn description(&self) -> &str {
        "Cannot obtain a token"
    }

    async fn evaluate(&self, _repo: &RepositoryRef) -> Result<Option<Violation>, GitHubError> {
        Err(GitHubError::Authentication("token exchange failed".to_string()))
    }
}

/// 7. An authentication failure is returned instead of reading as compliant.
#[actix_rt::test]
async fn test_authentication_failure_is_returned() {
    let engine = PolicyEngine::new(vec![Arc::new(AlwaysViolated), Arc::new(Unauthenticated)]);
    let config = AppConfig::parse(
        "access_control:\n  authorized_team: acme/platform\npolicies:\n  - type: always\n  - type: unauthenticated\n",
    )
    .unwrap();

    let result = engine
        .evaluate_repository(&repo("svc"), &config.policies)
        .await;
    assert!(matches!(result, Err(GitHubError::Authentication(_))));
}
