//! Runs the configured subset of evaluators against one repository.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::error::GitHubError;
use crate::models::{PolicyConfig, RepositoryRef, Violation};

use super::github_client::GitHubApi;
use super::policies::{
    CATALOG_INFO_PATH, CatalogOwnerEvaluator, FilePresenceEvaluator, HAS_CATALOG_INFO_YAML,
    PolicyEvaluator, WorkflowPermissionsEvaluator,
};

pub struct PolicyEngine {
    evaluators: HashMap<String, Arc<dyn PolicyEvaluator>>,
}

impl PolicyEngine {
    pub fn new(evaluators: Vec<Arc<dyn PolicyEvaluator>>) -> Self {
        let evaluators = evaluators
            .into_iter()
            .map(|e| (e.policy_type_key().to_string(), e))
            .collect();
        Self { evaluators }
    }

    /// Engine with every compiled-in evaluator.
    pub fn with_default_evaluators(github: Arc<dyn GitHubApi>) -> Self {
        Self::new(vec![
            Arc::new(FilePresenceEvaluator::new(
                github.clone(),
                HAS_CATALOG_INFO_YAML,
                CATALOG_INFO_PATH,
            )),
            Arc::new(CatalogOwnerEvaluator::new(github.clone())),
            Arc::new(WorkflowPermissionsEvaluator::new(github)),
        ])
    }

    pub fn supports(&self, policy_type: &str) -> bool {
        self.evaluators.contains_key(policy_type)
    }

    pub fn evaluator(&self, policy_type: &str) -> Option<&Arc<dyn PolicyEvaluator>> {
        self.evaluators.get(policy_type)
    }

    /// Violations of `policies` for `repo`, in configuration order.
    ///
    /// Types without an evaluator are skipped. An evaluator that errors counts as
    /// "no determination" and does not affect the others, except for an authentication
    /// failure: without a token no evaluator can reach GitHub, so it is returned.
    pub async fn evaluate_repository(
        &self,
        repo: &RepositoryRef,
        policies: &[PolicyConfig],
    ) -> Result<Vec<Violation>, GitHubError> {
        let checks = policies.iter().filter_map(|policy| {
            let evaluator = self.evaluators.get(&policy.policy_type)?;
            Some(async move {
                match evaluator.evaluate(repo).await {
                    Ok(result) => Ok(result),
                    Err(e @ GitHubError::Authentication(_)) => Err(e),
                    Err(e) => {
                        warn!(
                            repository = %repo,
                            policy = %policy.policy_type,
                            "Policy evaluation failed: {}", e
                        );
                        Ok(None)
                    }
                }
            })
        });

        let mut violations = Vec::new();
        for result in join_all(checks).await {
            if let Some(violation) = result? {
                violations.push(violation);
            }
        }
        debug!(
            repository = %repo,
            "Evaluated {} policies, {} violations",
            policies.len(),
            violations.len()
        );
        Ok(violations)
    }
}
