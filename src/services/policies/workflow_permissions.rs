use std::sync::Arc;

use async_trait::async_trait;

use crate::error::GitHubError;
use crate::models::{RepositoryRef, Violation};
use crate::services::github_client::GitHubApi;

use super::{CORRECT_WORKFLOW_PERMISSIONS, PolicyEvaluator};

/// The only accepted default `GITHUB_TOKEN` permission.
pub const SECURE_WORKFLOW_PERMISSION: &str = "read";

/// Violation iff the default workflow token permission is anything but `read`.
///
/// Repositories without a permissions resource (Actions disabled) are compliant.
pub struct WorkflowPermissionsEvaluator {
    github: Arc<dyn GitHubApi>,
}

impl WorkflowPermissionsEvaluator {
    pub fn new(github: Arc<dyn GitHubApi>) -> Self {
        Self { github }
    }
}

#[async_trait]
impl PolicyEvaluator for WorkflowPermissionsEvaluator {
    fn policy_type_key(&self) -> &str {
        CORRECT_WORKFLOW_PERMISSIONS
    }

    fn description(&self) -> &str {
        "Default workflow token permissions must be read-only"
    }

    async fn evaluate(&self, repo: &RepositoryRef) -> Result<Option<Violation>, GitHubError> {
        let Some(permissions) = self.github.get_workflow_permissions(repo).await? else {
            return Ok(None);
        };

        if permissions.default_workflow_permissions == SECURE_WORKFLOW_PERMISSION {
            return Ok(None);
        }

        Ok(Some(Violation::new(
            CORRECT_WORKFLOW_PERMISSIONS,
            format!(
                "{} grants '{}' default workflow permissions, expected '{}'",
                repo, permissions.default_workflow_permissions, SECURE_WORKFLOW_PERMISSION
            ),
        )))
    }
}
