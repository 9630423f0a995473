use std::sync::Arc;

use async_trait::async_trait;

use crate::error::GitHubError;
use crate::models::{RepositoryRef, Violation};
use crate::services::github_client::GitHubApi;

use super::PolicyEvaluator;

/// Violation iff a file is missing from the repository root.
pub struct FilePresenceEvaluator {
    github: Arc<dyn GitHubApi>,
    policy_type: String,
    path: String,
    description: String,
}

impl FilePresenceEvaluator {
    pub fn new(github: Arc<dyn GitHubApi>, policy_type: &str, path: &str) -> Self {
        Self {
            github,
            policy_type: policy_type.to_string(),
            path: path.to_string(),
            description: format!("Repository must contain {} at its root", path),
        }
    }
}

#[async_trait]
impl PolicyEvaluator for FilePresenceEvaluator {
    fn policy_type_key(&self) -> &str {
        &self.policy_type
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn evaluate(&self, repo: &RepositoryRef) -> Result<Option<Violation>, GitHubError> {
        let file = self.github.get_file_content(repo, &self.path).await?;

        Ok(file.is_none().then(|| {
            Violation::new(
                &self.policy_type,
                format!("{} is missing {}", repo, self.path),
            )
        }))
    }
}
