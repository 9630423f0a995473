//! Compiled-in policy evaluators.
//!
//! Each evaluator owns one policy type key and answers a single question about a
//! repository using read-only GitHub calls. New checks are added as new evaluators.

mod catalog_owner;
mod file_presence;
mod workflow_permissions;

use async_trait::async_trait;

use crate::error::GitHubError;
use crate::models::{RepositoryRef, Violation};

pub use catalog_owner::CatalogOwnerEvaluator;
pub use file_presence::FilePresenceEvaluator;
pub use workflow_permissions::WorkflowPermissionsEvaluator;

/// Manifest read by the catalog policies.
pub const CATALOG_INFO_PATH: &str = "catalog-info.yaml";

pub const HAS_CATALOG_INFO_YAML: &str = "has_catalog_info_yaml";
pub const CATALOG_INFO_HAS_OWNER: &str = "catalog_info_has_owner";
pub const CORRECT_WORKFLOW_PERMISSIONS: &str = "correct_workflow_permissions";

/// One compliance check.
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    /// Type key matched against `policies[].type` in the configuration.
    fn policy_type_key(&self) -> &str;

    /// Human description stored in the policy catalogue.
    fn description(&self) -> &str;

    /// `Some` when the repository violates the policy.
    async fn evaluate(&self, repo: &RepositoryRef) -> Result<Option<Violation>, GitHubError>;
}
