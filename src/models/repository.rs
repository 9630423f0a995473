//! Tracked repository models.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// A repository tracked in the inventory, keyed by GitHub's stable repository id.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Repository {
    pub github_id: i64,
    pub name: String,
    /// `None` until the repository has been through one evaluation
    pub is_compliant: Option<bool>,
    pub last_scanned_at: Option<DateTime<Utc>>,
}

/// Identity of a repository as evaluators and actions address it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryRef {
    pub github_id: i64,
    pub owner: String,
    pub name: String,
}

impl RepositoryRef {
    pub fn new(github_id: i64, owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            github_id,
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl std::fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
