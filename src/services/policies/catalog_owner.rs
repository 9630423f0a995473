use std::sync::Arc;

use async_trait::async_trait;
use serde_yaml::Value;

use crate::error::GitHubError;
use crate::models::{RepositoryRef, Violation};
use crate::services::github_client::GitHubApi;

use super::{CATALOG_INFO_HAS_OWNER, CATALOG_INFO_PATH, PolicyEvaluator};

/// Result of decoding `spec.owner` out of a catalog manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerField {
    Present(String),
    Empty,
    Unparsable,
    MissingSection,
    MissingOwner,
}

impl OwnerField {
    pub fn decode(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::Empty;
        }

        let document: Value = match serde_yaml::from_str(raw) {
            Ok(v) => v,
            Err(_) => return Self::Unparsable,
        };

        // `Value::get` matches string keys regardless of the other key types in the map
        let Some(spec) = document.get("spec").filter(|s| s.is_mapping()) else {
            return Self::MissingSection;
        };

        match spec.get("owner").and_then(scalar_text) {
            Some(owner) if !owner.trim().is_empty() => Self::Present(owner.trim().to_string()),
            _ => Self::MissingOwner,
        }
    }

    fn reason(&self) -> Option<&'static str> {
        match self {
            Self::Present(_) => None,
            Self::Empty => Some("is empty"),
            Self::Unparsable => Some("is not valid YAML"),
            Self::MissingSection => Some("has no spec section"),
            Self::MissingOwner => Some("does not set spec.owner"),
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Violation iff `catalog-info.yaml` exists but does not name an owner.
///
/// A missing manifest is left to the file-presence policy.
pub struct CatalogOwnerEvaluator {
    github: Arc<dyn GitHubApi>,
}

impl CatalogOwnerEvaluator {
    pub fn new(github: Arc<dyn GitHubApi>) -> Self {
        Self { github }
    }
}

#[async_trait]
impl PolicyEvaluator for CatalogOwnerEvaluator {
    fn policy_type_key(&self) -> &str {
        CATALOG_INFO_HAS_OWNER
    }

    fn description(&self) -> &str {
        "catalog-info.yaml must declare spec.owner"
    }

    async fn evaluate(&self, repo: &RepositoryRef) -> Result<Option<Violation>, GitHubError> {
        let Some(file) = self.github.get_file_content(repo, CATALOG_INFO_PATH).await? else {
            return Ok(None);
        };

        let owner = match file.decode() {
            Ok(text) => OwnerField::decode(&text),
            Err(_) => OwnerField::Unparsable,
        };

        Ok(owner.reason().map(|reason| {
            Violation::new(
                CATALOG_INFO_HAS_OWNER,
                format!("{} in {} {}", CATALOG_INFO_PATH, repo, reason),
            )
        }))
    }
}
