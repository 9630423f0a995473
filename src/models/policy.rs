//! Policy catalogue models.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// A configured check, upserted from configuration on every scan.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Policy {
    pub id: Uuid,
    /// Matches a compiled-in evaluator's type key
    pub policy_type: String,
    pub description: String,
    /// Action identifiers configured when the policy was last upserted
    pub default_actions: Vec<String>,
}
