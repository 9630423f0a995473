//! Violation models: evaluator results and their persisted form.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Policy, Repository};

/// A failed check produced by an evaluator, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub policy_type: String,
    pub message: String,
}

impl Violation {
    pub fn new(policy_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            policy_type: policy_type.into(),
            message: message.into(),
        }
    }
}

/// One (scan, repository, policy) failure. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PolicyViolation {
    pub id: Uuid,
    pub scan_id: Uuid,
    pub repository_id: i64,
    pub policy_id: Uuid,
    pub detected_at: DateTime<Utc>,
}

/// A persisted violation joined with the repository and policy it references.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ViolationContext {
    pub violation: PolicyViolation,
    pub repository: Repository,
    pub policy: Policy,
}
