//! Database queries for policy violations.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::entity::policy_violation::{self, ActiveModel, Entity as ViolationEntity};
use crate::entity::{policy, repository};
use crate::error::{AppError, AppResult};
use crate::models::{PolicyViolation, ViolationContext};

use super::DbPool;
use super::policies::model_to_policy;
use super::repositories::model_to_repository;

fn model_to_violation(model: policy_violation::Model) -> PolicyViolation {
    PolicyViolation {
        id: model.id,
        scan_id: model.scan_id,
        repository_id: model.repository_id,
        policy_id: model.policy_id,
        detected_at: model.detected_at,
    }
}

impl DbPool {
    /// Record one failed check for this scan.
    pub async fn insert_policy_violation(
        &self,
        scan_id: Uuid,
        repository_id: i64,
        policy_id: Uuid,
    ) -> AppResult<PolicyViolation> {
        let model = ActiveModel {
            id: Set(Uuid::now_v7()),
            scan_id: Set(scan_id),
            repository_id: Set(repository_id),
            policy_id: Set(policy_id),
            detected_at: Set(Utc::now()),
        };

        let result = model
            .insert(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert violation: {}", e)))?;

        Ok(model_to_violation(result))
    }

    /// Violations of a scan joined with their repository and policy rows.
    pub async fn get_violations_for_scan(&self, scan_id: Uuid) -> AppResult<Vec<ViolationContext>> {
        let violations = ViolationEntity::find()
            .filter(policy_violation::Column::ScanId.eq(scan_id))
            .order_by_asc(policy_violation::Column::Id)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get violations: {}", e)))?;

        if violations.is_empty() {
            return Ok(Vec::new());
        }

        let repo_ids: Vec<i64> = violations.iter().map(|v| v.repository_id).collect();
        let policy_ids: Vec<Uuid> = violations.iter().map(|v| v.policy_id).collect();

        let repositories: HashMap<i64, repository::Model> = repository::Entity::find()
            .filter(repository::Column::GithubId.is_in(repo_ids))
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get repositories: {}", e)))?
            .into_iter()
            .map(|r| (r.github_id, r))
            .collect();

        let policies: HashMap<Uuid, policy::Model> = policy::Entity::find()
            .filter(policy::Column::Id.is_in(policy_ids))
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get policies: {}", e)))?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        // Rows whose repository was purged concurrently are dropped
        Ok(violations
            .into_iter()
            .filter_map(|v| {
                let repository = repositories.get(&v.repository_id)?.clone();
                let policy = policies.get(&v.policy_id)?.clone();
                Some(ViolationContext {
                    violation: model_to_violation(v),
                    repository: model_to_repository(repository),
                    policy: model_to_policy(policy),
                })
            })
            .collect())
    }
}
