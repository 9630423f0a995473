//! Database queries for the policy catalogue.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::entity::policy::{self, ActiveModel, Entity as PolicyEntity};
use crate::error::{AppError, AppResult};
use crate::models::Policy;

use super::DbPool;

pub(crate) fn model_to_policy(model: policy::Model) -> Policy {
    let default_actions = serde_json::from_value(model.default_actions).unwrap_or_default();
    Policy {
        id: model.id,
        policy_type: model.policy_type,
        description: model.description,
        default_actions,
    }
}

impl DbPool {
    /// Insert or update the catalogue row for a policy type. Policies are never deleted.
    pub async fn save_policy(
        &self,
        policy_type: &str,
        description: &str,
        default_actions: &[String],
    ) -> AppResult<Policy> {
        let existing = PolicyEntity::find()
            .filter(policy::Column::PolicyType.eq(policy_type))
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get policy: {}", e)))?;

        let actions_json = serde_json::to_value(default_actions)?;
        let now = Utc::now();

        let result = match existing {
            Some(model) => {
                let mut active: ActiveModel = model.into();
                active.description = Set(description.to_string());
                active.default_actions = Set(actions_json);
                active.updated_at = Set(now);
                active
                    .update(self.connection())
                    .await
                    .map_err(|e| AppError::Database(format!("Failed to update policy: {}", e)))?
            }
            None => {
                let model = ActiveModel {
                    id: Set(Uuid::now_v7()),
                    policy_type: Set(policy_type.to_string()),
                    description: Set(description.to_string()),
                    default_actions: Set(actions_json),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                model
                    .insert(self.connection())
                    .await
                    .map_err(|e| AppError::Database(format!("Failed to insert policy: {}", e)))?
            }
        };

        Ok(model_to_policy(result))
    }

    /// All catalogued policies.
    pub async fn get_policies(&self) -> AppResult<Vec<Policy>> {
        let result = PolicyEntity::find()
            .order_by_asc(policy::Column::PolicyType)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list policies: {}", e)))?;

        Ok(result.into_iter().map(model_to_policy).collect())
    }
}
