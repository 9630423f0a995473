//! Database queries for the remediation audit trail.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::entity::action_log::{self, ActiveModel, Entity as ActionLogEntity};
use crate::error::{AppError, AppResult};
use crate::models::{ActionLog, ActionOutcome, ActionStatus};

use super::DbPool;

fn model_to_action_log(model: action_log::Model) -> AppResult<ActionLog> {
    let status = ActionStatus::parse(&model.status).ok_or_else(|| {
        AppError::Database(format!(
            "Action log {} has unknown status '{}'",
            model.id, model.status
        ))
    })?;

    Ok(ActionLog {
        id: model.id,
        violation_id: model.violation_id,
        action_type: model.action_type,
        status,
        details: model.details,
        created_at: model.created_at,
    })
}

impl DbPool {
    /// Append an audit entry.
    pub async fn insert_action_log(
        &self,
        violation_id: Uuid,
        action_type: &str,
        outcome: &ActionOutcome,
    ) -> AppResult<ActionLog> {
        let model = ActiveModel {
            id: Set(Uuid::now_v7()),
            violation_id: Set(violation_id),
            action_type: Set(action_type.to_string()),
            status: Set(outcome.status.as_str().to_string()),
            details: Set(outcome.details.clone()),
            created_at: Set(Utc::now()),
        };

        let result = model
            .insert(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert action log: {}", e)))?;

        model_to_action_log(result)
    }

    /// Audit entries of one violation, oldest first.
    pub async fn get_action_logs_for_violation(
        &self,
        violation_id: Uuid,
    ) -> AppResult<Vec<ActionLog>> {
        ActionLogEntity::find()
            .filter(action_log::Column::ViolationId.eq(violation_id))
            .order_by_asc(action_log::Column::CreatedAt)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get action logs: {}", e)))?
            .into_iter()
            .map(model_to_action_log)
            .collect()
    }
}
