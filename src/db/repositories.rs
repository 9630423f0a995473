//! Database queries for the tracked repository inventory.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::entity::action_log;
use crate::entity::policy_violation;
use crate::entity::repository::{self, ActiveModel, Entity as RepositoryEntity};
use crate::error::{AppError, AppResult};
use crate::models::Repository;

use super::DbPool;

pub(crate) fn model_to_repository(model: repository::Model) -> Repository {
    Repository {
        github_id: model.github_id,
        name: model.name,
        is_compliant: model.is_compliant,
        last_scanned_at: model.last_scanned_at,
    }
}

impl DbPool {
    /// All tracked repositories, ordered by name.
    pub async fn get_repositories(&self) -> AppResult<Vec<Repository>> {
        let result = RepositoryEntity::find()
            .order_by_asc(repository::Column::Name)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list repositories: {}", e)))?;

        Ok(result.into_iter().map(model_to_repository).collect())
    }

    /// Insert a newly observed repository or rename an existing one.
    pub async fn save_repository(&self, github_id: i64, name: &str) -> AppResult<Repository> {
        let existing = RepositoryEntity::find_by_id(github_id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get repository: {}", e)))?;

        let now = Utc::now();
        let result = match existing {
            Some(model) if model.name == name => model,
            Some(model) => {
                let mut active: ActiveModel = model.into();
                active.name = Set(name.to_string());
                active.updated_at = Set(now);
                active.update(self.connection()).await.map_err(|e| {
                    AppError::Database(format!("Failed to rename repository: {}", e))
                })?
            }
            None => {
                let model = ActiveModel {
                    github_id: Set(github_id),
                    name: Set(name.to_string()),
                    is_compliant: Set(None),
                    last_scanned_at: Set(None),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                model.insert(self.connection()).await.map_err(|e| {
                    AppError::Database(format!("Failed to insert repository: {}", e))
                })?
            }
        };

        Ok(model_to_repository(result))
    }

    /// Purge a repository together with its violations and action logs.
    pub async fn purge_repository(&self, github_id: i64) -> AppResult<()> {
        let txn = self
            .connection()
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let violation_ids: Vec<Uuid> = policy_violation::Entity::find()
            .select_only()
            .column(policy_violation::Column::Id)
            .filter(policy_violation::Column::RepositoryId.eq(github_id))
            .into_tuple::<Uuid>()
            .all(&txn)
            .await?;

        if !violation_ids.is_empty() {
            action_log::Entity::delete_many()
                .filter(action_log::Column::ViolationId.is_in(violation_ids))
                .exec(&txn)
                .await?;
        }

        policy_violation::Entity::delete_many()
            .filter(policy_violation::Column::RepositoryId.eq(github_id))
            .exec(&txn)
            .await?;

        RepositoryEntity::delete_by_id(github_id).exec(&txn).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit repository purge: {}", e)))?;

        Ok(())
    }

    /// Record the outcome of evaluating a repository.
    pub async fn set_repository_compliance(
        &self,
        github_id: i64,
        is_compliant: bool,
        scanned_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let model = RepositoryEntity::find_by_id(github_id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get repository: {}", e)))?
            .ok_or_else(|| AppError::NotFound(format!("Repository {}", github_id)))?;

        let mut active: ActiveModel = model.into();
        active.is_compliant = Set(Some(is_compliant));
        active.last_scanned_at = Set(Some(scanned_at));
        active.updated_at = Set(Utc::now());

        active.update(self.connection()).await.map_err(|e| {
            AppError::Database(format!("Failed to update repository compliance: {}", e))
        })?;

        Ok(())
    }
}
