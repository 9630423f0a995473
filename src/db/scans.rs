//! Database queries for scans.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::entity::scan::{self, ActiveModel, Entity as ScanEntity};
use crate::error::{AppError, AppResult};
use crate::models::{Scan, ScanStatus};

use super::DbPool;

pub(crate) fn model_to_scan(model: scan::Model) -> AppResult<Scan> {
    let status = ScanStatus::parse(&model.status).ok_or_else(|| {
        AppError::Database(format!(
            "Scan {} has unknown status '{}'",
            model.id, model.status
        ))
    })?;

    Ok(Scan {
        id: model.id,
        status,
        started_at: model.started_at,
        completed_at: model.completed_at,
        repositories_scanned: model
            .repositories_scanned
            .and_then(|n| u32::try_from(n).ok()),
        error_message: model.error_message,
    })
}

impl DbPool {
    /// Insert a new pending scan. Every invocation gets its own record.
    pub async fn insert_scan(&self) -> AppResult<Scan> {
        let model = ActiveModel {
            id: Set(Uuid::now_v7()),
            status: Set(ScanStatus::Pending.as_str().to_string()),
            started_at: Set(Utc::now()),
            completed_at: Set(None),
            repositories_scanned: Set(None),
            error_message: Set(None),
        };

        let result = model
            .insert(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert scan: {}", e)))?;

        model_to_scan(result)
    }

    /// Get a scan by ID.
    pub async fn get_scan_by_id(&self, id: Uuid) -> AppResult<Option<Scan>> {
        ScanEntity::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get scan: {}", e)))?
            .map(model_to_scan)
            .transpose()
    }

    /// Move a scan to `status`, rejecting transitions out of terminal states.
    pub async fn set_scan_status(
        &self,
        id: Uuid,
        status: ScanStatus,
        error_message: Option<String>,
    ) -> AppResult<Scan> {
        let model = ScanEntity::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get scan: {}", e)))?
            .ok_or_else(|| AppError::NotFound(format!("Scan {}", id)))?;

        let current = model_to_scan(model.clone())?.status;
        if !current.can_transition_to(status) {
            return Err(AppError::InvalidInput(format!(
                "Scan {} cannot move from {} to {}",
                id, current, status
            )));
        }

        let mut active: ActiveModel = model.into();
        active.status = Set(status.as_str().to_string());
        if status.is_terminal() {
            active.completed_at = Set(Some(Utc::now()));
        }
        if error_message.is_some() {
            active.error_message = Set(error_message);
        }

        let result = active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update scan status: {}", e)))?;

        model_to_scan(result)
    }

    /// Record how many repositories the scan evaluated.
    pub async fn set_scan_repository_count(&self, id: Uuid, count: usize) -> AppResult<()> {
        let count = i32::try_from(count).map_err(|_| {
            AppError::InvalidInput(format!("Repository count {} is out of range", count))
        })?;

        let model = ScanEntity::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get scan: {}", e)))?
            .ok_or_else(|| AppError::NotFound(format!("Scan {}", id)))?;

        let mut active: ActiveModel = model.into();
        active.repositories_scanned = Set(Some(count));
        active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to record scan inventory: {}", e)))?;

        Ok(())
    }

    /// The most recently completed scan, the only one readers treat as current.
    pub async fn get_latest_completed_scan(&self) -> AppResult<Option<Scan>> {
        ScanEntity::find()
            .filter(scan::Column::Status.eq(ScanStatus::Completed.as_str()))
            .order_by_desc(scan::Column::CompletedAt)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get latest scan: {}", e)))?
            .map(model_to_scan)
            .transpose()
    }
}
