//! Persistence seam of the compliance engine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    ActionLog, ActionOutcome, Policy, PolicyViolation, Repository, Scan, ScanStatus,
    ViolationContext,
};

use super::DbPool;

/// CRUD surface the scan orchestrator and action executor depend on.
///
/// Writes are last-write-wins at the row level.
#[async_trait]
pub trait ComplianceStore: Send + Sync {
    /// Create a new `Pending` scan record.
    async fn create_scan(&self) -> AppResult<Scan>;

    /// Transition a scan. Terminal states set `completed_at`.
    async fn update_scan_status(
        &self,
        scan_id: Uuid,
        status: ScanStatus,
        error_message: Option<String>,
    ) -> AppResult<Scan>;

    /// Record the size of the inventory a scan evaluated.
    async fn record_scan_repositories(&self, scan_id: Uuid, count: usize) -> AppResult<()>;

    async fn get_scan(&self, scan_id: Uuid) -> AppResult<Option<Scan>>;

    async fn latest_completed_scan(&self) -> AppResult<Option<Scan>>;

    async fn list_repositories(&self) -> AppResult<Vec<Repository>>;

    /// Insert by stable id, or update the name of an existing row.
    async fn upsert_repository(&self, github_id: i64, name: &str) -> AppResult<Repository>;

    /// Delete the repository with all of its violations and action logs.
    async fn delete_repository(&self, github_id: i64) -> AppResult<()>;

    async fn record_repository_evaluation(
        &self,
        github_id: i64,
        is_compliant: bool,
        scanned_at: DateTime<Utc>,
    ) -> AppResult<()>;

    async fn upsert_policy(
        &self,
        policy_type: &str,
        description: &str,
        default_actions: &[String],
    ) -> AppResult<Policy>;

    async fn list_policies(&self) -> AppResult<Vec<Policy>>;

    async fn insert_violation(
        &self,
        scan_id: Uuid,
        repository_id: i64,
        policy_id: Uuid,
    ) -> AppResult<PolicyViolation>;

    async fn violations_for_scan(&self, scan_id: Uuid) -> AppResult<Vec<ViolationContext>>;

    async fn insert_action_log(
        &self,
        violation_id: Uuid,
        action_type: &str,
        outcome: &ActionOutcome,
    ) -> AppResult<ActionLog>;

    async fn action_logs_for_violation(&self, violation_id: Uuid) -> AppResult<Vec<ActionLog>>;
}

#[async_trait]
impl ComplianceStore for DbPool {
    async fn create_scan(&self) -> AppResult<Scan> {
        self.insert_scan().await
    }

    async fn update_scan_status(
        &self,
        scan_id: Uuid,
        status: ScanStatus,
        error_message: Option<String>,
    ) -> AppResult<Scan> {
        self.set_scan_status(scan_id, status, error_message).await
    }

    async fn record_scan_repositories(&self, scan_id: Uuid, count: usize) -> AppResult<()> {
        self.set_scan_repository_count(scan_id, count).await
    }

    async fn get_scan(&self, scan_id: Uuid) -> AppResult<Option<Scan>> {
        self.get_scan_by_id(scan_id).await
    }

    async fn latest_completed_scan(&self) -> AppResult<Option<Scan>> {
        self.get_latest_completed_scan().await
    }

    async fn list_repositories(&self) -> AppResult<Vec<Repository>> {
        self.get_repositories().await
    }

    async fn upsert_repository(&self, github_id: i64, name: &str) -> AppResult<Repository> {
        self.save_repository(github_id, name).await
    }

    async fn delete_repository(&self, github_id: i64) -> AppResult<()> {
        self.purge_repository(github_id).await
    }

    async fn record_repository_evaluation(
        &self,
        github_id: i64,
        is_compliant: bool,
        scanned_at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.set_repository_compliance(github_id, is_compliant, scanned_at)
            .await
    }

    async fn upsert_policy(
        &self,
        policy_type: &str,
        description: &str,
        default_actions: &[String],
    ) -> AppResult<Policy> {
        self.save_policy(policy_type, description, default_actions)
            .await
    }

    async fn list_policies(&self) -> AppResult<Vec<Policy>> {
        self.get_policies().await
    }

    async fn insert_violation(
        &self,
        scan_id: Uuid,
        repository_id: i64,
        policy_id: Uuid,
    ) -> AppResult<PolicyViolation> {
        self.insert_policy_violation(scan_id, repository_id, policy_id)
            .await
    }

    async fn violations_for_scan(&self, scan_id: Uuid) -> AppResult<Vec<ViolationContext>> {
        self.get_violations_for_scan(scan_id).await
    }

    async fn insert_action_log(
        &self,
        violation_id: Uuid,
        action_type: &str,
        outcome: &ActionOutcome,
    ) -> AppResult<ActionLog> {
        DbPool::insert_action_log(self, violation_id, action_type, outcome).await
    }

    async fn action_logs_for_violation(&self, violation_id: Uuid) -> AppResult<Vec<ActionLog>> {
        self.get_action_logs_for_violation(violation_id).await
    }
}
