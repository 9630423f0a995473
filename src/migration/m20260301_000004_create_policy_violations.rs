//! Migration: Create policy_violations table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TABLE policy_violations (
                    id UUID PRIMARY KEY,
                    scan_id UUID NOT NULL REFERENCES scans(id) ON DELETE CASCADE,
                    repository_id BIGINT NOT NULL REFERENCES repositories(github_id) ON DELETE CASCADE,
                    policy_id UUID NOT NULL REFERENCES policies(id) ON DELETE CASCADE,
                    detected_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE INDEX idx_policy_violations_scan_id ON policy_violations(scan_id);
                CREATE INDEX idx_policy_violations_repository_id ON policy_violations(repository_id);
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                DROP TABLE IF EXISTS policy_violations CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
