//! Migration: Create action_logs table (append-only audit trail).

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
                CREATE TABLE action_logs (
                    id UUID PRIMARY KEY,
                    violation_id UUID NOT NULL REFERENCES policy_violations(id) ON DELETE CASCADE,
                    -- Kept verbatim, unknown identifiers included
                    action_type VARCHAR(100) NOT NULL,
                    status VARCHAR(20) NOT NULL
                        CHECK (status IN ('success', 'skipped', 'failed')),
                    details TEXT NOT NULL DEFAULT '',
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE INDEX idx_action_logs_violation_id ON action_logs(violation_id);
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
                DROP TABLE IF EXISTS action_logs CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
