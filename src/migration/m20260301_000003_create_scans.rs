//! Migration: Create scans table.
//!
//! Only the most recent completed scan is authoritative for readers.

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
                CREATE TABLE scans (
                    id UUID PRIMARY KEY, -- UUIDv7 for time-ordered sorting
                    status VARCHAR(20) NOT NULL DEFAULT 'pending'
                        CHECK (status IN ('pending', 'in_progress', 'completed', 'failed')),
                    started_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    completed_at TIMESTAMPTZ,
                    -- Repositories evaluated; set just before the scan completes
                    repositories_scanned INTEGER CHECK (repositories_scanned >= 0),
                    error_message TEXT
                );

                -- Latest completed scan lookup
                CREATE INDEX idx_scans_completed ON scans(completed_at DESC)
                    WHERE status = 'completed';
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
                DROP TABLE IF EXISTS scans CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
