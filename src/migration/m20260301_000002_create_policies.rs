//! Migration: Create policies table.

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
                CREATE TABLE policies (
                    id UUID PRIMARY KEY,
                    policy_type VARCHAR(100) NOT NULL UNIQUE,
                    description TEXT NOT NULL DEFAULT '',
                    -- JSON array of configured action identifiers
                    default_actions JSONB NOT NULL DEFAULT '[]'::jsonb,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE TRIGGER update_policies_updated_at
                    BEFORE UPDATE ON policies
                    FOR EACH ROW
                    EXECUTE FUNCTION update_updated_at_column();
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
                DROP TRIGGER IF EXISTS update_policies_updated_at ON policies;
                DROP TABLE IF EXISTS policies CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
