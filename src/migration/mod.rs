//! SeaORM database migrations.

pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_repositories;
mod m20260301_000002_create_policies;
mod m20260301_000003_create_scans;
mod m20260301_000004_create_policy_violations;
mod m20260301_000005_create_action_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_repositories::Migration),
            Box::new(m20260301_000002_create_policies::Migration),
            Box::new(m20260301_000003_create_scans::Migration),
            Box::new(m20260301_000004_create_policy_violations::Migration),
            Box::new(m20260301_000005_create_action_logs::Migration),
        ]
    }
}
