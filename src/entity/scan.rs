//! Scan entity: one reconciliation run.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "scans")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// pending, in_progress, completed, failed
    pub status: String,
    pub started_at: DateTimeUtc,
    pub completed_at: Option<DateTimeUtc>,
    pub repositories_scanned: Option<i32>,
    pub error_message: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::policy_violation::Entity")]
    PolicyViolations,
}

impl Related<super::policy_violation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PolicyViolations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
