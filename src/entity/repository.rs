//! Tracked repository entity for SeaORM.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "repositories")]
pub struct Model {
    /// GitHub's stable repository id
    #[sea_orm(primary_key, auto_increment = false)]
    pub github_id: i64,
    pub name: String,
    pub is_compliant: Option<bool>,
    pub last_scanned_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
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
