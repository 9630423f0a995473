//! Policy catalogue entity.

use sea_orm::entity::prelude::*;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "policies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub policy_type: String,
    pub description: String,
    /// JSON array of action identifiers
    #[sea_orm(column_type = "JsonBinary")]
    pub default_actions: JsonValue,
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
