//! `SeaORM` Entity for transactions table.
//!
//! One row per side of a money movement. `kind` and `status` are stored as
//! text and constrained by CHECKs in the migration.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: String,
    pub status: String,
    pub amount: Decimal,
    pub currency: String,
    pub note: String,
    pub attachment_url: Option<String>,
    pub date: DateTimeWithTimeZone,
    pub other_party_id: Uuid,
    pub request_id: Option<Uuid>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub order_items: Option<Json>,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::OwnerId",
        to = "super::accounts::Column::Id"
    )]
    Owner,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
