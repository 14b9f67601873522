//! `SeaORM` Entity for wallet_items table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "wallet_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub template_id: Uuid,
    pub merchant_id: Uuid,
    pub holder_id: Uuid,
    pub title: String,
    pub status: String,
    pub issued_at: DateTimeWithTimeZone,
    pub redeemed_at: Option<DateTimeWithTimeZone>,
    pub valid_until: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::ticket_templates::Entity",
        from = "Column::TemplateId",
        to = "super::ticket_templates::Column::Id"
    )]
    TicketTemplates,
}

impl Related<super::ticket_templates::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TicketTemplates.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
