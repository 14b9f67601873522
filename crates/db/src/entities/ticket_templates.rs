//! `SeaORM` Entity for ticket_templates table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "ticket_templates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub currency: String,
    pub capacity: Option<i32>,
    pub issued: i32,
    pub valid_until: Option<DateTimeWithTimeZone>,
    pub active: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::MerchantId",
        to = "super::accounts::Column::Id"
    )]
    Merchant,
    #[sea_orm(has_many = "super::wallet_items::Entity")]
    WalletItems,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Merchant.def()
    }
}

impl Related<super::wallet_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WalletItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
