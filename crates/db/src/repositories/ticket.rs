//! Ticket repository: templates and wallet items.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::debug;

use bluepay_core::tickets::{
    IssueFn, RedeemFn, Redemption, TicketError, TicketStore, TicketTemplate, WalletItem,
};
use bluepay_shared::types::{AccountId, TicketTemplateId, WalletItemId};

use crate::entities::{ticket_templates, wallet_items};

fn db_err(e: DbErr) -> TicketError {
    TicketError::Database(e.to_string())
}

fn to_count(value: i32) -> Result<u32, TicketError> {
    u32::try_from(value).map_err(|e| TicketError::Internal(e.to_string()))
}

fn from_count(value: u32) -> Result<i32, TicketError> {
    i32::try_from(value).map_err(|e| TicketError::Internal(e.to_string()))
}

fn template_from(model: ticket_templates::Model) -> Result<TicketTemplate, TicketError> {
    Ok(TicketTemplate {
        id: TicketTemplateId::from_uuid(model.id),
        merchant: AccountId::from_uuid(model.merchant_id),
        title: model.title,
        description: model.description,
        price: model.price,
        currency: model.currency.parse().map_err(TicketError::Internal)?,
        capacity: model.capacity.map(to_count).transpose()?,
        issued: to_count(model.issued)?,
        valid_until: model.valid_until.map(|t| t.with_timezone(&Utc)),
        active: model.active,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

fn item_from(model: wallet_items::Model) -> Result<WalletItem, TicketError> {
    Ok(WalletItem {
        id: WalletItemId::from_uuid(model.id),
        template_id: TicketTemplateId::from_uuid(model.template_id),
        merchant: AccountId::from_uuid(model.merchant_id),
        holder: AccountId::from_uuid(model.holder_id),
        title: model.title,
        status: model.status.parse()?,
        issued_at: model.issued_at.with_timezone(&Utc),
        redeemed_at: model.redeemed_at.map(|t| t.with_timezone(&Utc)),
        valid_until: model.valid_until.map(|t| t.with_timezone(&Utc)),
    })
}

fn item_model(item: &WalletItem) -> wallet_items::ActiveModel {
    wallet_items::ActiveModel {
        id: Set(item.id.into_inner()),
        template_id: Set(item.template_id.into_inner()),
        merchant_id: Set(item.merchant.into_inner()),
        holder_id: Set(item.holder.into_inner()),
        title: Set(item.title.clone()),
        status: Set(item.status.as_str().to_string()),
        issued_at: Set(item.issued_at.into()),
        redeemed_at: Set(item.redeemed_at.map(Into::into)),
        valid_until: Set(item.valid_until.map(Into::into)),
    }
}

/// Ticket repository backed by `ticket_templates` and `wallet_items`.
#[derive(Debug, Clone)]
pub struct TicketRepository {
    db: DatabaseConnection,
}

impl TicketRepository {
    /// Creates a new ticket repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TicketStore for TicketRepository {
    async fn insert_template(&self, template: TicketTemplate) -> Result<TicketTemplate, TicketError> {
        let model = ticket_templates::ActiveModel {
            id: Set(template.id.into_inner()),
            merchant_id: Set(template.merchant.into_inner()),
            title: Set(template.title.clone()),
            description: Set(template.description.clone()),
            price: Set(template.price),
            currency: Set(template.currency.code().to_string()),
            capacity: Set(template.capacity.map(from_count).transpose()?),
            issued: Set(from_count(template.issued)?),
            valid_until: Set(template.valid_until.map(Into::into)),
            active: Set(template.active),
            created_at: Set(template.created_at.into()),
        };
        let created = model.insert(&self.db).await.map_err(db_err)?;
        template_from(created)
    }

    async fn template(&self, id: TicketTemplateId) -> Result<Option<TicketTemplate>, TicketError> {
        ticket_templates::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(template_from)
            .transpose()
    }

    async fn templates_for(&self, merchant: AccountId) -> Result<Vec<TicketTemplate>, TicketError> {
        ticket_templates::Entity::find()
            .filter(ticket_templates::Column::MerchantId.eq(merchant.into_inner()))
            .order_by_desc(ticket_templates::Column::CreatedAt)
            .order_by_desc(ticket_templates::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(template_from)
            .collect()
    }

    async fn wallet(&self, holder: AccountId) -> Result<Vec<WalletItem>, TicketError> {
        wallet_items::Entity::find()
            .filter(wallet_items::Column::HolderId.eq(holder.into_inner()))
            .order_by_desc(wallet_items::Column::IssuedAt)
            .order_by_desc(wallet_items::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(item_from)
            .collect()
    }

    async fn issue(
        &self,
        template: TicketTemplateId,
        issue: &IssueFn<'_>,
    ) -> Result<WalletItem, TicketError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let current = ticket_templates::Entity::find_by_id(template.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or(TicketError::TemplateNotFound(template))?;
        let (updated, item) = issue(&template_from(current)?)?;

        ticket_templates::Entity::update_many()
            .col_expr(
                ticket_templates::Column::Issued,
                Expr::value(from_count(updated.issued)?),
            )
            .filter(ticket_templates::Column::Id.eq(template.into_inner()))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        let stored = item_model(&item).insert(&txn).await.map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;
        debug!(template_id = %template, item_id = %item.id, "Ticket issued");
        item_from(stored)
    }

    async fn redeem(
        &self,
        item: WalletItemId,
        redeem: &RedeemFn<'_>,
    ) -> Result<Redemption, TicketError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let current = wallet_items::Entity::find_by_id(item.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or(TicketError::WalletItemNotFound(item))?;
        let outcome = redeem(&item_from(current)?)?;

        let stored = outcome.item();
        wallet_items::Entity::update_many()
            .col_expr(wallet_items::Column::Status, Expr::value(stored.status.as_str()))
            .col_expr(wallet_items::Column::RedeemedAt, Expr::value(stored.redeemed_at))
            .filter(wallet_items::Column::Id.eq(item.into_inner()))
            .exec(&txn)
            .await
            .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;
        Ok(outcome)
    }
}
