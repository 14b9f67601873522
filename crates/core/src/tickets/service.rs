//! Ticket service.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use bluepay_shared::types::{AccountId, TicketTemplateId, WalletItemId};

use super::rules;
use super::{NewTemplate, Redemption, TicketError, TicketStore, TicketTemplate, WalletItem};
use crate::directory::AccountDirectory;

/// Merchant ticket operations.
#[derive(Clone)]
pub struct TicketService {
    store: Arc<dyn TicketStore>,
    directory: Arc<dyn AccountDirectory>,
}

impl TicketService {
    /// Creates a service.
    #[must_use]
    pub fn new(store: Arc<dyn TicketStore>, directory: Arc<dyn AccountDirectory>) -> Self {
        Self { store, directory }
    }

    /// Publishes a template for a business account.
    pub async fn create_template(
        &self,
        merchant: AccountId,
        input: NewTemplate,
    ) -> Result<TicketTemplate, TicketError> {
        let account = self
            .directory
            .account(merchant)
            .await?
            .ok_or(TicketError::AccountNotFound(merchant))?;

        let template = rules::build_template(&account, input, Utc::now())?;
        let template = self.store.insert_template(template).await?;
        info!(
            merchant = %merchant,
            template = %template.id,
            capacity = ?template.capacity,
            "Ticket template created"
        );
        Ok(template)
    }

    /// Issues a ticket from `template` into `holder`'s wallet.
    pub async fn issue_ticket(
        &self,
        merchant: AccountId,
        template: TicketTemplateId,
        holder: AccountId,
    ) -> Result<WalletItem, TicketError> {
        if self.directory.account(holder).await?.is_none() {
            return Err(TicketError::AccountNotFound(holder));
        }

        let now = Utc::now();
        let item = self
            .store
            .issue(template, &|t| rules::issue(t, merchant, holder, now))
            .await?;
        info!(
            merchant = %merchant,
            holder = %holder,
            template = %template,
            item = %item.id,
            "Ticket issued"
        );
        Ok(item)
    }

    /// Redeems a ticket. Only the issuing merchant may do this.
    ///
    /// # Errors
    ///
    /// `Expired` when the validity window has closed; the ticket is marked
    /// `Expired` before the error is returned.
    pub async fn redeem_ticket(
        &self,
        merchant: AccountId,
        item: WalletItemId,
    ) -> Result<WalletItem, TicketError> {
        let now = Utc::now();
        match self
            .store
            .redeem(item, &|i| rules::redeem(i, merchant, now))
            .await?
        {
            Redemption::Redeemed(item) => {
                info!(merchant = %merchant, item = %item.id, holder = %item.holder, "Ticket redeemed");
                Ok(item)
            }
            Redemption::Expired(item) => {
                warn!(merchant = %merchant, item = %item.id, "Redemption of expired ticket");
                Err(TicketError::Expired)
            }
        }
    }

    /// A holder's tickets.
    pub async fn wallet(&self, holder: AccountId) -> Result<Vec<WalletItem>, TicketError> {
        self.store.wallet(holder).await
    }

    /// A merchant's templates.
    pub async fn templates(&self, merchant: AccountId) -> Result<Vec<TicketTemplate>, TicketError> {
        self.store.templates_for(merchant).await
    }
}
