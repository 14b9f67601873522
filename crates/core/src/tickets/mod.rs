//! Merchant tickets.
//!
//! A business account publishes templates and issues tickets from them into
//! customers' wallets. Only the issuing merchant can redeem a ticket, and
//! only once.

mod error;
pub mod rules;
mod service;
mod types;

use async_trait::async_trait;

use bluepay_shared::types::{AccountId, TicketTemplateId, WalletItemId};

pub use error::TicketError;
pub use service::TicketService;
pub use types::{NewTemplate, Redemption, TicketStatus, TicketTemplate, WalletItem};

/// Issuing function run while the template is locked.
pub type IssueFn<'a> =
    dyn Fn(&TicketTemplate) -> Result<(TicketTemplate, WalletItem), TicketError> + Send + Sync + 'a;

/// Redemption function run while the item is locked.
pub type RedeemFn<'a> = dyn Fn(&WalletItem) -> Result<Redemption, TicketError> + Send + Sync + 'a;

/// Storage backend for templates and wallet items.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Stores a new template.
    async fn insert_template(&self, template: TicketTemplate) -> Result<TicketTemplate, TicketError>;

    /// Reads a template.
    async fn template(&self, id: TicketTemplateId) -> Result<Option<TicketTemplate>, TicketError>;

    /// Lists a merchant's templates, newest first.
    async fn templates_for(&self, merchant: AccountId) -> Result<Vec<TicketTemplate>, TicketError>;

    /// Lists a holder's tickets, newest first.
    async fn wallet(&self, holder: AccountId) -> Result<Vec<WalletItem>, TicketError>;

    /// Locks the template, runs `issue`, and stores the updated template and
    /// the new item together.
    async fn issue(&self, template: TicketTemplateId, issue: &IssueFn<'_>)
    -> Result<WalletItem, TicketError>;

    /// Locks the item, runs `redeem`, and stores the result.
    async fn redeem(&self, item: WalletItemId, redeem: &RedeemFn<'_>)
    -> Result<Redemption, TicketError>;
}
