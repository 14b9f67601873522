//! Ticket domain types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bluepay_shared::types::{AccountId, Currency, TicketTemplateId, WalletItemId};

use super::error::TicketError;

/// A kind of ticket a merchant can issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketTemplate {
    /// Template id.
    pub id: TicketTemplateId,
    /// Issuing business account.
    pub merchant: AccountId,
    /// Title shown in wallets.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Face value; informational, issuing moves no money.
    pub price: Decimal,
    /// Currency of `price`.
    pub currency: Currency,
    /// Maximum number of tickets, if limited.
    pub capacity: Option<u32>,
    /// Tickets issued so far.
    pub issued: u32,
    /// Tickets stop being issuable and redeemable after this time.
    pub valid_until: Option<DateTime<Utc>>,
    /// Whether new tickets can be issued.
    pub active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl TicketTemplate {
    /// Tickets still available, if capacity is limited.
    #[must_use]
    pub fn remaining(&self) -> Option<u32> {
        self.capacity.map(|c| c.saturating_sub(self.issued))
    }

    /// Returns true if the validity window has closed at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.is_some_and(|until| now > until)
    }
}

/// Input for creating a template.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTemplate {
    /// Title shown in wallets.
    pub title: String,
    /// Longer description.
    #[serde(default)]
    pub description: String,
    /// Face value.
    pub price: Decimal,
    /// Maximum number of tickets.
    pub capacity: Option<u32>,
    /// End of validity.
    pub valid_until: Option<DateTime<Utc>>,
}

/// Lifecycle of a ticket held in a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketStatus {
    /// Can be redeemed.
    Active,
    /// Used.
    Redeemed,
    /// Validity window closed before use.
    Expired,
}

impl TicketStatus {
    /// Returns the stored representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Redeemed => "Redeemed",
            Self::Expired => "Expired",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = TicketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(Self::Active),
            "Redeemed" => Ok(Self::Redeemed),
            "Expired" => Ok(Self::Expired),
            _ => Err(TicketError::Internal(format!("unknown ticket status '{s}'"))),
        }
    }
}

/// A ticket held by a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletItem {
    /// Item id.
    pub id: WalletItemId,
    /// Template it was issued from.
    pub template_id: TicketTemplateId,
    /// Issuing merchant.
    pub merchant: AccountId,
    /// Holder.
    pub holder: AccountId,
    /// Title copied from the template at issue time.
    pub title: String,
    /// Current status.
    pub status: TicketStatus,
    /// Issue time.
    pub issued_at: DateTime<Utc>,
    /// Redemption time.
    pub redeemed_at: Option<DateTime<Utc>>,
    /// End of validity, copied from the template.
    pub valid_until: Option<DateTime<Utc>>,
}

/// Outcome of a redemption attempt that reached the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redemption {
    /// The ticket was used.
    Redeemed(WalletItem),
    /// The ticket was past validity and has been marked expired.
    Expired(WalletItem),
}

impl Redemption {
    /// The item as stored after the attempt.
    #[must_use]
    pub fn item(&self) -> &WalletItem {
        match self {
            Self::Redeemed(item) | Self::Expired(item) => item,
        }
    }
}
