//! Ledger domain types.
//!
//! A money event is stored as two mirror records, one per account, sharing a
//! `request_id`. `payment` is the side money leaves, `receipt` the side it
//! arrives on.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bluepay_shared::types::{AccountId, Currency, RequestId, TransactionId};

use super::error::LedgerError;

/// Which way money moves from the record owner's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Money leaves the owner (the payer side).
    Payment,
    /// Money arrives at the owner (the payee / requester side).
    Receipt,
}

impl RecordKind {
    /// Returns the stored representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Receipt => "receipt",
        }
    }
}

impl FromStr for RecordKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment" => Ok(Self::Payment),
            "receipt" => Ok(Self::Receipt),
            _ => Err(LedgerError::MalformedRecord(format!("unknown kind '{s}'"))),
        }
    }
}

/// Status of one side of a money event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
    /// Money has moved.
    Completed,
    /// Requester side of an open request.
    Pending,
    /// Payer side of an open request.
    Requested,
    /// The payer declined the request.
    Failed,
    /// The requester withdrew the request.
    Cancelled,
}

impl RecordStatus {
    /// Returns the stored representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "Completed",
            Self::Pending => "Pending",
            Self::Requested => "Requested",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Returns true if no further transition is allowed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Completed" => Ok(Self::Completed),
            "Pending" => Ok(Self::Pending),
            "Requested" => Ok(Self::Requested),
            "Failed" => Ok(Self::Failed),
            "Cancelled" => Ok(Self::Cancelled),
            _ => Err(LedgerError::MalformedRecord(format!("unknown status '{s}'"))),
        }
    }
}

/// One line of an itemized merchant request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Item label.
    pub name: String,
    /// Item price in the request currency.
    pub price: Decimal,
}

/// One side of a money event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Record id.
    pub id: TransactionId,
    /// Account the record belongs to.
    pub owner: AccountId,
    /// Payment or receipt.
    pub kind: RecordKind,
    /// Current status.
    pub status: RecordStatus,
    /// Positive amount.
    pub amount: Decimal,
    /// Currency of `amount`.
    pub currency: Currency,
    /// Free-text note.
    pub note: String,
    /// Optional attachment (receipt photo, invoice).
    pub attachment_url: Option<String>,
    /// When the event was created.
    pub date: DateTime<Utc>,
    /// The counterpart account.
    pub other_party: AccountId,
    /// Correlation id shared with the mirror record. Absent only on legacy rows.
    pub request_id: Option<RequestId>,
    /// Itemization, for merchant requests.
    pub order_items: Option<Vec<OrderItem>>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

/// Client-supplied token that makes a retried submission safe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Maximum accepted key length.
    pub const MAX_LEN: usize = 128;

    /// Returns the key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for IdempotencyKey {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty()
            || s.len() > Self::MAX_LEN
            || !s.chars().all(|c| c.is_ascii_graphic())
        {
            return Err(LedgerError::InvalidIdempotencyKey);
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for IdempotencyKey {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IdempotencyKey> for String {
    fn from(value: IdempotencyKey) -> Self {
        value.0
    }
}

/// Canonical description of what a keyed submission asked for.
///
/// Stored beside the idempotency key. A retry replays only when its
/// fingerprint is identical; the same key with another operation, another
/// counterpart or another amount is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of a transfer or request confirmation.
    #[must_use]
    pub fn transfer(input: &TransferInput) -> Self {
        let linked = input
            .linked_request
            .map_or_else(|| "-".to_string(), |rid| rid.to_string());
        Self(format!(
            "transfer:{}:{}:{}:{linked}",
            input.payer,
            input.payee,
            input.amount.normalize()
        ))
    }

    /// Fingerprint of a payment request, order items included.
    #[must_use]
    pub fn payment_request(input: &PaymentRequestInput) -> Self {
        let items = input.order_items.as_ref().map_or_else(
            || "-".to_string(),
            |items| {
                items
                    .iter()
                    .map(|item| format!("{}={}", item.name, item.price.normalize()))
                    .collect::<Vec<_>>()
                    .join(",")
            },
        );
        Self(format!(
            "request:{}:{}:{}:{items}",
            input.requester,
            input.payer,
            input.amount.normalize()
        ))
    }

    /// Rebuilds a fingerprint read back from storage.
    #[must_use]
    pub fn from_stored(value: String) -> Self {
        Self(value)
    }

    /// Returns the stored representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Input for [`transfer_funds`](super::LedgerService::transfer_funds).
#[derive(Debug, Clone)]
pub struct TransferInput {
    /// Account being debited.
    pub payer: AccountId,
    /// Account being credited.
    pub payee: AccountId,
    /// Amount to move.
    pub amount: Decimal,
    /// Note shown on both records.
    pub note: String,
    /// Optional attachment.
    pub attachment_url: Option<String>,
    /// When set, this transfer pays an open request instead of creating records.
    pub linked_request: Option<RequestId>,
    /// Optional retry token, scoped to the payer.
    pub idempotency_key: Option<IdempotencyKey>,
}

/// Input for [`create_payment_request`](super::LedgerService::create_payment_request).
#[derive(Debug, Clone)]
pub struct PaymentRequestInput {
    /// Account asking for money.
    pub requester: AccountId,
    /// Account being asked to pay.
    pub payer: AccountId,
    /// Requested amount.
    pub amount: Decimal,
    /// Note shown on both records.
    pub note: String,
    /// Optional attachment.
    pub attachment_url: Option<String>,
    /// Optional itemization; must sum to `amount`.
    pub order_items: Option<Vec<OrderItem>>,
    /// Optional retry token, scoped to the requester.
    pub idempotency_key: Option<IdempotencyKey>,
}

/// What happened to the counterpart record of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorUpdate {
    /// Both sides were written (or created) together.
    Applied,
    /// The counterpart record could not be found; only the caller's side changed.
    Missing,
    /// The record predates correlation ids; no counterpart lookup was possible.
    Skipped,
}

/// Result of a ledger operation.
#[derive(Debug, Clone, Serialize)]
pub struct Settlement {
    /// Correlation id of the money event.
    pub request_id: Option<RequestId>,
    /// State after the operation of every record it touched that still exists.
    pub records: Vec<TransactionRecord>,
    /// Counterpart outcome.
    pub mirror: MirrorUpdate,
    /// True when an idempotency key matched an earlier submission and nothing was written.
    pub replayed: bool,
}

impl Settlement {
    /// Returns false when the counterpart could not be updated.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.mirror != MirrorUpdate::Missing
    }

    /// Returns the record owned by `account`, if the settlement carries one.
    #[must_use]
    pub fn record_for(&self, account: AccountId) -> Option<&TransactionRecord> {
        self.records.iter().find(|r| r.owner == account)
    }
}
