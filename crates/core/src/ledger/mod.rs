//! Two-sided payment ledger.
//!
//! This module implements the wallet's money movement:
//! - Direct transfers and confirmations of payment requests
//! - Payment requests, declines and cancellations
//! - The request state machine
//! - Balance mutations (the only place balances are computed)
//! - The storage port and its atomic unit of work
//! - Realtime events published after commit

pub mod balance;
pub mod error;
pub mod events;
mod plan;
pub mod service;
pub mod state;
pub mod store;
pub mod types;
pub mod validation;

#[cfg(test)]
mod service_props;

pub use balance::BalanceChange;
pub use error::LedgerError;
pub use events::{AccountFeed, EventBus, EventKind, FeedItem, LedgerEvent};
pub use service::LedgerService;
pub use state::{RequestAction, Removal, StatusChange, Transition};
pub use store::{ClaimedKey, KeyClaim, LedgerStore, MirrorOf, NewRecord, Plan, PlanFn, ReadSet, Snapshot, Write};
pub use types::{
    Fingerprint, IdempotencyKey, MirrorUpdate, OrderItem, PaymentRequestInput, RecordKind, RecordStatus,
    Settlement, TransactionRecord, TransferInput,
};
