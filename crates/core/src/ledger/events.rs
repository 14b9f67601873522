//! Realtime ledger events.
//!
//! After a unit of work commits, the service turns its writes into one
//! event per affected account and broadcasts them. Subscribers follow a
//! single account; a subscriber that falls behind is told how many events it
//! missed and should reload from the store.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};

use bluepay_shared::types::{AccountId, RequestId, TransactionId};

use super::store::Write;
use super::types::{RecordStatus, TransactionRecord};

/// Default channel capacity.
pub const DEFAULT_CAPACITY: usize = 1024;

/// What changed for an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// The account's balance changed.
    BalanceChanged {
        /// New balance.
        balance: Decimal,
    },
    /// A record was added to the account's history.
    RecordCreated {
        /// The new record.
        record: TransactionRecord,
    },
    /// A record changed status.
    RecordUpdated {
        /// The record.
        id: TransactionId,
        /// New status.
        status: RecordStatus,
    },
    /// A record was removed from the account's history.
    RecordRemoved {
        /// The record.
        id: TransactionId,
    },
}

/// A change to one account, published after commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEvent {
    /// The account that changed.
    pub account: AccountId,
    /// Money event the change belongs to.
    pub request_id: Option<RequestId>,
    /// Commit time.
    pub at: DateTime<Utc>,
    /// The change.
    #[serde(flatten)]
    pub kind: EventKind,
}

impl LedgerEvent {
    /// Derives the events of a committed list of writes.
    #[must_use]
    pub fn from_writes(
        writes: &[Write],
        request_id: Option<RequestId>,
        at: DateTime<Utc>,
    ) -> Vec<Self> {
        writes
            .iter()
            .filter_map(|write| {
                let (account, kind) = match write {
                    Write::Balance(change) => (
                        change.account(),
                        EventKind::BalanceChanged {
                            balance: change.current(),
                        },
                    ),
                    Write::Insert(new) => (
                        new.record().owner,
                        EventKind::RecordCreated {
                            record: new.record().clone(),
                        },
                    ),
                    Write::Status(change) => (
                        change.owner(),
                        EventKind::RecordUpdated {
                            id: change.record(),
                            status: change.to(),
                        },
                    ),
                    Write::Remove(removal) => (
                        removal.owner(),
                        EventKind::RecordRemoved {
                            id: removal.record(),
                        },
                    ),
                    Write::Claim(_) => return None,
                };
                Some(Self {
                    account,
                    request_id,
                    at,
                    kind,
                })
            })
            .collect()
    }
}

/// Fan-out of ledger events to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LedgerEvent>,
}

impl EventBus {
    /// Creates a bus keeping at most `capacity` undelivered events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes events; returns how many subscribers were listening.
    ///
    /// Never blocks. With no subscribers the events are dropped.
    pub fn publish(&self, events: Vec<LedgerEvent>) -> usize {
        let mut listeners = 0;
        for event in events {
            listeners = self.sender.send(event).unwrap_or(0);
        }
        listeners
    }

    /// Subscribes to every event.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }

    /// Subscribes to the events of one account.
    #[must_use]
    pub fn subscribe_account(&self, account: AccountId) -> AccountFeed {
        AccountFeed {
            account,
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Something read from an [`AccountFeed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedItem {
    /// An event for the followed account.
    Event(LedgerEvent),
    /// This many events were dropped because the subscriber fell behind.
    Lagged(u64),
}

/// Events of a single account.
#[derive(Debug)]
pub struct AccountFeed {
    account: AccountId,
    receiver: broadcast::Receiver<LedgerEvent>,
}

impl AccountFeed {
    /// The followed account.
    #[must_use]
    pub const fn account(&self) -> AccountId {
        self.account
    }

    /// Waits for the next item; `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<FeedItem> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.account == self.account => return Some(FeedItem::Event(event)),
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => return Some(FeedItem::Lagged(missed)),
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
