//! In-memory backend.
//!
//! Implements every storage port over one mutex-guarded state. A unit of
//! work runs entirely under the lock: its writes are all checked against the
//! current state first and only then applied in place, so units are
//! serializable and all-or-nothing. Used by tests and by the server's
//! `memory` backend.

mod directory;
mod ledger;
mod tickets;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;

use bluepay_shared::types::{AccountId, RequestId, TicketTemplateId, TransactionId, WalletItemId};

use crate::account::Account;
use crate::ledger::{ClaimedKey, IdempotencyKey, TransactionRecord};
use crate::tickets::{TicketTemplate, WalletItem};

#[derive(Debug, Default)]
struct State {
    accounts: BTreeMap<AccountId, Account>,
    records: HashMap<TransactionId, TransactionRecord>,
    by_request: HashMap<(AccountId, RequestId), TransactionId>,
    idempotency: HashMap<(AccountId, IdempotencyKey), ClaimedKey>,
    templates: HashMap<TicketTemplateId, TicketTemplate>,
    wallet: HashMap<WalletItemId, WalletItem>,
}

impl State {
    fn find_by_request(&self, owner: AccountId, request_id: RequestId) -> Option<&TransactionRecord> {
        self.by_request
            .get(&(owner, request_id))
            .and_then(|id| self.records.get(id))
    }

    fn insert_record(&mut self, record: TransactionRecord) {
        if let Some(request_id) = record.request_id {
            self.by_request.insert((record.owner, request_id), record.id);
        }
        self.records.insert(record.id, record);
    }

    fn remove_record(&mut self, id: TransactionId) {
        if let Some(removed) = self.records.remove(&id) {
            if let Some(request_id) = removed.request_id {
                self.by_request.remove(&(removed.owner, request_id));
            }
        }
    }

    fn record(&self, owner: AccountId, id: TransactionId) -> Option<&TransactionRecord> {
        self.records.get(&id).filter(|r| r.owner == owner)
    }
}

/// Shared in-memory storage. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an account as given, balance included.
    ///
    /// Fixture loading for tests and local development; production balances
    /// only change through the ledger.
    pub async fn seed_account(&self, account: Account) {
        self.state.lock().await.accounts.insert(account.id, account);
    }

    /// Stores a record as given.
    ///
    /// Fixture loading, e.g. for records created before request ids existed.
    pub async fn seed_record(&self, record: TransactionRecord) {
        self.state.lock().await.insert_record(record);
    }
}
