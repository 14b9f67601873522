//! Persistence port for the ledger.
//!
//! A store offers two write primitives:
//!
//! - [`LedgerStore::run_atomic`]: lock and read a [`ReadSet`], hand the
//!   resulting [`Snapshot`] to a planning function, and apply the returned
//!   writes in the same unit. The planning function may be called again if
//!   the store retries after a lock conflict.
//! - [`LedgerStore::commit_batch`]: apply a list of writes all-or-nothing
//!   without reading first.
//!
//! Writes are opaque values built by this crate only, so balances and
//! statuses cannot be changed by code outside the ledger.

use std::collections::HashMap;

use async_trait::async_trait;

use bluepay_shared::types::{AccountId, PageRequest, PageResponse, RequestId, TransactionId};

use super::balance::BalanceChange;
use super::error::LedgerError;
use super::state::{Removal, StatusChange};
use super::types::{Fingerprint, IdempotencyKey, Settlement, TransactionRecord};
use crate::account::Account;

/// Look up the counterpart of a record inside the atomic unit.
///
/// The store reads `(owner, record)` and then the record of `counterpart`
/// carrying the same `request_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorOf {
    /// Owner of the starting record.
    pub owner: AccountId,
    /// The starting record.
    pub record: TransactionId,
    /// Account expected to hold the mirror.
    pub counterpart: AccountId,
}

/// Everything an atomic unit must lock and read before planning.
#[derive(Debug, Clone, Default)]
pub struct ReadSet {
    /// Accounts to lock, in any order; stores lock them sorted.
    pub accounts: Vec<AccountId>,
    /// Records by owner and correlation id.
    pub mirrors: Vec<(AccountId, RequestId)>,
    /// Records plus their counterpart.
    pub mirrors_of: Vec<MirrorOf>,
    /// Idempotency key to resolve.
    pub idempotency: Option<(AccountId, IdempotencyKey)>,
}

impl ReadSet {
    /// Creates an empty read set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account.
    #[must_use]
    pub fn account(mut self, id: AccountId) -> Self {
        self.accounts.push(id);
        self
    }

    /// Adds a record looked up by correlation id.
    #[must_use]
    pub fn mirror(mut self, owner: AccountId, request_id: RequestId) -> Self {
        self.mirrors.push((owner, request_id));
        self
    }

    /// Adds a record and its counterpart.
    #[must_use]
    pub fn mirror_of(mut self, owner: AccountId, record: TransactionId, counterpart: AccountId) -> Self {
        self.mirrors_of.push(MirrorOf {
            owner,
            record,
            counterpart,
        });
        self
    }

    /// Sets the idempotency key to resolve.
    #[must_use]
    pub fn idempotency(mut self, owner: AccountId, key: Option<IdempotencyKey>) -> Self {
        self.idempotency = key.map(|key| (owner, key));
        self
    }

    /// Returns the accounts in lock order, without duplicates.
    #[must_use]
    pub fn lock_order(&self) -> Vec<AccountId> {
        let mut ids = self.accounts.clone();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// An idempotency key found already bound when a unit started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedKey {
    /// Request created by the first submission.
    pub request_id: RequestId,
    /// What the first submission asked for.
    pub fingerprint: Fingerprint,
}

/// State read by an atomic unit.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    accounts: HashMap<AccountId, Account>,
    records: HashMap<TransactionId, TransactionRecord>,
    by_request: HashMap<(AccountId, RequestId), TransactionId>,
    claimed: Option<ClaimedKey>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account that was read.
    pub fn insert_account(&mut self, account: Account) {
        self.accounts.insert(account.id, account);
    }

    /// Adds a record that was read.
    pub fn insert_record(&mut self, record: TransactionRecord) {
        if let Some(request_id) = record.request_id {
            self.by_request.insert((record.owner, request_id), record.id);
        }
        self.records.insert(record.id, record);
    }

    /// Records the submission an idempotency key is already bound to.
    pub fn set_claimed(&mut self, request_id: RequestId, fingerprint: Fingerprint) {
        self.claimed = Some(ClaimedKey {
            request_id,
            fingerprint,
        });
    }

    /// Returns a locked account.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` when the account does not exist.
    pub fn account(&self, id: AccountId) -> Result<&Account, LedgerError> {
        self.accounts.get(&id).ok_or(LedgerError::AccountNotFound(id))
    }

    /// Returns a record if it exists and belongs to `owner`.
    #[must_use]
    pub fn record(&self, owner: AccountId, id: TransactionId) -> Option<&TransactionRecord> {
        self.records.get(&id).filter(|r| r.owner == owner)
    }

    /// Returns the record of `owner` with the given correlation id.
    #[must_use]
    pub fn find_by_request(&self, owner: AccountId, request_id: RequestId) -> Option<&TransactionRecord> {
        self.by_request
            .get(&(owner, request_id))
            .and_then(|id| self.records.get(id))
    }

    /// Submission the idempotency key was already bound to, if any.
    #[must_use]
    pub const fn claimed(&self) -> Option<&ClaimedKey> {
        self.claimed.as_ref()
    }
}

/// A record to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord(TransactionRecord);

impl NewRecord {
    pub(crate) fn new(record: TransactionRecord) -> Self {
        Self(record)
    }

    /// The record to insert.
    #[must_use]
    pub fn record(&self) -> &TransactionRecord {
        &self.0
    }
}

/// Binds an idempotency key to the request it created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyClaim {
    owner: AccountId,
    key: IdempotencyKey,
    request_id: RequestId,
    fingerprint: Fingerprint,
}

impl KeyClaim {
    pub(crate) fn new(
        owner: AccountId,
        key: IdempotencyKey,
        request_id: RequestId,
        fingerprint: Fingerprint,
    ) -> Self {
        Self {
            owner,
            key,
            request_id,
            fingerprint,
        }
    }

    /// The error a store reports when this key is already bound to
    /// `existing`: a duplicate of the same submission, or a reuse.
    #[must_use]
    pub fn conflict(&self, existing: &ClaimedKey) -> LedgerError {
        if existing.fingerprint == self.fingerprint {
            LedgerError::DuplicateSubmission(existing.request_id)
        } else {
            LedgerError::IdempotencyKeyReused(self.key.as_str().to_string())
        }
    }

    /// Account the key is scoped to.
    #[must_use]
    pub const fn owner(&self) -> AccountId {
        self.owner
    }

    /// The key.
    #[must_use]
    pub fn key(&self) -> &IdempotencyKey {
        &self.key
    }

    /// Request created under the key.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// What the submission asked for.
    #[must_use]
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}

/// One change a store must apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    /// Compare-and-set an account balance.
    Balance(BalanceChange),
    /// Create a record.
    Insert(NewRecord),
    /// Compare-and-set a record status.
    Status(StatusChange),
    /// Delete a record.
    Remove(Removal),
    /// Claim an idempotency key; fails with [`KeyClaim::conflict`] if taken.
    Claim(KeyClaim),
}

/// Output of a planning function: what to write and what to report.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Writes to apply, in order.
    pub writes: Vec<Write>,
    /// Result returned to the caller once the writes are committed.
    pub settlement: Settlement,
}

/// Planning function run inside an atomic unit.
pub type PlanFn<'a> = dyn Fn(&Snapshot) -> Result<Plan, LedgerError> + Send + Sync + 'a;

/// Storage backend for accounts' balances and transaction records.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Reads one account without locking it.
    async fn account(&self, id: AccountId) -> Result<Option<Account>, LedgerError>;

    /// Reads one record of `owner`.
    async fn record(
        &self,
        owner: AccountId,
        id: TransactionId,
    ) -> Result<Option<TransactionRecord>, LedgerError>;

    /// Finds the record of `owner` with the given correlation id.
    async fn find_by_request(
        &self,
        owner: AccountId,
        request_id: RequestId,
    ) -> Result<Option<TransactionRecord>, LedgerError>;

    /// Lists the records of `owner`, newest first.
    async fn history(
        &self,
        owner: AccountId,
        page: PageRequest,
    ) -> Result<PageResponse<TransactionRecord>, LedgerError>;

    /// Applies `writes` all-or-nothing.
    async fn commit_batch(&self, writes: Vec<Write>) -> Result<(), LedgerError>;

    /// Locks and reads `reads`, plans, and applies the plan's writes in one
    /// unit. Returns the plan that was applied.
    async fn run_atomic(&self, reads: &ReadSet, plan: &PlanFn<'_>) -> Result<Plan, LedgerError>;
}
