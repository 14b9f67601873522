use std::collections::HashSet;

use async_trait::async_trait;
use tracing::debug;

use bluepay_shared::types::{AccountId, PageRequest, PageResponse, RequestId, TransactionId};

use super::{MemoryBackend, State};
use crate::account::Account;
use crate::ledger::{
    ClaimedKey, LedgerError, LedgerStore, Plan, PlanFn, ReadSet, Snapshot, TransactionRecord, Write,
};

#[async_trait]
impl LedgerStore for MemoryBackend {
    async fn account(&self, id: AccountId) -> Result<Option<Account>, LedgerError> {
        Ok(self.state.lock().await.accounts.get(&id).cloned())
    }

    async fn record(
        &self,
        owner: AccountId,
        id: TransactionId,
    ) -> Result<Option<TransactionRecord>, LedgerError> {
        Ok(self.state.lock().await.record(owner, id).cloned())
    }

    async fn find_by_request(
        &self,
        owner: AccountId,
        request_id: RequestId,
    ) -> Result<Option<TransactionRecord>, LedgerError> {
        Ok(self
            .state
            .lock()
            .await
            .find_by_request(owner, request_id)
            .cloned())
    }

    async fn history(
        &self,
        owner: AccountId,
        page: PageRequest,
    ) -> Result<PageResponse<TransactionRecord>, LedgerError> {
        let state = self.state.lock().await;
        let mut records: Vec<_> = state
            .records
            .values()
            .filter(|r| r.owner == owner)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));

        let total = records.len() as u64;
        let data = records
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.limit()).unwrap_or(usize::MAX))
            .collect();
        Ok(PageResponse::new(data, page.page, page.per_page, total))
    }

    async fn commit_batch(&self, writes: Vec<Write>) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        check(&state, &writes)?;
        apply(&mut state, &writes);
        Ok(())
    }

    async fn run_atomic(&self, reads: &ReadSet, plan: &PlanFn<'_>) -> Result<Plan, LedgerError> {
        let mut state = self.state.lock().await;
        let snapshot = read_snapshot(&state, reads);
        let plan = plan(&snapshot)?;

        match check(&state, &plan.writes) {
            Ok(()) => {}
            Err(LedgerError::DuplicateSubmission(request_id)) => return Ok(Plan::replay(request_id)),
            Err(e) => return Err(e),
        }
        apply(&mut state, &plan.writes);
        debug!(writes = plan.writes.len(), "Memory unit committed");
        Ok(plan)
    }
}

fn read_snapshot(state: &State, reads: &ReadSet) -> Snapshot {
    let mut snapshot = Snapshot::new();

    for id in reads.lock_order() {
        if let Some(account) = state.accounts.get(&id) {
            snapshot.insert_account(account.clone());
        }
    }
    for &(owner, request_id) in &reads.mirrors {
        if let Some(record) = state.find_by_request(owner, request_id) {
            snapshot.insert_record(record.clone());
        }
    }
    for lookup in &reads.mirrors_of {
        let Some(record) = state.record(lookup.owner, lookup.record) else {
            continue;
        };
        if let Some(mirror) = record
            .request_id
            .and_then(|rid| state.find_by_request(lookup.counterpart, rid))
        {
            snapshot.insert_record(mirror.clone());
        }
        snapshot.insert_record(record.clone());
    }
    if let Some((owner, key)) = &reads.idempotency {
        if let Some(claimed) = state.idempotency.get(&(*owner, key.clone())) {
            snapshot.set_claimed(claimed.request_id, claimed.fingerprint.clone());
        }
    }

    snapshot
}

/// Verifies every write against the current state without changing it.
///
/// A plan touches each account and record at most once, so checking all
/// writes against the state before the unit is enough.
fn check(state: &State, writes: &[Write]) -> Result<(), LedgerError> {
    let mut accounts = HashSet::new();
    let mut records = HashSet::new();

    for write in writes {
        match write {
            Write::Balance(change) => {
                let account = state
                    .accounts
                    .get(&change.account())
                    .ok_or(LedgerError::AccountNotFound(change.account()))?;
                if account.balance != change.previous() {
                    return Err(LedgerError::ConcurrentModification);
                }
                if !accounts.insert(change.account()) {
                    return Err(LedgerError::Internal(format!(
                        "account {} written twice in one unit",
                        change.account()
                    )));
                }
            }
            Write::Insert(new) => {
                let id = new.record().id;
                if state.records.contains_key(&id) || !records.insert(id) {
                    return Err(LedgerError::Internal(format!("record {id} already exists")));
                }
            }
            Write::Status(change) => {
                let record = state
                    .record(change.owner(), change.record())
                    .ok_or(LedgerError::TransactionNotFound(change.record()))?;
                if record.status != change.from() {
                    return Err(LedgerError::ConcurrentModification);
                }
                if !records.insert(change.record()) {
                    return Err(LedgerError::Internal(format!(
                        "record {} written twice in one unit",
                        change.record()
                    )));
                }
            }
            Write::Remove(removal) => {
                if state.record(removal.owner(), removal.record()).is_none()
                    || !records.insert(removal.record())
                {
                    return Err(LedgerError::TransactionNotFound(removal.record()));
                }
            }
            Write::Claim(claim) => {
                if let Some(existing) = state.idempotency.get(&(claim.owner(), claim.key().clone())) {
                    return Err(claim.conflict(existing));
                }
            }
        }
    }
    Ok(())
}

/// Applies writes that passed [`check`].
fn apply(state: &mut State, writes: &[Write]) {
    for write in writes {
        match write {
            Write::Balance(change) => {
                if let Some(account) = state.accounts.get_mut(&change.account()) {
                    account.balance = change.current();
                }
            }
            Write::Insert(new) => state.insert_record(new.record().clone()),
            Write::Status(change) => {
                if let Some(record) = state.records.get_mut(&change.record()) {
                    record.status = change.to();
                    record.updated_at = change.at();
                }
            }
            Write::Remove(removal) => state.remove_record(removal.record()),
            Write::Claim(claim) => {
                state.idempotency.insert(
                    (claim.owner(), claim.key().clone()),
                    ClaimedKey {
                        request_id: claim.request_id(),
                        fingerprint: claim.fingerprint().clone(),
                    },
                );
            }
        }
    }
}
