//! Ledger repository: the PostgreSQL `LedgerStore`.
//!
//! Every atomic unit runs in one database transaction. Accounts are locked
//! with `SELECT ... FOR UPDATE` in ascending id order so that two transfers
//! between the same pair of accounts cannot deadlock each other; records and
//! mirrors are locked after the accounts. Writes are compare-and-set
//! updates, so a unit that raced past its locks fails instead of losing an
//! update. Deadlocks and serialization failures reported by PostgreSQL are
//! retried a bounded number of times.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::{debug, warn};

use bluepay_core::account::Account;
use bluepay_core::ledger::{
    ClaimedKey, Fingerprint, LedgerError, LedgerStore, OrderItem, Plan, PlanFn, ReadSet, Snapshot, TransactionRecord, Write,
};
use bluepay_shared::types::{AccountId, PageRequest, PageResponse, RequestId, TransactionId};

use super::account::to_account;
use crate::entities::{accounts, idempotency_keys, transactions};

/// Default number of retries after a deadlock or serialization failure.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

fn db_err(e: DbErr) -> LedgerError {
    LedgerError::Database(e.to_string())
}

/// True for errors PostgreSQL raises when it aborts one side of a conflict.
fn is_transient(message: &str) -> bool {
    message.contains("deadlock detected")
        || message.contains("could not serialize access")
        || message.contains("40P01")
        || message.contains("40001")
}

fn account_from(model: accounts::Model) -> Result<Account, LedgerError> {
    to_account(model).map_err(LedgerError::MalformedRecord)
}

fn record_from(model: transactions::Model) -> Result<TransactionRecord, LedgerError> {
    let order_items = model
        .order_items
        .map(serde_json::from_value::<Vec<OrderItem>>)
        .transpose()
        .map_err(|e| LedgerError::MalformedRecord(e.to_string()))?;

    Ok(TransactionRecord {
        id: TransactionId::from_uuid(model.id),
        owner: AccountId::from_uuid(model.owner_id),
        kind: model.kind.parse()?,
        status: model.status.parse()?,
        amount: model.amount,
        currency: model
            .currency
            .parse()
            .map_err(LedgerError::MalformedRecord)?,
        note: model.note,
        attachment_url: model.attachment_url,
        date: model.date.with_timezone(&Utc),
        other_party: AccountId::from_uuid(model.other_party_id),
        request_id: model.request_id.map(RequestId::from_uuid),
        order_items,
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn claimed_key(model: idempotency_keys::Model) -> ClaimedKey {
    ClaimedKey {
        request_id: RequestId::from_uuid(model.request_id),
        fingerprint: Fingerprint::from_stored(model.fingerprint),
    }
}

fn record_model(record: &TransactionRecord) -> Result<transactions::ActiveModel, LedgerError> {
    let order_items = record
        .order_items
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| LedgerError::Internal(e.to_string()))?;

    Ok(transactions::ActiveModel {
        id: Set(record.id.into_inner()),
        owner_id: Set(record.owner.into_inner()),
        kind: Set(record.kind.as_str().to_string()),
        status: Set(record.status.as_str().to_string()),
        amount: Set(record.amount),
        currency: Set(record.currency.code().to_string()),
        note: Set(record.note.clone()),
        attachment_url: Set(record.attachment_url.clone()),
        date: Set(record.date.into()),
        other_party_id: Set(record.other_party.into_inner()),
        request_id: Set(record.request_id.map(RequestId::into_inner)),
        order_items: Set(order_items),
        updated_at: Set(record.updated_at.into()),
    })
}

/// PostgreSQL implementation of the ledger storage port.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    db: DatabaseConnection,
    max_retries: u32,
}

impl PgLedgerStore {
    /// Creates a new ledger store.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Sets how often a unit is retried after a lock conflict.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Runs one attempt of an atomic unit.
    async fn attempt(&self, reads: &ReadSet, plan: &PlanFn<'_>) -> Result<Plan, LedgerError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let snapshot = lock_snapshot(&txn, reads).await?;
        // Dropping `txn` on error rolls back and releases the locks.
        let plan = plan(&snapshot)?;
        apply(&txn, &plan.writes).await?;

        txn.commit().await.map_err(db_err)?;
        Ok(plan)
    }
}

/// Locks and reads everything a unit declared.
async fn lock_snapshot<C: ConnectionTrait>(
    conn: &C,
    reads: &ReadSet,
) -> Result<Snapshot, LedgerError> {
    let mut snapshot = Snapshot::new();

    for id in reads.lock_order() {
        let row = accounts::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(conn)
            .await
            .map_err(db_err)?;
        if let Some(row) = row {
            snapshot.insert_account(account_from(row)?);
        }
    }

    for (owner, request_id) in &reads.mirrors {
        if let Some(record) = lock_mirror(conn, *owner, *request_id).await? {
            snapshot.insert_record(record);
        }
    }

    for of in &reads.mirrors_of {
        let Some(record) = lock_record(conn, of.owner, of.record).await? else {
            continue;
        };
        let request_id = record.request_id;
        snapshot.insert_record(record);
        if let Some(request_id) = request_id {
            if let Some(mirror) = lock_mirror(conn, of.counterpart, request_id).await? {
                snapshot.insert_record(mirror);
            }
        }
    }

    if let Some((owner, key)) = &reads.idempotency {
        let claimed = idempotency_keys::Entity::find_by_id((owner.into_inner(), key.as_str().to_string()))
            .one(conn)
            .await
            .map_err(db_err)?;
        if let Some(claimed) = claimed {
            let claimed = claimed_key(claimed);
            snapshot.set_claimed(claimed.request_id, claimed.fingerprint);
        }
    }

    Ok(snapshot)
}

async fn lock_record<C: ConnectionTrait>(
    conn: &C,
    owner: AccountId,
    id: TransactionId,
) -> Result<Option<TransactionRecord>, LedgerError> {
    transactions::Entity::find_by_id(id.into_inner())
        .filter(transactions::Column::OwnerId.eq(owner.into_inner()))
        .lock_exclusive()
        .one(conn)
        .await
        .map_err(db_err)?
        .map(record_from)
        .transpose()
}

async fn lock_mirror<C: ConnectionTrait>(
    conn: &C,
    owner: AccountId,
    request_id: RequestId,
) -> Result<Option<TransactionRecord>, LedgerError> {
    transactions::Entity::find()
        .filter(transactions::Column::OwnerId.eq(owner.into_inner()))
        .filter(transactions::Column::RequestId.eq(request_id.into_inner()))
        .lock_exclusive()
        .one(conn)
        .await
        .map_err(db_err)?
        .map(record_from)
        .transpose()
}

/// Applies writes in order inside an open transaction.
async fn apply<C: ConnectionTrait>(conn: &C, writes: &[Write]) -> Result<(), LedgerError> {
    let now = Utc::now();

    for write in writes {
        match write {
            Write::Balance(change) => {
                let result = accounts::Entity::update_many()
                    .col_expr(accounts::Column::Balance, Expr::value(change.current()))
                    .col_expr(accounts::Column::UpdatedAt, Expr::value(now))
                    .filter(accounts::Column::Id.eq(change.account().into_inner()))
                    .filter(accounts::Column::Balance.eq(change.previous()))
                    .exec(conn)
                    .await
                    .map_err(db_err)?;
                if result.rows_affected == 0 {
                    return Err(LedgerError::ConcurrentModification);
                }
            }
            Write::Insert(new) => {
                transactions::Entity::insert(record_model(new.record())?)
                    .exec_without_returning(conn)
                    .await
                    .map_err(db_err)?;
            }
            Write::Status(change) => {
                let result = transactions::Entity::update_many()
                    .col_expr(transactions::Column::Status, Expr::value(change.to().as_str()))
                    .col_expr(transactions::Column::UpdatedAt, Expr::value(change.at()))
                    .filter(transactions::Column::Id.eq(change.record().into_inner()))
                    .filter(transactions::Column::OwnerId.eq(change.owner().into_inner()))
                    .filter(transactions::Column::Status.eq(change.from().as_str()))
                    .exec(conn)
                    .await
                    .map_err(db_err)?;
                if result.rows_affected == 0 {
                    return Err(LedgerError::ConcurrentModification);
                }
            }
            Write::Remove(removal) => {
                let result = transactions::Entity::delete_many()
                    .filter(transactions::Column::Id.eq(removal.record().into_inner()))
                    .filter(transactions::Column::OwnerId.eq(removal.owner().into_inner()))
                    .exec(conn)
                    .await
                    .map_err(db_err)?;
                if result.rows_affected == 0 {
                    return Err(LedgerError::TransactionNotFound(removal.record()));
                }
            }
            Write::Claim(claim) => {
                let row = idempotency_keys::ActiveModel {
                    account_id: Set(claim.owner().into_inner()),
                    key: Set(claim.key().as_str().to_string()),
                    request_id: Set(claim.request_id().into_inner()),
                    fingerprint: Set(claim.fingerprint().as_str().to_string()),
                    created_at: Set(now.into()),
                };
                let inserted = idempotency_keys::Entity::insert(row)
                    .on_conflict(
                        OnConflict::columns([
                            idempotency_keys::Column::AccountId,
                            idempotency_keys::Column::Key,
                        ])
                        .do_nothing()
                        .to_owned(),
                    )
                    .exec_without_returning(conn)
                    .await
                    .map_err(db_err)?;
                if inserted == 0 {
                    let existing = idempotency_keys::Entity::find_by_id((
                        claim.owner().into_inner(),
                        claim.key().as_str().to_string(),
                    ))
                    .one(conn)
                    .await
                    .map_err(db_err)?
                    .ok_or(LedgerError::ConcurrentModification)?;
                    return Err(claim.conflict(&claimed_key(existing)));
                }
            }
        }
    }

    Ok(())
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn account(&self, id: AccountId) -> Result<Option<Account>, LedgerError> {
        accounts::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(account_from)
            .transpose()
    }

    async fn record(
        &self,
        owner: AccountId,
        id: TransactionId,
    ) -> Result<Option<TransactionRecord>, LedgerError> {
        transactions::Entity::find_by_id(id.into_inner())
            .filter(transactions::Column::OwnerId.eq(owner.into_inner()))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(record_from)
            .transpose()
    }

    async fn find_by_request(
        &self,
        owner: AccountId,
        request_id: RequestId,
    ) -> Result<Option<TransactionRecord>, LedgerError> {
        transactions::Entity::find()
            .filter(transactions::Column::OwnerId.eq(owner.into_inner()))
            .filter(transactions::Column::RequestId.eq(request_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(record_from)
            .transpose()
    }

    async fn history(
        &self,
        owner: AccountId,
        page: PageRequest,
    ) -> Result<PageResponse<TransactionRecord>, LedgerError> {
        let query = transactions::Entity::find()
            .filter(transactions::Column::OwnerId.eq(owner.into_inner()));

        let total = query.clone().count(&self.db).await.map_err(db_err)?;
        let rows = query
            .order_by_desc(transactions::Column::Date)
            .order_by_desc(transactions::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let data = rows
            .into_iter()
            .map(record_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PageResponse::new(data, page.page, page.per_page, total))
    }

    async fn commit_batch(&self, writes: Vec<Write>) -> Result<(), LedgerError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        apply(&txn, &writes).await?;
        txn.commit().await.map_err(db_err)?;
        debug!(writes = writes.len(), "Ledger batch committed");
        Ok(())
    }

    async fn run_atomic(&self, reads: &ReadSet, plan: &PlanFn<'_>) -> Result<Plan, LedgerError> {
        let mut retries = 0;
        loop {
            match self.attempt(reads, plan).await {
                Ok(plan) => {
                    debug!(writes = plan.writes.len(), retries, "Ledger unit committed");
                    return Ok(plan);
                }
                // Lost the race on the key; the winner's result is the answer.
                Err(LedgerError::DuplicateSubmission(request_id)) => {
                    return Ok(Plan::replay(request_id));
                }
                Err(LedgerError::Database(message))
                    if is_transient(&message) && retries < self.max_retries =>
                {
                    retries += 1;
                    warn!(retries, error = %message, "Retrying ledger unit after lock conflict");
                }
                Err(e) if e.is_retryable() && retries < self.max_retries => {
                    retries += 1;
                    warn!(retries, "Retrying ledger unit after concurrent modification");
                }
                Err(LedgerError::Database(message)) if is_transient(&message) => {
                    return Err(LedgerError::ConcurrentModification);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluepay_core::ledger::{RecordKind, RecordStatus};
    use bluepay_shared::types::Currency;
    use rust_decimal_macros::dec;

    fn row() -> transactions::Model {
        let now = Utc::now().into();
        transactions::Model {
            id: uuid::Uuid::now_v7(),
            owner_id: uuid::Uuid::now_v7(),
            kind: "receipt".into(),
            status: "Pending".into(),
            amount: dec!(12.50),
            currency: "USD".into(),
            note: "lunch".into(),
            attachment_url: None,
            date: now,
            other_party_id: uuid::Uuid::now_v7(),
            request_id: Some(uuid::Uuid::now_v7()),
            order_items: Some(serde_json::json!([{ "name": "Soup", "price": "12.50" }])),
            updated_at: now,
        }
    }

    #[test]
    fn test_record_from_row() {
        let record = record_from(row()).unwrap();
        assert_eq!(record.kind, RecordKind::Receipt);
        assert_eq!(record.status, RecordStatus::Pending);
        assert_eq!(record.currency, Currency::Usd);
        let items = record.order_items.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].price, dec!(12.50));
    }

    #[test]
    fn test_record_from_row_rejects_unknown_status() {
        let bad = transactions::Model {
            status: "Settled".into(),
            ..row()
        };
        assert!(record_from(bad).is_err());
    }

    #[test]
    fn test_record_from_row_rejects_malformed_items() {
        let bad = transactions::Model {
            order_items: Some(serde_json::json!({ "name": "Soup" })),
            ..row()
        };
        assert!(matches!(record_from(bad), Err(LedgerError::MalformedRecord(_))));
    }

    #[test]
    fn test_claimed_key_from_row() {
        let request_id = uuid::Uuid::now_v7();
        let claimed = claimed_key(idempotency_keys::Model {
            account_id: uuid::Uuid::now_v7(),
            key: "k-1".into(),
            request_id,
            fingerprint: "transfer:a:b:10:-".into(),
            created_at: Utc::now().into(),
        });
        assert_eq!(claimed.request_id, RequestId::from_uuid(request_id));
        assert_eq!(claimed.fingerprint.as_str(), "transfer:a:b:10:-");
    }

    #[test]
    fn test_transient_errors() {
        assert!(is_transient("error returned from database: deadlock detected"));
        assert!(is_transient("could not serialize access due to concurrent update"));
        assert!(!is_transient("relation \"accounts\" does not exist"));
    }
}
