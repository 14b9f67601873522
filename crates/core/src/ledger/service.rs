//! Ledger service.
//!
//! Orchestrates the four money/request operations over a [`LedgerStore`].
//! The service keeps no state between calls: every decision is taken by the
//! planner against a snapshot read inside the store's atomic unit, and every
//! committed change is broadcast on the [`EventBus`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use bluepay_shared::types::{AccountId, Money, PageRequest, PageResponse, RequestId, TransactionId};

use super::error::LedgerError;
use super::events::{EventBus, LedgerEvent};
use super::plan;
use super::store::{LedgerStore, Plan, ReadSet};
use super::types::{
    MirrorUpdate, PaymentRequestInput, Settlement, TransactionRecord, TransferInput,
};
use super::validation::{validate_order_items, validate_parties};

/// Entry point for every balance and record mutation.
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    events: EventBus,
}

impl LedgerService {
    /// Creates a service over `store`, publishing on `events`.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, events: EventBus) -> Self {
        Self { store, events }
    }

    /// The bus committed changes are published on.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Moves money from payer to payee.
    ///
    /// Without `linked_request` this creates a `Completed` pair. With it, the
    /// open request is paid: both of its records become `Completed` and no new
    /// record is created.
    ///
    /// # Errors
    ///
    /// Validation errors before the store is touched; `AccountNotFound`,
    /// `CurrencyMismatch`, `InsufficientFunds`, `IdempotencyKeyReused` and
    /// request errors from inside the atomic unit; store errors unchanged.
    pub async fn transfer_funds(&self, input: TransferInput) -> Result<Settlement, LedgerError> {
        validate_parties(input.payer, input.payee, input.amount)?;

        let mut reads = ReadSet::new()
            .account(input.payer)
            .account(input.payee)
            .idempotency(input.payer, input.idempotency_key.clone());
        if let Some(request_id) = input.linked_request {
            reads = reads
                .mirror(input.payer, request_id)
                .mirror(input.payee, request_id);
        }

        let now = Utc::now();
        let plan = self
            .store
            .run_atomic(&reads, &|snapshot| plan::plan_transfer(&input, snapshot, now))
            .await?;

        let settlement = self.finish(plan, [input.payer, input.payee], now).await?;
        info!(
            payer = %input.payer,
            payee = %input.payee,
            amount = %input.amount,
            request_id = ?settlement.request_id,
            confirmation = input.linked_request.is_some(),
            replayed = settlement.replayed,
            "Funds transferred"
        );
        Ok(settlement)
    }

    /// Asks `payer` for money on behalf of `requester`.
    ///
    /// Creates the requester's `Pending` receipt and the payer's `Requested`
    /// payment together. No balance changes. Without an idempotency key the
    /// pair is written as one batch; with a key the accounts are locked and
    /// the key is checked and claimed in the same unit.
    ///
    /// # Errors
    ///
    /// Validation errors, `AccountNotFound`, `CurrencyMismatch`,
    /// `IdempotencyKeyReused`, store errors.
    pub async fn create_payment_request(
        &self,
        input: PaymentRequestInput,
    ) -> Result<Settlement, LedgerError> {
        validate_parties(input.requester, input.payer, input.amount)?;
        if let Some(items) = &input.order_items {
            validate_order_items(items, input.amount)?;
        }

        let now = Utc::now();
        let plan = if input.idempotency_key.is_some() {
            let reads = ReadSet::new()
                .account(input.requester)
                .account(input.payer)
                .idempotency(input.requester, input.idempotency_key.clone());
            self.store
                .run_atomic(&reads, &|snapshot| {
                    plan::plan_keyed_payment_request(&input, snapshot, now)
                })
                .await?
        } else {
            let requester = self
                .store
                .account(input.requester)
                .await?
                .ok_or(LedgerError::AccountNotFound(input.requester))?;
            let payer = self
                .store
                .account(input.payer)
                .await?
                .ok_or(LedgerError::AccountNotFound(input.payer))?;
            let plan = plan::plan_payment_request(&input, &requester, &payer, now)?;
            self.store.commit_batch(plan.writes.clone()).await?;
            plan
        };

        let settlement = self.finish(plan, [input.requester, input.payer], now).await?;
        info!(
            requester = %input.requester,
            payer = %input.payer,
            amount = %input.amount,
            request_id = ?settlement.request_id,
            replayed = settlement.replayed,
            "Payment request created"
        );
        Ok(settlement)
    }

    /// The payer refuses an open request.
    ///
    /// The payer's record is removed and the requester's record becomes
    /// `Failed`. A record without a request id is removed alone.
    ///
    /// # Errors
    ///
    /// `TransactionNotFound`, `CounterpartyMismatch`, `InvalidTransition`,
    /// store errors.
    pub async fn decline_request(
        &self,
        payer: AccountId,
        payer_record: TransactionId,
        requester: AccountId,
    ) -> Result<Settlement, LedgerError> {
        let reads = ReadSet::new().mirror_of(payer, payer_record, requester);
        let now = Utc::now();
        let plan = self
            .store
            .run_atomic(&reads, &|snapshot| {
                plan::plan_decline(payer, payer_record, requester, snapshot, now)
            })
            .await?;

        let settlement = self.finish(plan, [payer, requester], now).await?;
        info!(
            payer = %payer,
            requester = %requester,
            record = %payer_record,
            mirror = ?settlement.mirror,
            "Payment request declined"
        );
        Ok(settlement)
    }

    /// The requester withdraws an open request. Both records become
    /// `Cancelled`.
    ///
    /// # Errors
    ///
    /// `TransactionNotFound`, `CounterpartyMismatch`, `InvalidTransition`,
    /// store errors.
    pub async fn cancel_request(
        &self,
        requester: AccountId,
        record: TransactionId,
        payer: AccountId,
    ) -> Result<Settlement, LedgerError> {
        let reads = ReadSet::new().mirror_of(requester, record, payer);
        let now = Utc::now();
        let plan = self
            .store
            .run_atomic(&reads, &|snapshot| {
                plan::plan_cancel(requester, record, payer, snapshot, now)
            })
            .await?;

        let settlement = self.finish(plan, [requester, payer], now).await?;
        info!(
            requester = %requester,
            payer = %payer,
            record = %record,
            mirror = ?settlement.mirror,
            "Payment request cancelled"
        );
        Ok(settlement)
    }

    /// Lists an account's records, newest first.
    pub async fn history(
        &self,
        account: AccountId,
        page: PageRequest,
    ) -> Result<PageResponse<TransactionRecord>, LedgerError> {
        self.store.history(account, page.normalized()).await
    }

    /// Reads one of an account's records.
    ///
    /// # Errors
    ///
    /// `TransactionNotFound` when it does not exist or belongs to someone else.
    pub async fn record(
        &self,
        account: AccountId,
        id: TransactionId,
    ) -> Result<TransactionRecord, LedgerError> {
        self.store
            .record(account, id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(id))
    }

    /// Current balance of an account.
    pub async fn balance(&self, account: AccountId) -> Result<Money, LedgerError> {
        self.store
            .account(account)
            .await?
            .map(|a| a.balance_money())
            .ok_or(LedgerError::AccountNotFound(account))
    }

    /// Publishes a committed plan, or loads the original records of a replay.
    async fn finish(
        &self,
        plan: Plan,
        parties: [AccountId; 2],
        at: DateTime<Utc>,
    ) -> Result<Settlement, LedgerError> {
        if plan.settlement.replayed {
            if let Some(request_id) = plan.settlement.request_id {
                debug!(request_id = %request_id, "Submission replayed");
                return self.replayed(request_id, parties).await;
            }
            return Ok(plan.settlement);
        }

        if plan.settlement.mirror == MirrorUpdate::Missing {
            warn!(
                request_id = ?plan.settlement.request_id,
                "Operation committed without its counterpart record"
            );
        }

        let events = LedgerEvent::from_writes(&plan.writes, plan.settlement.request_id, at);
        let listeners = self.events.publish(events);
        debug!(listeners, "Ledger events published");

        Ok(plan.settlement)
    }

    /// Builds the settlement of an earlier submission from the store.
    async fn replayed(
        &self,
        request_id: RequestId,
        parties: [AccountId; 2],
    ) -> Result<Settlement, LedgerError> {
        let mut records = Vec::with_capacity(2);
        for party in parties {
            if let Some(record) = self.store.find_by_request(party, request_id).await? {
                records.push(record);
            }
        }
        let mirror = if records.len() == 2 {
            MirrorUpdate::Applied
        } else {
            MirrorUpdate::Missing
        };
        Ok(Settlement {
            request_id: Some(request_id),
            records,
            mirror,
            replayed: true,
        })
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
