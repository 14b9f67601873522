use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use bluepay_shared::types::{AccountId, Currency, PageRequest, RequestId, TransactionId};

use super::*;
use crate::account::{Account, AccountType};
use crate::ledger::events::{EventKind, FeedItem};
use crate::ledger::types::{IdempotencyKey, OrderItem, RecordKind, RecordStatus};
use crate::memory::MemoryBackend;

struct Fixture {
    backend: MemoryBackend,
    service: LedgerService,
}

impl Fixture {
    fn new() -> Self {
        let backend = MemoryBackend::new();
        let service = LedgerService::new(Arc::new(backend.clone()), EventBus::new(64));
        Self { backend, service }
    }

    async fn account(&self, balance: Decimal) -> AccountId {
        self.account_in(balance, Currency::Usd).await
    }

    async fn account_in(&self, balance: Decimal, currency: Currency) -> AccountId {
        let id = AccountId::new();
        self.backend
            .seed_account(Account {
                id,
                first_name: "Test".into(),
                last_name: "Account".into(),
                email: format!("{id}@example.com"),
                username: None,
                balance,
                currency,
                account_type: AccountType::Personal,
                onboarded: true,
                created_at: Utc::now(),
            })
            .await;
        id
    }

    async fn balance(&self, id: AccountId) -> Decimal {
        self.service.balance(id).await.unwrap().amount
    }

    async fn history(&self, id: AccountId) -> Vec<TransactionRecord> {
        self.service
            .history(id, PageRequest::default())
            .await
            .unwrap()
            .data
    }

    async fn request(&self, requester: AccountId, payer: AccountId, amount: Decimal) -> Settlement {
        self.service
            .create_payment_request(request_input(requester, payer, amount))
            .await
            .unwrap()
    }
}

fn transfer(payer: AccountId, payee: AccountId, amount: Decimal, note: &str) -> TransferInput {
    TransferInput {
        payer,
        payee,
        amount,
        note: note.to_string(),
        attachment_url: None,
        linked_request: None,
        idempotency_key: None,
    }
}

fn request_input(requester: AccountId, payer: AccountId, amount: Decimal) -> PaymentRequestInput {
    PaymentRequestInput {
        requester,
        payer,
        amount,
        note: "rent".to_string(),
        attachment_url: None,
        order_items: None,
        idempotency_key: None,
    }
}

// Scenario A
#[tokio::test]
async fn test_direct_transfer() {
    let fx = Fixture::new();
    let p = fx.account(dec!(100.00)).await;
    let q = fx.account(dec!(5.00)).await;

    let settlement = fx
        .service
        .transfer_funds(transfer(p, q, dec!(40.00), "lunch"))
        .await
        .unwrap();

    assert_eq!(fx.balance(p).await, dec!(60.00));
    assert_eq!(fx.balance(q).await, dec!(45.00));
    assert!(settlement.is_complete());
    assert!(!settlement.replayed);

    let payer_side = fx.history(p).await;
    let payee_side = fx.history(q).await;
    assert_eq!(payer_side.len(), 1);
    assert_eq!(payee_side.len(), 1);
    assert_eq!(payer_side[0].kind, RecordKind::Payment);
    assert_eq!(payee_side[0].kind, RecordKind::Receipt);
    assert_eq!(payer_side[0].status, RecordStatus::Completed);
    assert_eq!(payee_side[0].status, RecordStatus::Completed);
    assert_eq!(payer_side[0].request_id, payee_side[0].request_id);
    assert_eq!(payer_side[0].other_party, q);
    assert_eq!(payer_side[0].note, "lunch");
}

// Scenario B
#[tokio::test]
async fn test_insufficient_funds_changes_nothing() {
    let fx = Fixture::new();
    let p = fx.account(dec!(10.00)).await;
    let q = fx.account(dec!(0)).await;

    let err = fx
        .service
        .transfer_funds(transfer(p, q, dec!(40.00), ""))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
    assert_eq!(fx.balance(p).await, dec!(10.00));
    assert_eq!(fx.balance(q).await, dec!(0));
    assert!(fx.history(p).await.is_empty());
    assert!(fx.history(q).await.is_empty());
}

// Scenario C
#[tokio::test]
async fn test_confirming_a_request() {
    let fx = Fixture::new();
    let r = fx.account(dec!(0)).await;
    let p = fx.account(dec!(50.00)).await;

    let request = fx.request(r, p, dec!(25.00)).await;
    let rid = request.request_id.unwrap();

    let mut input = transfer(p, r, dec!(25.00), "");
    input.linked_request = Some(rid);
    let settlement = fx.service.transfer_funds(input).await.unwrap();

    assert_eq!(settlement.mirror, MirrorUpdate::Applied);
    assert_eq!(fx.balance(p).await, dec!(25.00));
    assert_eq!(fx.balance(r).await, dec!(25.00));

    let payer_side = fx.history(p).await;
    let requester_side = fx.history(r).await;
    assert_eq!(payer_side.len(), 1, "no third record");
    assert_eq!(requester_side.len(), 1, "no third record");
    assert_eq!(payer_side[0].status, RecordStatus::Completed);
    assert_eq!(requester_side[0].status, RecordStatus::Completed);
}

// Scenario D
#[tokio::test]
async fn test_declining_a_request() {
    let fx = Fixture::new();
    let r = fx.account(dec!(0)).await;
    let p = fx.account(dec!(50.00)).await;

    let request = fx.request(r, p, dec!(25.00)).await;
    let payer_record = request.record_for(p).unwrap().id;

    let settlement = fx.service.decline_request(p, payer_record, r).await.unwrap();
    assert_eq!(settlement.mirror, MirrorUpdate::Applied);

    assert!(fx.history(p).await.is_empty());
    let requester_side = fx.history(r).await;
    assert_eq!(requester_side.len(), 1);
    assert_eq!(requester_side[0].status, RecordStatus::Failed);
    assert_eq!(fx.balance(p).await, dec!(50.00));
    assert_eq!(fx.balance(r).await, dec!(0));

    // Terminal: the declined request cannot be touched again.
    assert!(matches!(
        fx.service.decline_request(p, payer_record, r).await,
        Err(LedgerError::TransactionNotFound(_))
    ));
    let mut confirm = transfer(p, r, dec!(25.00), "");
    confirm.linked_request = request.request_id;
    assert!(matches!(
        fx.service.transfer_funds(confirm).await,
        Err(LedgerError::RequestNotFound(_))
    ));
}

// Scenario E
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_debits_never_overdraw() {
    let fx = Fixture::new();
    let p = fx.account(dec!(100.00)).await;
    let q = fx.account(dec!(0)).await;
    let s = fx.account(dec!(0)).await;

    let first = {
        let service = fx.service.clone();
        tokio::spawn(async move { service.transfer_funds(transfer(p, q, dec!(70.00), "")).await })
    };
    let second = {
        let service = fx.service.clone();
        tokio::spawn(async move { service.transfer_funds(transfer(p, s, dec!(60.00), "")).await })
    };

    let results = [first.await.unwrap(), second.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let overdrawn = results
        .iter()
        .filter(|r| matches!(r, Err(LedgerError::InsufficientFunds { .. })))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(overdrawn, 1);
    let remaining = fx.balance(p).await;
    assert!(remaining == dec!(30.00) || remaining == dec!(40.00));
    assert_eq!(
        remaining + fx.balance(q).await + fx.balance(s).await,
        dec!(100.00)
    );
}

#[tokio::test]
async fn test_many_concurrent_transfers_conserve_total() {
    let fx = Fixture::new();
    let a = fx.account(dec!(50.00)).await;
    let b = fx.account(dec!(50.00)).await;

    let mut handles = Vec::new();
    for i in 0..40 {
        let service = fx.service.clone();
        let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
        handles.push(tokio::spawn(async move {
            service.transfer_funds(transfer(from, to, dec!(7.25), "")).await
        }));
    }
    for handle in handles {
        let _ = handle.await.unwrap();
    }

    let (ba, bb) = (fx.balance(a).await, fx.balance(b).await);
    assert!(ba >= Decimal::ZERO && bb >= Decimal::ZERO);
    assert_eq!(ba + bb, dec!(100.00));
}

#[tokio::test]
async fn test_transfer_validation() {
    let fx = Fixture::new();
    let p = fx.account(dec!(100.00)).await;
    let q = fx.account(dec!(0)).await;
    let euro = fx.account_in(dec!(0), Currency::Eur).await;

    assert!(matches!(
        fx.service.transfer_funds(transfer(p, q, dec!(0), "")).await,
        Err(LedgerError::NonPositiveAmount)
    ));
    assert!(matches!(
        fx.service.transfer_funds(transfer(p, p, dec!(1), "")).await,
        Err(LedgerError::SameAccount)
    ));
    assert!(matches!(
        fx.service.transfer_funds(transfer(p, AccountId::new(), dec!(1), "")).await,
        Err(LedgerError::AccountNotFound(_))
    ));
    assert!(matches!(
        fx.service.transfer_funds(transfer(p, q, dec!(0.001), "")).await,
        Err(LedgerError::InvalidPrecision { .. })
    ));
    assert!(matches!(
        fx.service.transfer_funds(transfer(p, euro, dec!(1), "")).await,
        Err(LedgerError::CurrencyMismatch { .. })
    ));
    assert_eq!(fx.balance(p).await, dec!(100.00));
}

#[tokio::test]
async fn test_idempotent_transfer_moves_money_once() {
    let fx = Fixture::new();
    let p = fx.account(dec!(100.00)).await;
    let q = fx.account(dec!(0)).await;
    let key: IdempotencyKey = "tap-42".parse().unwrap();

    let mut input = transfer(p, q, dec!(30.00), "");
    input.idempotency_key = Some(key.clone());
    let first = fx.service.transfer_funds(input.clone()).await.unwrap();
    let second = fx.service.transfer_funds(input).await.unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(first.request_id, second.request_id);
    assert_eq!(second.records.len(), 2);
    assert_eq!(fx.balance(p).await, dec!(70.00));
    assert_eq!(fx.history(p).await.len(), 1);

    // Keys are scoped to the payer.
    let mut other = transfer(q, p, dec!(1.00), "");
    other.idempotency_key = Some(key);
    assert!(!fx.service.transfer_funds(other).await.unwrap().replayed);
}

#[tokio::test]
async fn test_idempotent_payment_request() {
    let fx = Fixture::new();
    let r = fx.account(dec!(0)).await;
    let p = fx.account(dec!(0)).await;

    let mut input = request_input(r, p, dec!(12.00));
    input.idempotency_key = Some("req-1".parse().unwrap());
    let first = fx.service.create_payment_request(input.clone()).await.unwrap();
    let second = fx.service.create_payment_request(input).await.unwrap();

    assert!(second.replayed);
    assert_eq!(first.request_id, second.request_id);
    assert_eq!(fx.history(r).await.len(), 1);
    assert_eq!(fx.history(p).await.len(), 1);
}

#[tokio::test]
async fn test_key_from_a_request_cannot_move_money() {
    let fx = Fixture::new();
    let r = fx.account(dec!(100.00)).await;
    let p = fx.account(dec!(0)).await;
    let q = fx.account(dec!(0)).await;

    let mut request = request_input(r, p, dec!(5.00));
    request.idempotency_key = Some("k-1".parse().unwrap());
    fx.service.create_payment_request(request).await.unwrap();

    let mut payment = transfer(r, q, dec!(10.00), "");
    payment.idempotency_key = Some("k-1".parse().unwrap());
    let err = fx.service.transfer_funds(payment).await.unwrap_err();

    assert!(matches!(err, LedgerError::IdempotencyKeyReused(ref key) if key == "k-1"));
    assert_eq!(err.http_status_code(), 422);
    assert_eq!(fx.balance(r).await, dec!(100.00));
    assert_eq!(fx.balance(q).await, dec!(0));
    assert!(fx.history(q).await.is_empty());
    assert_eq!(fx.history(r).await.len(), 1);
}

#[tokio::test]
async fn test_key_reused_for_another_payee_is_rejected() {
    let fx = Fixture::new();
    let r = fx.account(dec!(100.00)).await;
    let p = fx.account(dec!(0)).await;
    let q = fx.account(dec!(0)).await;

    let mut first = transfer(r, p, dec!(50.00), "");
    first.idempotency_key = Some("k-3".parse().unwrap());
    fx.service.transfer_funds(first).await.unwrap();

    let mut second = transfer(r, q, dec!(20.00), "");
    second.idempotency_key = Some("k-3".parse().unwrap());
    assert!(matches!(
        fx.service.transfer_funds(second).await,
        Err(LedgerError::IdempotencyKeyReused(_))
    ));

    assert_eq!(fx.balance(r).await, dec!(50.00));
    assert_eq!(fx.balance(p).await, dec!(50.00));
    assert_eq!(fx.balance(q).await, dec!(0));
    assert!(fx.history(q).await.is_empty());
}

#[tokio::test]
async fn test_key_reused_for_another_amount_is_rejected() {
    let fx = Fixture::new();
    let r = fx.account(dec!(0)).await;
    let p = fx.account(dec!(0)).await;

    let mut first = request_input(r, p, dec!(12.00));
    first.idempotency_key = Some("req-2".parse().unwrap());
    fx.service.create_payment_request(first.clone()).await.unwrap();

    // Same amount written with another scale is the same submission.
    let mut retry = first.clone();
    retry.amount = dec!(12);
    assert!(fx.service.create_payment_request(retry).await.unwrap().replayed);

    let mut changed = first;
    changed.amount = dec!(13.00);
    assert!(matches!(
        fx.service.create_payment_request(changed).await,
        Err(LedgerError::IdempotencyKeyReused(_))
    ));
    assert_eq!(fx.history(p).await.len(), 1);
}

#[tokio::test]
async fn test_cancel_keeps_both_records_as_cancelled() {
    let fx = Fixture::new();
    let r = fx.account(dec!(0)).await;
    let p = fx.account(dec!(100.00)).await;

    let request = fx.request(r, p, dec!(25.00)).await;
    let requester_record = request.record_for(r).unwrap().id;

    let settlement = fx.service.cancel_request(r, requester_record, p).await.unwrap();
    assert_eq!(settlement.mirror, MirrorUpdate::Applied);
    assert_eq!(fx.history(r).await[0].status, RecordStatus::Cancelled);
    assert_eq!(fx.history(p).await[0].status, RecordStatus::Cancelled);

    // A later confirm fails and moves no money.
    let mut confirm = transfer(p, r, dec!(25.00), "");
    confirm.linked_request = request.request_id;
    assert!(matches!(
        fx.service.transfer_funds(confirm).await,
        Err(LedgerError::InvalidTransition { from: RecordStatus::Cancelled, .. })
    ));
    assert_eq!(fx.balance(p).await, dec!(100.00));
}

#[tokio::test]
async fn test_cancel_after_confirm_fails() {
    let fx = Fixture::new();
    let r = fx.account(dec!(0)).await;
    let p = fx.account(dec!(100.00)).await;

    let request = fx.request(r, p, dec!(25.00)).await;
    let mut confirm = transfer(p, r, dec!(25.00), "");
    confirm.linked_request = request.request_id;
    fx.service.transfer_funds(confirm).await.unwrap();

    let requester_record = request.record_for(r).unwrap().id;
    assert!(matches!(
        fx.service.cancel_request(r, requester_record, p).await,
        Err(LedgerError::InvalidTransition { from: RecordStatus::Completed, .. })
    ));
}

#[tokio::test]
async fn test_requester_cannot_confirm_own_request() {
    let fx = Fixture::new();
    let r = fx.account(dec!(100.00)).await;
    let p = fx.account(dec!(0)).await;

    let request = fx.request(r, p, dec!(25.00)).await;
    let mut confirm = transfer(r, p, dec!(25.00), "");
    confirm.linked_request = request.request_id;
    assert!(matches!(
        fx.service.transfer_funds(confirm).await,
        Err(LedgerError::InvalidTransition { .. })
    ));
    assert_eq!(fx.balance(r).await, dec!(100.00));
}

#[tokio::test]
async fn test_decline_with_wrong_counterparty() {
    let fx = Fixture::new();
    let r = fx.account(dec!(0)).await;
    let p = fx.account(dec!(0)).await;

    let request = fx.request(r, p, dec!(5.00)).await;
    let payer_record = request.record_for(p).unwrap().id;
    assert!(matches!(
        fx.service.decline_request(p, payer_record, AccountId::new()).await,
        Err(LedgerError::CounterpartyMismatch(_))
    ));
    assert_eq!(fx.history(p).await[0].status, RecordStatus::Requested);
}

#[tokio::test]
async fn test_decline_legacy_record_without_request_id() {
    let fx = Fixture::new();
    let r = fx.account(dec!(0)).await;
    let p = fx.account(dec!(0)).await;

    let now = Utc::now();
    let legacy = TransactionRecord {
        id: TransactionId::new(),
        owner: p,
        kind: RecordKind::Payment,
        status: RecordStatus::Requested,
        amount: dec!(9.99),
        currency: Currency::Usd,
        note: "old".into(),
        attachment_url: None,
        date: now,
        other_party: r,
        request_id: None,
        order_items: None,
        updated_at: now,
    };
    let id = legacy.id;
    fx.backend.seed_record(legacy).await;

    let settlement = fx.service.decline_request(p, id, r).await.unwrap();
    assert_eq!(settlement.mirror, MirrorUpdate::Skipped);
    assert!(fx.history(p).await.is_empty());
}

#[tokio::test]
async fn test_decline_with_missing_mirror_is_reported() {
    let fx = Fixture::new();
    let r = fx.account(dec!(0)).await;
    let p = fx.account(dec!(0)).await;

    let now = Utc::now();
    let orphan = TransactionRecord {
        id: TransactionId::new(),
        owner: p,
        kind: RecordKind::Payment,
        status: RecordStatus::Requested,
        amount: dec!(3.00),
        currency: Currency::Usd,
        note: String::new(),
        attachment_url: None,
        date: now,
        other_party: r,
        request_id: Some(RequestId::new()),
        order_items: None,
        updated_at: now,
    };
    let id = orphan.id;
    fx.backend.seed_record(orphan).await;

    let settlement = fx.service.decline_request(p, id, r).await.unwrap();
    assert_eq!(settlement.mirror, MirrorUpdate::Missing);
    assert!(!settlement.is_complete());
    assert!(fx.history(p).await.is_empty());
}

#[tokio::test]
async fn test_itemized_request() {
    let fx = Fixture::new();
    let r = fx.account(dec!(0)).await;
    let p = fx.account(dec!(0)).await;

    let mut input = request_input(r, p, dec!(5.75));
    input.order_items = Some(vec![
        OrderItem { name: "Coffee".into(), price: dec!(3.50) },
        OrderItem { name: "Bagel".into(), price: dec!(2.25) },
    ]);
    let settlement = fx.service.create_payment_request(input.clone()).await.unwrap();
    assert_eq!(
        settlement.record_for(p).unwrap().order_items.as_ref().map(Vec::len),
        Some(2)
    );

    input.amount = dec!(6.00);
    assert!(matches!(
        fx.service.create_payment_request(input).await,
        Err(LedgerError::InvalidOrderItems(_))
    ));
}

#[tokio::test]
async fn test_request_for_unknown_payer() {
    let fx = Fixture::new();
    let r = fx.account(dec!(0)).await;
    assert!(matches!(
        fx.service
            .create_payment_request(request_input(r, AccountId::new(), dec!(1)))
            .await,
        Err(LedgerError::AccountNotFound(_))
    ));
    assert!(fx.history(r).await.is_empty());
}

#[tokio::test]
async fn test_record_is_scoped_to_owner() {
    let fx = Fixture::new();
    let p = fx.account(dec!(10.00)).await;
    let q = fx.account(dec!(0)).await;
    let settlement = fx
        .service
        .transfer_funds(transfer(p, q, dec!(1.00), ""))
        .await
        .unwrap();
    let payer_record = settlement.record_for(p).unwrap().id;

    assert!(fx.service.record(p, payer_record).await.is_ok());
    assert!(matches!(
        fx.service.record(q, payer_record).await,
        Err(LedgerError::TransactionNotFound(_))
    ));
}

#[tokio::test]
async fn test_events_follow_commits() {
    let fx = Fixture::new();
    let p = fx.account(dec!(100.00)).await;
    let q = fx.account(dec!(0)).await;
    let mut feed = fx.service.events().subscribe_account(q);

    fx.service
        .transfer_funds(transfer(p, q, dec!(40.00), "lunch"))
        .await
        .unwrap();

    let Some(FeedItem::Event(balance)) = feed.next().await else {
        panic!("expected balance event");
    };
    assert_eq!(balance.kind, EventKind::BalanceChanged { balance: dec!(40.00) });

    let Some(FeedItem::Event(created)) = feed.next().await else {
        panic!("expected record event");
    };
    assert!(matches!(
        created.kind,
        EventKind::RecordCreated { ref record } if record.kind == RecordKind::Receipt
    ));

    // Failed operations publish nothing.
    let _ = fx
        .service
        .transfer_funds(transfer(p, q, dec!(1000.00), ""))
        .await;
    fx.service
        .transfer_funds(transfer(q, p, dec!(1.00), ""))
        .await
        .unwrap();
    let Some(FeedItem::Event(next)) = feed.next().await else {
        panic!("expected event");
    };
    assert_eq!(next.kind, EventKind::BalanceChanged { balance: dec!(39.00) });
}

#[tokio::test]
async fn test_history_is_newest_first_and_paginated() {
    let fx = Fixture::new();
    let p = fx.account(dec!(100.00)).await;
    let q = fx.account(dec!(0)).await;
    for i in 1..=5 {
        fx.service
            .transfer_funds(transfer(p, q, Decimal::from(i), &format!("#{i}")))
            .await
            .unwrap();
    }

    let page = fx.service.history(p, PageRequest::new(1, 2)).await.unwrap();
    assert_eq!(page.meta.total, 5);
    assert_eq!(page.meta.total_pages, 3);
    assert_eq!(page.data.len(), 2);
    assert!(page.data[0].date >= page.data[1].date);
}
