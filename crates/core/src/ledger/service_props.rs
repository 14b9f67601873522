//! Property-based tests for LedgerService.
//!
//! - Conservation: every transfer moves exactly its amount, the total never changes
//! - Non-negativity: no sequence of transfers drives a balance below zero
//! - Pairing: every request creates exactly one record per party
//! - Terminal states: once resolved, a request accepts no further action

use std::sync::Arc;

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;

use bluepay_shared::types::{AccountId, Currency, PageRequest};

use super::error::LedgerError;
use super::events::EventBus;
use super::service::LedgerService;
use super::types::{PaymentRequestInput, RecordKind, RecordStatus, TransferInput};
use crate::account::{Account, AccountType};
use crate::memory::MemoryBackend;

/// Strategy to generate positive amounts (0.01 to 500.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..50_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate starting balances (0.00 to 1,000.00).
fn balance() -> impl Strategy<Value = Decimal> {
    (0i64..100_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// One transfer between two of three accounts.
fn transfer_step() -> impl Strategy<Value = (usize, usize, Decimal)> {
    (0usize..3, 1usize..3, positive_amount())
        .prop_map(|(from, offset, amount)| (from, (from + offset) % 3, amount))
}

/// An action on an open request.
#[derive(Debug, Clone, Copy)]
enum Step {
    Confirm,
    Decline,
    Cancel,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![Just(Step::Confirm), Just(Step::Decline), Just(Step::Cancel)]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn account(balance: Decimal) -> Account {
    Account {
        id: AccountId::new(),
        first_name: "Prop".into(),
        last_name: "Test".into(),
        email: format!("{}@example.com", AccountId::new()),
        username: None,
        balance,
        currency: Currency::Usd,
        account_type: AccountType::Personal,
        onboarded: true,
        created_at: Utc::now(),
    }
}

async fn setup(balances: &[Decimal]) -> (LedgerService, Vec<AccountId>) {
    let backend = MemoryBackend::new();
    let mut ids = Vec::new();
    for &b in balances {
        let a = account(b);
        ids.push(a.id);
        backend.seed_account(a).await;
    }
    (LedgerService::new(Arc::new(backend), EventBus::new(16)), ids)
}

fn transfer(payer: AccountId, payee: AccountId, amount: Decimal) -> TransferInput {
    TransferInput {
        payer,
        payee,
        amount,
        note: String::new(),
        attachment_url: None,
        linked_request: None,
        idempotency_key: None,
    }
}

async fn balance_of(service: &LedgerService, id: AccountId) -> Decimal {
    service.balance(id).await.unwrap().amount
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_transfers_conserve_money_and_stay_non_negative(
        start in proptest::collection::vec(balance(), 3),
        steps in proptest::collection::vec(transfer_step(), 1..20),
    ) {
        runtime().block_on(async {
            let (service, ids) = setup(&start).await;
            let total: Decimal = start.iter().copied().sum();

            for (from, to, amount) in steps {
                let payer_before = balance_of(&service, ids[from]).await;
                let payee_before = balance_of(&service, ids[to]).await;

                match service.transfer_funds(transfer(ids[from], ids[to], amount)).await {
                    Ok(_) => {
                        prop_assert!(payer_before >= amount);
                        prop_assert_eq!(balance_of(&service, ids[from]).await, payer_before - amount);
                        prop_assert_eq!(balance_of(&service, ids[to]).await, payee_before + amount);
                    }
                    Err(LedgerError::InsufficientFunds { .. }) => {
                        prop_assert!(payer_before < amount);
                        prop_assert_eq!(balance_of(&service, ids[from]).await, payer_before);
                        prop_assert_eq!(balance_of(&service, ids[to]).await, payee_before);
                    }
                    Err(e) => prop_assert!(false, "unexpected error: {}", e),
                }

                let mut sum = Decimal::ZERO;
                for id in &ids {
                    let b = balance_of(&service, *id).await;
                    prop_assert!(b >= Decimal::ZERO);
                    sum += b;
                }
                prop_assert_eq!(sum, total);
            }
            Ok(())
        })?;
    }

    #[test]
    fn prop_requests_create_exactly_one_record_per_party(amount in positive_amount()) {
        runtime().block_on(async {
            let (service, ids) = setup(&[Decimal::ZERO, Decimal::ZERO]).await;
            let (requester, payer) = (ids[0], ids[1]);

            let settlement = service
                .create_payment_request(PaymentRequestInput {
                    requester,
                    payer,
                    amount,
                    note: "split".into(),
                    attachment_url: None,
                    order_items: None,
                    idempotency_key: None,
                })
                .await
                .unwrap();
            let request_id = settlement.request_id;

            let mine = service.history(requester, PageRequest::default()).await.unwrap();
            let theirs = service.history(payer, PageRequest::default()).await.unwrap();
            prop_assert_eq!(mine.data.len(), 1);
            prop_assert_eq!(theirs.data.len(), 1);

            let (r, p) = (&mine.data[0], &theirs.data[0]);
            prop_assert_eq!(r.request_id, request_id);
            prop_assert_eq!(p.request_id, request_id);
            prop_assert_eq!((r.kind, r.status), (RecordKind::Receipt, RecordStatus::Pending));
            prop_assert_eq!((p.kind, p.status), (RecordKind::Payment, RecordStatus::Requested));
            prop_assert_eq!(r.amount, amount);
            prop_assert_eq!(p.amount, amount);
            Ok(())
        })?;
    }

    #[test]
    fn prop_resolved_requests_accept_no_further_action(
        amount in positive_amount(),
        steps in proptest::collection::vec(step(), 1..6),
    ) {
        runtime().block_on(async {
            let (service, ids) = setup(&[Decimal::ZERO, Decimal::new(100_000, 2)]).await;
            let (requester, payer) = (ids[0], ids[1]);

            let created = service
                .create_payment_request(PaymentRequestInput {
                    requester,
                    payer,
                    amount,
                    note: String::new(),
                    attachment_url: None,
                    order_items: None,
                    idempotency_key: None,
                })
                .await
                .unwrap();
            let request_id = created.request_id.unwrap();
            let requester_record = created.record_for(requester).unwrap().id;
            let payer_record = created.record_for(payer).unwrap().id;

            let mut resolved = false;
            for s in steps {
                let outcome = match s {
                    Step::Confirm => {
                        let mut input = transfer(payer, requester, amount);
                        input.linked_request = Some(request_id);
                        service.transfer_funds(input).await
                    }
                    Step::Decline => service.decline_request(payer, payer_record, requester).await,
                    Step::Cancel => service.cancel_request(requester, requester_record, payer).await,
                };
                if resolved {
                    prop_assert!(outcome.is_err());
                } else {
                    prop_assert!(outcome.is_ok());
                    resolved = true;
                }
            }

            // Money moved at most once.
            let paid = Decimal::new(100_000, 2) - balance_of(&service, payer).await;
            prop_assert!(paid == Decimal::ZERO || paid == amount);
            prop_assert_eq!(balance_of(&service, requester).await, paid);
            Ok(())
        })?;
    }
}
