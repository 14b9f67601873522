//! Pure planning of ledger operations.
//!
//! Each function turns a snapshot read inside an atomic unit into the list
//! of writes to apply and the settlement to report. Nothing here touches a
//! store, so the same inputs always produce the same decision.

use chrono::{DateTime, Utc};
use tracing::warn;

use bluepay_shared::types::{AccountId, RequestId, TransactionId};

use super::balance;
use super::error::LedgerError;
use super::state::{self, Applied, RequestAction};
use super::store::{KeyClaim, NewRecord, Plan, Snapshot, Write};
use super::types::{
    Fingerprint, IdempotencyKey, MirrorUpdate, PaymentRequestInput, RecordKind, RecordStatus, Settlement, TransactionRecord,
    TransferInput,
};
use super::validation::{validate_currencies, validate_precision};
use crate::account::Account;

impl Plan {
    /// A plan that writes nothing and reports an earlier submission.
    #[must_use]
    pub fn replay(request_id: RequestId) -> Self {
        Self {
            writes: Vec::new(),
            settlement: Settlement {
                request_id: Some(request_id),
                records: Vec::new(),
                mirror: MirrorUpdate::Applied,
                replayed: true,
            },
        }
    }
}

/// Checks the key read into `snapshot` against this submission.
///
/// Returns a replay when the key was bound by an identical submission and
/// fails when it was bound by a different one.
fn replay_of(
    snapshot: &Snapshot,
    key: Option<&IdempotencyKey>,
    fingerprint: &Fingerprint,
) -> Result<Option<Plan>, LedgerError> {
    let (Some(claimed), Some(key)) = (snapshot.claimed(), key) else {
        return Ok(None);
    };
    if claimed.fingerprint != *fingerprint {
        warn!(
            key = key.as_str(),
            request_id = %claimed.request_id,
            "Idempotency key reused for a different submission"
        );
        return Err(LedgerError::IdempotencyKeyReused(key.as_str().to_string()));
    }
    Ok(Some(Plan::replay(claimed.request_id)))
}

/// Plans `transfer_funds`, either a direct payment or a confirmation.
pub(crate) fn plan_transfer(
    input: &TransferInput,
    snapshot: &Snapshot,
    now: DateTime<Utc>,
) -> Result<Plan, LedgerError> {
    let fingerprint = Fingerprint::transfer(input);
    if let Some(replay) = replay_of(snapshot, input.idempotency_key.as_ref(), &fingerprint)? {
        return Ok(replay);
    }

    let payer = snapshot.account(input.payer)?;
    let payee = snapshot.account(input.payee)?;
    let currency = validate_currencies(payer, payee)?;
    validate_precision(input.amount, currency)?;

    match input.linked_request {
        None => plan_direct_transfer(input, payer, payee, now),
        Some(request_id) => plan_confirmation(input, payer, payee, request_id, snapshot, now),
    }
}

fn plan_direct_transfer(
    input: &TransferInput,
    payer: &Account,
    payee: &Account,
    now: DateTime<Utc>,
) -> Result<Plan, LedgerError> {
    let (debit, credit) = balance::transfer(payer, payee, input.amount)?;
    let request_id = RequestId::new();

    let pair = [
        (payer, payee.id, RecordKind::Payment),
        (payee, payer.id, RecordKind::Receipt),
    ]
    .map(|(owner, other_party, kind)| TransactionRecord {
        id: TransactionId::new(),
        owner: owner.id,
        kind,
        status: RecordStatus::Completed,
        amount: input.amount,
        currency: payer.currency,
        note: input.note.clone(),
        attachment_url: input.attachment_url.clone(),
        date: now,
        other_party,
        request_id: Some(request_id),
        order_items: None,
        updated_at: now,
    });

    let mut writes = vec![Write::Balance(debit), Write::Balance(credit)];
    writes.extend(pair.iter().cloned().map(|r| Write::Insert(NewRecord::new(r))));
    push_claim(
        &mut writes,
        input.payer,
        input.idempotency_key.as_ref(),
        request_id,
        Fingerprint::transfer(input),
    );

    Ok(Plan {
        writes,
        settlement: Settlement {
            request_id: Some(request_id),
            records: pair.into(),
            mirror: MirrorUpdate::Applied,
            replayed: false,
        },
    })
}

fn plan_confirmation(
    input: &TransferInput,
    payer: &Account,
    payee: &Account,
    request_id: RequestId,
    snapshot: &Snapshot,
    now: DateTime<Utc>,
) -> Result<Plan, LedgerError> {
    let payer_record = snapshot
        .find_by_request(payer.id, request_id)
        .ok_or(LedgerError::RequestNotFound(request_id))?;

    let Applied::Changed(payer_change, payer_updated) =
        state::apply_initiator(payer_record, RequestAction::Confirm, now)?
    else {
        return Err(LedgerError::Internal("confirm removed a record".to_string()));
    };
    if payer_record.other_party != payee.id {
        return Err(LedgerError::CounterpartyMismatch(payer_record.id));
    }
    if payer_record.amount != input.amount {
        return Err(LedgerError::AmountMismatch {
            expected: payer_record.amount,
            actual: input.amount,
        });
    }

    let (debit, credit) = balance::transfer(payer, payee, input.amount)?;
    let mut writes = vec![
        Write::Balance(debit),
        Write::Balance(credit),
        Write::Status(payer_change),
    ];
    let mut records = vec![payer_updated];

    let mirror = match snapshot.find_by_request(payee.id, request_id) {
        Some(requester_record) => {
            if let Applied::Changed(change, updated) =
                state::apply(requester_record, RequestAction::Confirm, now)?
            {
                writes.push(Write::Status(change));
                records.push(updated);
            }
            MirrorUpdate::Applied
        }
        None => {
            warn!(
                payer = %payer.id,
                payee = %payee.id,
                request_id = %request_id,
                "Requester record missing while confirming request"
            );
            MirrorUpdate::Missing
        }
    };
    push_claim(
        &mut writes,
        input.payer,
        input.idempotency_key.as_ref(),
        request_id,
        Fingerprint::transfer(input),
    );

    Ok(Plan {
        writes,
        settlement: Settlement {
            request_id: Some(request_id),
            records,
            mirror,
            replayed: false,
        },
    })
}

/// Plans a keyed `create_payment_request` inside an atomic unit, so that the
/// key is checked and claimed under the requester's lock.
pub(crate) fn plan_keyed_payment_request(
    input: &PaymentRequestInput,
    snapshot: &Snapshot,
    now: DateTime<Utc>,
) -> Result<Plan, LedgerError> {
    let fingerprint = Fingerprint::payment_request(input);
    if let Some(replay) = replay_of(snapshot, input.idempotency_key.as_ref(), &fingerprint)? {
        return Ok(replay);
    }
    let requester = snapshot.account(input.requester)?;
    let payer = snapshot.account(input.payer)?;
    plan_payment_request(input, requester, payer, now)
}

/// Plans `create_payment_request` from the two accounts read beforehand.
pub(crate) fn plan_payment_request(
    input: &PaymentRequestInput,
    requester: &Account,
    payer: &Account,
    now: DateTime<Utc>,
) -> Result<Plan, LedgerError> {
    let currency = validate_currencies(payer, requester)?;
    validate_precision(input.amount, currency)?;
    if let Some(items) = &input.order_items {
        for item in items {
            validate_precision(item.price, currency)?;
        }
    }

    let request_id = RequestId::new();
    let pair = [
        (requester.id, payer.id, RecordKind::Receipt, RecordStatus::Pending),
        (payer.id, requester.id, RecordKind::Payment, RecordStatus::Requested),
    ]
    .map(|(owner, other_party, kind, status)| TransactionRecord {
        id: TransactionId::new(),
        owner,
        kind,
        status,
        amount: input.amount,
        currency,
        note: input.note.clone(),
        attachment_url: input.attachment_url.clone(),
        date: now,
        other_party,
        request_id: Some(request_id),
        order_items: input.order_items.clone(),
        updated_at: now,
    });

    let mut writes: Vec<Write> = pair
        .iter()
        .cloned()
        .map(|r| Write::Insert(NewRecord::new(r)))
        .collect();
    push_claim(
        &mut writes,
        input.requester,
        input.idempotency_key.as_ref(),
        request_id,
        Fingerprint::payment_request(input),
    );

    Ok(Plan {
        writes,
        settlement: Settlement {
            request_id: Some(request_id),
            records: pair.into(),
            mirror: MirrorUpdate::Applied,
            replayed: false,
        },
    })
}

/// Plans `decline_request`: the payer's record is removed and the
/// requester's mirror fails.
pub(crate) fn plan_decline(
    payer: AccountId,
    record: TransactionId,
    requester: AccountId,
    snapshot: &Snapshot,
    now: DateTime<Utc>,
) -> Result<Plan, LedgerError> {
    resolve(RequestAction::Decline, payer, record, requester, snapshot, now)
}

/// Plans `cancel_request`: both sides become `Cancelled`.
pub(crate) fn plan_cancel(
    requester: AccountId,
    record: TransactionId,
    payer: AccountId,
    snapshot: &Snapshot,
    now: DateTime<Utc>,
) -> Result<Plan, LedgerError> {
    resolve(RequestAction::Cancel, requester, record, payer, snapshot, now)
}

fn resolve(
    action: RequestAction,
    actor: AccountId,
    record_id: TransactionId,
    counterpart: AccountId,
    snapshot: &Snapshot,
    now: DateTime<Utc>,
) -> Result<Plan, LedgerError> {
    let own = snapshot
        .record(actor, record_id)
        .ok_or(LedgerError::TransactionNotFound(record_id))?;
    if own.other_party != counterpart {
        return Err(LedgerError::CounterpartyMismatch(own.id));
    }

    let mut writes = Vec::with_capacity(2);
    let mut records = Vec::with_capacity(2);
    push_applied(
        state::apply_initiator(own, action, now)?,
        &mut writes,
        &mut records,
    );

    let Some(request_id) = own.request_id else {
        warn!(
            account = %actor,
            record = %record_id,
            %action,
            "Record has no request id, counterpart left untouched"
        );
        return Ok(Plan {
            writes,
            settlement: Settlement {
                request_id: None,
                records,
                mirror: MirrorUpdate::Skipped,
                replayed: false,
            },
        });
    };

    let mirror = match snapshot.find_by_request(counterpart, request_id) {
        Some(mirror) => {
            push_applied(state::apply(mirror, action, now)?, &mut writes, &mut records);
            MirrorUpdate::Applied
        }
        None => {
            warn!(
                account = %actor,
                counterpart = %counterpart,
                request_id = %request_id,
                %action,
                "Counterpart record missing, only one side updated"
            );
            MirrorUpdate::Missing
        }
    };

    Ok(Plan {
        writes,
        settlement: Settlement {
            request_id: Some(request_id),
            records,
            mirror,
            replayed: false,
        },
    })
}

fn push_applied(applied: Applied, writes: &mut Vec<Write>, records: &mut Vec<TransactionRecord>) {
    match applied {
        Applied::Changed(change, updated) => {
            writes.push(Write::Status(change));
            records.push(updated);
        }
        Applied::Removed(removal) => writes.push(Write::Remove(removal)),
    }
}

fn push_claim(
    writes: &mut Vec<Write>,
    owner: AccountId,
    key: Option<&IdempotencyKey>,
    request_id: RequestId,
    fingerprint: Fingerprint,
) {
    if let Some(key) = key {
        writes.push(Write::Claim(KeyClaim::new(
            owner,
            key.clone(),
            request_id,
            fingerprint,
        )));
    }
}
