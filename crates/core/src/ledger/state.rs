//! Request state machine.
//!
//! A request is one logical entity with two projections: the payer side
//! (`payment`) and the requester side (`receipt`).
//!
//! | action  | payer side            | requester side        |
//! |---------|-----------------------|-----------------------|
//! | create  | `Requested`           | `Pending`             |
//! | confirm | `Completed`           | `Completed`           |
//! | decline | removed               | `Failed`              |
//! | cancel  | `Cancelled`           | `Cancelled`           |
//!
//! `Completed`, `Failed` and `Cancelled` are terminal.
//!
//! Status changes and removals can only be produced here, so no other code
//! path can move a record out of band.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bluepay_shared::types::{AccountId, TransactionId};

use super::error::LedgerError;
use super::types::{RecordKind, RecordStatus, TransactionRecord};

/// Something a participant can do to an open request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestAction {
    /// The payer pays.
    Confirm,
    /// The payer refuses.
    Decline,
    /// The requester withdraws.
    Cancel,
}

impl RequestAction {
    /// The side whose owner may start this action.
    #[must_use]
    pub const fn initiator(self) -> RecordKind {
        match self {
            Self::Confirm | Self::Decline => RecordKind::Payment,
            Self::Cancel => RecordKind::Receipt,
        }
    }
}

impl fmt::Display for RequestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Confirm => "confirm",
            Self::Decline => "decline",
            Self::Cancel => "cancel",
        })
    }
}

/// Where a record ends up after an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The record stays, with a new status.
    To(RecordStatus),
    /// The record is deleted.
    Remove,
}

/// Computes the transition of one side of a request.
///
/// # Errors
///
/// Returns `InvalidTransition` when the record is not open or the action does
/// not apply to its side.
pub fn next(record: &TransactionRecord, action: RequestAction) -> Result<Transition, LedgerError> {
    let transition = match (record.kind, record.status, action) {
        (RecordKind::Payment, RecordStatus::Requested, RequestAction::Confirm)
        | (RecordKind::Receipt, RecordStatus::Pending, RequestAction::Confirm) => {
            Some(Transition::To(RecordStatus::Completed))
        }
        (RecordKind::Payment, RecordStatus::Requested, RequestAction::Decline) => {
            Some(Transition::Remove)
        }
        (RecordKind::Receipt, RecordStatus::Pending, RequestAction::Decline) => {
            Some(Transition::To(RecordStatus::Failed))
        }
        (RecordKind::Payment, RecordStatus::Requested, RequestAction::Cancel)
        | (RecordKind::Receipt, RecordStatus::Pending, RequestAction::Cancel) => {
            Some(Transition::To(RecordStatus::Cancelled))
        }
        _ => None,
    };

    transition.ok_or(LedgerError::InvalidTransition {
        record: record.id,
        from: record.status,
        action,
    })
}

/// A validated status change, ready for a store to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    owner: AccountId,
    record: TransactionId,
    from: RecordStatus,
    to: RecordStatus,
    at: DateTime<Utc>,
}

impl StatusChange {
    /// Owner of the record.
    #[must_use]
    pub const fn owner(&self) -> AccountId {
        self.owner
    }

    /// The record being changed.
    #[must_use]
    pub const fn record(&self) -> TransactionId {
        self.record
    }

    /// Status the record must currently have.
    #[must_use]
    pub const fn from(&self) -> RecordStatus {
        self.from
    }

    /// New status.
    #[must_use]
    pub const fn to(&self) -> RecordStatus {
        self.to
    }

    /// Time of the change.
    #[must_use]
    pub const fn at(&self) -> DateTime<Utc> {
        self.at
    }
}

/// A validated record deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    owner: AccountId,
    record: TransactionId,
}

impl Removal {
    /// Owner of the record.
    #[must_use]
    pub const fn owner(&self) -> AccountId {
        self.owner
    }

    /// The record being deleted.
    #[must_use]
    pub const fn record(&self) -> TransactionId {
        self.record
    }
}

/// The effect of applying an action to one record.
#[derive(Debug, Clone)]
pub(crate) enum Applied {
    /// Status changed; carries the change and the updated record.
    Changed(StatusChange, TransactionRecord),
    /// Record deleted.
    Removed(Removal),
}

/// Applies `action` to the record of the participant starting it.
///
/// Same as [`apply`], but also rejects a record on the wrong side (a
/// requester cannot decline their own request).
pub(crate) fn apply_initiator(
    record: &TransactionRecord,
    action: RequestAction,
    at: DateTime<Utc>,
) -> Result<Applied, LedgerError> {
    if record.kind != action.initiator() {
        return Err(LedgerError::InvalidTransition {
            record: record.id,
            from: record.status,
            action,
        });
    }
    apply(record, action, at)
}

/// Applies `action` to `record`.
pub(crate) fn apply(
    record: &TransactionRecord,
    action: RequestAction,
    at: DateTime<Utc>,
) -> Result<Applied, LedgerError> {
    match next(record, action)? {
        Transition::To(status) => {
            let mut updated = record.clone();
            updated.status = status;
            updated.updated_at = at;
            Ok(Applied::Changed(
                StatusChange {
                    owner: record.owner,
                    record: record.id,
                    from: record.status,
                    to: status,
                    at,
                },
                updated,
            ))
        }
        Transition::Remove => Ok(Applied::Removed(Removal {
            owner: record.owner,
            record: record.id,
        })),
    }
}
