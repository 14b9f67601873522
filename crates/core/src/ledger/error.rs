//! Ledger error types for validation and state errors.
//!
//! This module defines all errors that can occur during ledger operations,
//! including validation errors, account errors, request state errors and
//! store errors.

use rust_decimal::Decimal;
use thiserror::Error;

use bluepay_shared::types::{AccountId, Currency, RequestId, TransactionId};

use super::state::RequestAction;
use super::types::RecordStatus;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Amount must be greater than zero.
    #[error("Amount must be greater than zero")]
    NonPositiveAmount,

    /// Amount has more decimal places than the currency allows.
    #[error("Amount {amount} has too many decimal places for {currency}")]
    InvalidPrecision {
        /// The rejected amount.
        amount: Decimal,
        /// The currency whose minor unit was exceeded.
        currency: Currency,
    },

    /// Payer and payee are the same account.
    #[error("Cannot send money to the same account")]
    SameAccount,

    /// The two wallets hold different currencies.
    #[error("Currency mismatch: payer holds {payer}, payee holds {payee}")]
    CurrencyMismatch {
        /// Payer wallet currency.
        payer: Currency,
        /// Payee wallet currency.
        payee: Currency,
    },

    /// Order items are malformed or do not add up.
    #[error("Invalid order items: {0}")]
    InvalidOrderItems(String),

    /// Idempotency key is empty, too long or not printable ASCII.
    #[error("Idempotency key must be 1-128 printable ASCII characters")]
    InvalidIdempotencyKey,

    // ========== Account Errors ==========
    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Balance is below the amount being sent.
    #[error("Insufficient funds in account {account}: available {available}, requested {requested}")]
    InsufficientFunds {
        /// The account being debited.
        account: AccountId,
        /// Balance at the time of the atomic check.
        available: Decimal,
        /// Amount that was requested.
        requested: Decimal,
    },

    // ========== Record Errors ==========
    /// Transaction record not found (or not owned by the caller).
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// No open request with this correlation id on the caller's side.
    #[error("Request not found: {0}")]
    RequestNotFound(RequestId),

    /// The named counterpart is not the record's other party.
    #[error("Counterparty does not match transaction {0}")]
    CounterpartyMismatch(TransactionId),

    /// The amount paid does not match the amount requested.
    #[error("Amount mismatch: request is for {expected}, got {actual}")]
    AmountMismatch {
        /// Amount on the open request.
        expected: Decimal,
        /// Amount supplied by the caller.
        actual: Decimal,
    },

    /// The record's status does not allow this action.
    #[error("Cannot {action} transaction {record} in status {from}")]
    InvalidTransition {
        /// The record.
        record: TransactionId,
        /// Its current status.
        from: RecordStatus,
        /// The attempted action.
        action: RequestAction,
    },

    /// A stored record has an unknown shape.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// An idempotency key was already used; carries the original event.
    #[error("Duplicate submission of request {0}")]
    DuplicateSubmission(RequestId),

    /// An idempotency key was already used for a different submission.
    #[error("Idempotency key '{0}' was already used for a different submission")]
    IdempotencyKeyReused(String),

    // ========== Concurrency Errors ==========
    /// Concurrent modification detected.
    #[error("Concurrent modification detected, please retry")]
    ConcurrentModification,

    // ========== Store Errors ==========
    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NonPositiveAmount => "NON_POSITIVE_AMOUNT",
            Self::InvalidPrecision { .. } => "INVALID_PRECISION",
            Self::SameAccount => "SAME_ACCOUNT",
            Self::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            Self::InvalidOrderItems(_) => "INVALID_ORDER_ITEMS",
            Self::InvalidIdempotencyKey => "INVALID_IDEMPOTENCY_KEY",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::RequestNotFound(_) => "REQUEST_NOT_FOUND",
            Self::CounterpartyMismatch(_) => "COUNTERPARTY_MISMATCH",
            Self::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::MalformedRecord(_) => "MALFORMED_RECORD",
            Self::DuplicateSubmission(_) => "DUPLICATE_SUBMISSION",
            Self::IdempotencyKeyReused(_) => "IDEMPOTENCY_KEY_REUSED",
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - validation errors
            Self::NonPositiveAmount
            | Self::InvalidPrecision { .. }
            | Self::SameAccount
            | Self::CurrencyMismatch { .. }
            | Self::InvalidOrderItems(_)
            | Self::InvalidIdempotencyKey
            | Self::CounterpartyMismatch(_)
            | Self::AmountMismatch { .. } => 400,

            // 404 Not Found
            Self::AccountNotFound(_) | Self::TransactionNotFound(_) | Self::RequestNotFound(_) => {
                404
            }

            // 409 Conflict - state and concurrency errors
            Self::InvalidTransition { .. }
            | Self::DuplicateSubmission(_)
            | Self::ConcurrentModification => 409,

            // 422 Unprocessable - business rule
            Self::InsufficientFunds { .. } | Self::IdempotencyKeyReused(_) => 422,

            // 500 Internal Server Error
            Self::MalformedRecord(_) | Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification)
    }
}
