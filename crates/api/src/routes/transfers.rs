//! Money movement routes: transfers and payment requests.
//!
//! The initiating party is always the token subject. Retries carry an
//! `Idempotency-Key` header; a replayed submission answers `200 OK` with the
//! original event instead of `201 Created`.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

use bluepay_core::ledger::{
    IdempotencyKey, LedgerError, OrderItem, PaymentRequestInput, Settlement, TransferInput,
};
use bluepay_shared::types::{AccountId, RequestId, TransactionId};

use crate::AppState;
use crate::error::ApiResult;
use crate::middleware::AuthUser;

/// Header carrying the client's idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Creates the transfer and request routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/transfers", post(create_transfer))
        .route("/requests", post(create_request))
        .route("/requests/{record_id}/decline", post(decline_request))
        .route("/requests/{record_id}/cancel", post(cancel_request))
}

// ============================================================================
// Request Types
// ============================================================================

/// Request body for a transfer or request confirmation.
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    /// Receiving account.
    pub payee: AccountId,
    /// Amount in major units, as a string.
    pub amount: Decimal,
    /// Free-text note.
    #[serde(default)]
    pub note: String,
    /// Optional attachment.
    pub attachment_url: Option<String>,
    /// Open request being paid, if any.
    pub request_id: Option<RequestId>,
}

/// Request body for a payment request.
#[derive(Debug, Deserialize)]
pub struct PaymentRequestBody {
    /// Account asked to pay.
    pub payer: AccountId,
    /// Amount in major units, as a string.
    pub amount: Decimal,
    /// Free-text note.
    #[serde(default)]
    pub note: String,
    /// Optional attachment.
    pub attachment_url: Option<String>,
    /// Itemized breakdown, for merchants.
    pub order_items: Option<Vec<OrderItem>>,
}

/// Request body for a decline.
#[derive(Debug, Deserialize)]
pub struct DeclineBody {
    /// The account that asked for the money.
    pub requester: AccountId,
}

/// Request body for a cancellation.
#[derive(Debug, Deserialize)]
pub struct CancelBody {
    /// The account that was asked to pay.
    pub payer: AccountId,
}

// ============================================================================
// Helpers
// ============================================================================

/// Reads the optional idempotency key header.
fn idempotency_key(headers: &HeaderMap) -> ApiResult<Option<IdempotencyKey>> {
    let Some(value) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };
    let key: IdempotencyKey = value
        .to_str()
        .map_err(|_| LedgerError::InvalidIdempotencyKey)?
        .parse()?;
    Ok(Some(key))
}

fn created(settlement: Settlement) -> impl IntoResponse {
    if !settlement.is_complete() {
        warn!(request_id = ?settlement.request_id, "Counterpart record was not updated");
    }
    let status = if settlement.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    (status, Json(settlement))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST `/transfers` - Send money, or pay an open request.
async fn create_transfer(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(payload): Json<TransferRequest>,
) -> ApiResult<impl IntoResponse> {
    let input = TransferInput {
        payer: auth.account_id(),
        payee: payload.payee,
        amount: payload.amount,
        note: payload.note,
        attachment_url: payload.attachment_url,
        linked_request: payload.request_id,
        idempotency_key: idempotency_key(&headers)?,
    };
    let settlement = state.ledger.transfer_funds(input).await?;
    Ok(created(settlement))
}

/// POST `/requests` - Ask another account for money.
async fn create_request(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(payload): Json<PaymentRequestBody>,
) -> ApiResult<impl IntoResponse> {
    let input = PaymentRequestInput {
        requester: auth.account_id(),
        payer: payload.payer,
        amount: payload.amount,
        note: payload.note,
        attachment_url: payload.attachment_url,
        order_items: payload.order_items,
        idempotency_key: idempotency_key(&headers)?,
    };
    let settlement = state.ledger.create_payment_request(input).await?;
    Ok(created(settlement))
}

/// POST `/requests/{record_id}/decline` - Payer refuses a request.
async fn decline_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(record_id): Path<TransactionId>,
    Json(payload): Json<DeclineBody>,
) -> ApiResult<Json<Settlement>> {
    let settlement = state
        .ledger
        .decline_request(auth.account_id(), record_id, payload.requester)
        .await?;
    Ok(Json(settlement))
}

/// POST `/requests/{record_id}/cancel` - Requester withdraws a request.
async fn cancel_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(record_id): Path<TransactionId>,
    Json(payload): Json<CancelBody>,
) -> ApiResult<Json<Settlement>> {
    let settlement = state
        .ledger
        .cancel_request(auth.account_id(), record_id, payload.payer)
        .await?;
    Ok(Json(settlement))
}
