//! Transaction history routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};

use bluepay_core::ledger::TransactionRecord;
use bluepay_shared::types::{PageRequest, PageResponse, TransactionId};

use crate::AppState;
use crate::error::ApiResult;
use crate::middleware::AuthUser;

/// Creates the transaction routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/transactions", get(list_transactions))
        .route("/transactions/{transaction_id}", get(get_transaction))
}

/// GET `/transactions?page=&per_page=` - The caller's records, newest first.
async fn list_transactions(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PageRequest>,
) -> ApiResult<Json<PageResponse<TransactionRecord>>> {
    let history = state.ledger.history(auth.account_id(), page).await?;
    Ok(Json(history))
}

/// GET `/transactions/{transaction_id}` - One of the caller's records.
async fn get_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(transaction_id): Path<TransactionId>,
) -> ApiResult<Json<TransactionRecord>> {
    let record = state.ledger.record(auth.account_id(), transaction_id).await?;
    Ok(Json(record))
}
