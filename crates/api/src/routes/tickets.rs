//! Merchant ticket and wallet routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;

use bluepay_core::tickets::{NewTemplate, TicketTemplate, WalletItem};
use bluepay_shared::types::{AccountId, TicketTemplateId, WalletItemId};

use crate::AppState;
use crate::error::ApiResult;
use crate::middleware::AuthUser;

/// Creates the ticket routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tickets/templates", post(create_template).get(list_templates))
        .route("/tickets/templates/{template_id}/issue", post(issue_ticket))
        .route("/tickets/{item_id}/redeem", post(redeem_ticket))
        .route("/wallet", get(wallet))
}

/// Request body for issuing a ticket.
#[derive(Debug, Deserialize)]
pub struct IssueBody {
    /// Account receiving the ticket.
    pub holder: AccountId,
}

/// POST `/tickets/templates` - Publish a template (business accounts only).
async fn create_template(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<NewTemplate>,
) -> ApiResult<impl IntoResponse> {
    let template = state
        .tickets
        .create_template(auth.account_id(), payload)
        .await?;
    Ok((StatusCode::CREATED, Json(template)))
}

/// GET `/tickets/templates` - The caller's templates.
async fn list_templates(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<TicketTemplate>>> {
    Ok(Json(state.tickets.templates(auth.account_id()).await?))
}

/// POST `/tickets/templates/{template_id}/issue` - Issue a ticket into a wallet.
async fn issue_ticket(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(template_id): Path<TicketTemplateId>,
    Json(payload): Json<IssueBody>,
) -> ApiResult<impl IntoResponse> {
    let item = state
        .tickets
        .issue_ticket(auth.account_id(), template_id, payload.holder)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// POST `/tickets/{item_id}/redeem` - Use a ticket at the issuing merchant.
async fn redeem_ticket(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(item_id): Path<WalletItemId>,
) -> ApiResult<Json<WalletItem>> {
    let item = state
        .tickets
        .redeem_ticket(auth.account_id(), item_id)
        .await?;
    Ok(Json(item))
}

/// GET `/wallet` - Tickets held by the caller.
async fn wallet(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<Vec<WalletItem>>> {
    Ok(Json(state.tickets.wallet(auth.account_id()).await?))
}
