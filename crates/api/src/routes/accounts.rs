//! Account routes: signup, profile, username and directory lookups.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use bluepay_core::account::{Account, AccountType};
use bluepay_core::directory::{NewAccount, ProfileUpdate, SEARCH_LIMIT};
use bluepay_shared::AppError;
use bluepay_shared::types::{AccountId, Currency, Money};

use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;

/// Creates the account routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/accounts", post(create_account))
        .route("/accounts/me", get(get_me).patch(update_me))
        .route("/accounts/me/username", put(claim_username))
        .route("/accounts/search", get(search))
        .route("/accounts/by-username/{handle}", get(by_username))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for signup.
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Contact email; defaults to the token's email.
    pub email: Option<String>,
    /// Wallet currency.
    pub currency: Currency,
    /// Personal or business.
    #[serde(default)]
    pub account_type: AccountType,
}

/// Request body for claiming a username.
#[derive(Debug, Deserialize)]
pub struct ClaimUsernameRequest {
    /// The handle, with or without `@`.
    pub username: String,
}

/// Query parameters for search.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Prefix to match.
    pub q: String,
    /// Maximum results.
    pub limit: Option<u64>,
}

/// The caller's own account.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    /// Account ID.
    pub id: AccountId,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Contact email.
    pub email: String,
    /// Claimed handle.
    pub username: Option<String>,
    /// Current balance.
    pub balance: Money,
    /// Personal or business.
    pub account_type: AccountType,
    /// Whether onboarding finished.
    pub onboarded: bool,
    /// Signup time.
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(a: Account) -> Self {
        Self {
            id: a.id,
            balance: Money::new(a.balance, a.currency),
            first_name: a.first_name,
            last_name: a.last_name,
            email: a.email,
            username: a.username.map(String::from),
            account_type: a.account_type,
            onboarded: a.onboarded,
            created_at: a.created_at,
        }
    }
}

/// Another account, as shown to a payer. Balance and email stay private.
#[derive(Debug, Serialize)]
pub struct PublicProfile {
    /// Account ID.
    pub id: AccountId,
    /// Claimed handle.
    pub username: Option<String>,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Personal or business.
    pub account_type: AccountType,
    /// Wallet currency.
    pub currency: Currency,
}

impl From<Account> for PublicProfile {
    fn from(a: Account) -> Self {
        Self {
            id: a.id,
            username: a.username.map(String::from),
            first_name: a.first_name,
            last_name: a.last_name,
            account_type: a.account_type,
            currency: a.currency,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST `/accounts` - Create the wallet for the token subject.
async fn create_account(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateAccountRequest>,
) -> ApiResult<impl IntoResponse> {
    let Some(email) = payload.email.or_else(|| auth.email().map(str::to_string)) else {
        return Err(AppError::Validation("email is required".to_string()).into());
    };

    let account = state
        .directory
        .create_account(NewAccount {
            id: auth.account_id(),
            first_name: payload.first_name,
            last_name: payload.last_name,
            email,
            currency: payload.currency,
            account_type: payload.account_type,
        })
        .await?;

    info!(account_id = %account.id, "Signup completed");
    Ok((StatusCode::CREATED, Json(AccountResponse::from(account))))
}

/// GET `/accounts/me` - Own profile and balance.
async fn get_me(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<AccountResponse>> {
    let account = state.directory.account(auth.account_id()).await?;
    Ok(Json(account.into()))
}

/// PATCH `/accounts/me` - Update profile fields.
async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ProfileUpdate>,
) -> ApiResult<Json<AccountResponse>> {
    let account = state
        .directory
        .update_profile(auth.account_id(), payload)
        .await?;
    Ok(Json(account.into()))
}

/// PUT `/accounts/me/username` - Claim a handle.
async fn claim_username(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ClaimUsernameRequest>,
) -> ApiResult<Json<AccountResponse>> {
    let account = state
        .directory
        .claim_username(auth.account_id(), &payload.username)
        .await?;
    Ok(Json(account.into()))
}

/// GET `/accounts/search?q=` - Prefix search over handles and names.
async fn search(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<PublicProfile>>> {
    let hits = state
        .directory
        .search(&query.q, query.limit.unwrap_or(SEARCH_LIMIT))
        .await?;
    Ok(Json(hits.into_iter().map(PublicProfile::from).collect()))
}

/// GET `/accounts/by-username/{handle}` - Resolve a handle.
async fn by_username(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(handle): Path<String>,
) -> ApiResult<Json<PublicProfile>> {
    state
        .directory
        .find_by_username(&handle)
        .await?
        .map(|a| Json(a.into()))
        .ok_or_else(|| ApiError::from(AppError::NotFound(format!("No account named {handle}"))))
}
