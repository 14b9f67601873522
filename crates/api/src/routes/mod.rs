//! API route definitions.

use axum::{Router, middleware};

use crate::{AppState, middleware::auth_middleware};

pub mod accounts;
pub mod events;
pub mod health;
pub mod tickets;
pub mod transactions;
pub mod transfers;

/// Creates the API router with protected routes that need state for middleware.
#[allow(clippy::needless_pass_by_value)]
pub fn api_routes_with_state(state: AppState) -> Router<AppState> {
    // Protected routes that require authentication
    let protected_routes = Router::new()
        .merge(accounts::routes())
        .merge(transactions::routes())
        .merge(transfers::routes())
        .merge(tickets::routes())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // The event feed authenticates itself: browsers cannot set headers on upgrades.
    Router::new()
        .merge(health::routes())
        .merge(events::routes())
        .merge(protected_routes)
}
