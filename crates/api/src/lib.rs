//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes for accounts, the ledger and tickets
//! - The realtime WebSocket feed
//! - Authentication middleware
//! - The JSON error envelope

pub mod error;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use bluepay_core::MemoryBackend;
use bluepay_core::directory::DirectoryService;
use bluepay_core::ledger::{EventBus, LedgerService};
use bluepay_core::tickets::TicketService;
use bluepay_db::{AccountRepository, PgLedgerStore, TicketRepository};
use bluepay_shared::{JwtService, LedgerConfig};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Money movement and history.
    pub ledger: LedgerService,
    /// Profiles and usernames.
    pub directory: DirectoryService,
    /// Merchant tickets.
    pub tickets: TicketService,
    /// JWT service for token verification.
    pub jwt_service: Arc<JwtService>,
    /// Name of the storage backend, reported by the health check.
    pub backend: &'static str,
}

impl AppState {
    /// Wires every service to a fresh process-local backend.
    #[must_use]
    pub fn in_memory(jwt_service: Arc<JwtService>, events: EventBus) -> Self {
        Self::with_memory_backend(MemoryBackend::new(), jwt_service, events)
    }

    /// Wires every service to an existing process-local backend.
    #[must_use]
    pub fn with_memory_backend(
        backend: MemoryBackend,
        jwt_service: Arc<JwtService>,
        events: EventBus,
    ) -> Self {
        let backend = Arc::new(backend);
        Self {
            ledger: LedgerService::new(backend.clone(), events),
            directory: DirectoryService::new(backend.clone()),
            tickets: TicketService::new(backend.clone(), backend),
            jwt_service,
            backend: "memory",
        }
    }

    /// Wires every service to PostgreSQL.
    #[must_use]
    pub fn postgres(
        db: DatabaseConnection,
        jwt_service: Arc<JwtService>,
        ledger: &LedgerConfig,
    ) -> Self {
        let accounts = Arc::new(AccountRepository::new(db.clone()));
        let store = PgLedgerStore::new(db.clone()).with_max_retries(ledger.max_retries);
        Self {
            ledger: LedgerService::new(Arc::new(store), EventBus::new(ledger.event_capacity)),
            directory: DirectoryService::new(accounts.clone()),
            tickets: TicketService::new(Arc::new(TicketRepository::new(db)), accounts),
            jwt_service,
            backend: "postgres",
        }
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
