//! BluePay API Server
//!
//! Main entry point for the BluePay wallet backend.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bluepay_api::{AppState, create_router};
use bluepay_core::ledger::EventBus;
use bluepay_db::connect_with;
use bluepay_shared::{AppConfig, JwtConfig, JwtService, LedgerBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bluepay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Create JWT service
    let jwt_service = Arc::new(JwtService::new(JwtConfig::from(&config.jwt)));

    // Create application state for the configured backend
    let state = match config.ledger.backend {
        LedgerBackend::Postgres => {
            let database = config
                .database
                .as_ref()
                .filter(|_| config.database_url().is_some())
                .context("database.url is required for the postgres backend")?;
            let db = connect_with(database).await?;
            info!("Connected to database");
            AppState::postgres(db, jwt_service, &config.ledger)
        }
        LedgerBackend::Memory => {
            warn!("Using the in-memory backend; data is lost on shutdown");
            AppState::in_memory(jwt_service, EventBus::new(config.ledger.event_capacity))
        }
    };
    info!(
        backend = state.backend,
        max_retries = config.ledger.max_retries,
        "Ledger configured"
    );

    // Create router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
