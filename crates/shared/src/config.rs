//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration (required for the PostgreSQL backend).
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    /// JWT configuration.
    pub jwt: JwtSettings,
    /// Ledger configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Bearer token verification settings.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret shared with the auth provider.
    pub secret: String,
    /// Access token lifetime in seconds (used when minting tokens).
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: u64,
    /// Required token issuer.
    #[serde(default)]
    pub issuer: Option<String>,
    /// Required token audience.
    #[serde(default)]
    pub audience: Option<String>,
    /// Tolerated clock skew in seconds.
    #[serde(default)]
    pub leeway_secs: u64,
}

fn default_access_token_expiry() -> u64 {
    900 // 15 minutes
}

/// Which store backs the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    /// PostgreSQL via SeaORM.
    #[default]
    Postgres,
    /// Process-local store, for development and demos.
    Memory,
}

/// Ledger configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Store backend.
    #[serde(default)]
    pub backend: LedgerBackend,
    /// Attempts for a unit of work that hit a lock conflict.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Capacity of the realtime event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::default(),
            max_retries: default_max_retries(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_event_capacity() -> usize {
    1024
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("BLUEPAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Returns the database URL, if one is configured.
    #[must_use]
    pub fn database_url(&self) -> Option<&str> {
        self.database
            .as_ref()
            .map(|db| db.url.as_str())
            .filter(|url| !url.is_empty())
    }
}
