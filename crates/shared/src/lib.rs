//! Shared types, errors, and configuration for BluePay.
//!
//! This crate provides common types used across all other crates:
//! - Money types with decimal precision
//! - Typed IDs for type-safe entity references
//! - Pagination types for list endpoints
//! - Request-level error type for the HTTP edge
//! - Configuration management
//! - Bearer token claims and verification

pub mod auth;
pub mod config;
pub mod error;
pub mod jwt;
pub mod types;

pub use auth::Claims;
pub use config::{AppConfig, LedgerBackend, LedgerConfig};
pub use error::AppError;
pub use jwt::{JwtConfig, JwtError, JwtService};
