//! Core business logic for BluePay.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Persistence is reached through the ports defined here and implemented by
//! `bluepay-db` (PostgreSQL) and [`memory`] (process-local).
//!
//! # Modules
//!
//! - `account` - Wallet accounts and usernames
//! - `ledger` - Payments, payment requests and the two-sided record model
//! - `directory` - Account lookup, signup and profile edits
//! - `tickets` - Merchant ticket issuance and redemption
//! - `memory` - In-memory implementation of every port

pub mod account;
pub mod directory;
pub mod ledger;
pub mod memory;
pub mod tickets;

pub use account::{Account, AccountType, Username};
pub use memory::MemoryBackend;
