//! Repository abstractions for data access.
//!
//! Each repository implements one of the core storage ports on top of
//! `SeaORM`, hiding the database from the rest of the application.

pub mod account;
pub mod ledger;
pub mod ticket;

pub use account::AccountRepository;
pub use ledger::{DEFAULT_MAX_RETRIES, PgLedgerStore};
pub use ticket::TicketRepository;
