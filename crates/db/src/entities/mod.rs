//! `SeaORM` entities, one per table.

pub mod accounts;
pub mod idempotency_keys;
pub mod ticket_templates;
pub mod transactions;
pub mod wallet_items;
