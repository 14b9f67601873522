//! Wallet schema: accounts, two-sided transaction records and idempotency
//! keys.
//!
//! The CHECK constraints mirror the ledger's invariants so that a bug in a
//! writer cannot leave a negative balance or an impossible status behind.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(ACCOUNTS_SQL).await?;
        db.execute_unprepared(TRANSACTIONS_SQL).await?;
        db.execute_unprepared(IDEMPOTENCY_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            "DROP TABLE IF EXISTS idempotency_keys, transactions, accounts CASCADE;",
        )
        .await?;
        Ok(())
    }
}

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    id UUID PRIMARY KEY,
    first_name VARCHAR(100) NOT NULL,
    last_name VARCHAR(100) NOT NULL,
    email VARCHAR(255) NOT NULL,
    username VARCHAR(21),
    balance NUMERIC NOT NULL DEFAULT 0,
    currency VARCHAR(3) NOT NULL,
    account_type VARCHAR(16) NOT NULL DEFAULT 'personal',
    onboarded BOOLEAN NOT NULL DEFAULT false,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_accounts_balance_non_negative CHECK (balance >= 0),
    CONSTRAINT chk_accounts_currency CHECK (currency IN ('USD', 'IDR', 'EUR', 'SGD', 'JPY')),
    CONSTRAINT chk_accounts_type CHECK (account_type IN ('personal', 'business')),
    CONSTRAINT chk_accounts_username CHECK (username IS NULL OR username ~ '^@[a-z0-9_.]{3,20}$')
);

-- Email is stored lowercased by the directory
CREATE UNIQUE INDEX uq_accounts_email ON accounts(email);

-- Handles are unique once claimed
CREATE UNIQUE INDEX uq_accounts_username ON accounts(username) WHERE username IS NOT NULL;

-- Prefix search on names
CREATE INDEX idx_accounts_first_name ON accounts(lower(first_name) text_pattern_ops);
CREATE INDEX idx_accounts_last_name ON accounts(lower(last_name) text_pattern_ops);
";

const TRANSACTIONS_SQL: &str = r"
CREATE TABLE transactions (
    id UUID PRIMARY KEY,
    owner_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    kind VARCHAR(16) NOT NULL,
    status VARCHAR(16) NOT NULL,
    amount NUMERIC NOT NULL,
    currency VARCHAR(3) NOT NULL,
    note TEXT NOT NULL DEFAULT '',
    attachment_url TEXT,
    date TIMESTAMPTZ NOT NULL,
    other_party_id UUID NOT NULL REFERENCES accounts(id),
    request_id UUID,
    order_items JSONB,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_transactions_amount_positive CHECK (amount > 0),
    CONSTRAINT chk_transactions_not_self CHECK (owner_id <> other_party_id),
    CONSTRAINT chk_transactions_kind_status CHECK (
        (kind = 'payment' AND status IN ('Completed', 'Requested', 'Cancelled'))
        OR (kind = 'receipt' AND status IN ('Completed', 'Pending', 'Failed', 'Cancelled'))
    )
);

-- One record per side of a request
CREATE UNIQUE INDEX uq_transactions_owner_request
    ON transactions(owner_id, request_id) WHERE request_id IS NOT NULL;

-- History, newest first
CREATE INDEX idx_transactions_owner_date ON transactions(owner_id, date DESC, id DESC);
";

const IDEMPOTENCY_SQL: &str = r"
CREATE TABLE idempotency_keys (
    account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    key VARCHAR(128) NOT NULL,
    request_id UUID NOT NULL,
    fingerprint TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (account_id, key)
);
";
