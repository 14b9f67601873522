//! Merchant ticket templates and wallet items.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(TICKETS_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP TABLE IF EXISTS wallet_items, ticket_templates CASCADE;")
            .await?;
        Ok(())
    }
}

const TICKETS_SQL: &str = r"
CREATE TABLE ticket_templates (
    id UUID PRIMARY KEY,
    merchant_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    title VARCHAR(120) NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    price NUMERIC NOT NULL,
    currency VARCHAR(3) NOT NULL,
    capacity INTEGER,
    issued INTEGER NOT NULL DEFAULT 0,
    valid_until TIMESTAMPTZ,
    active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_ticket_templates_price CHECK (price >= 0),
    CONSTRAINT chk_ticket_templates_capacity CHECK (capacity IS NULL OR capacity > 0),
    CONSTRAINT chk_ticket_templates_issued CHECK (
        issued >= 0 AND (capacity IS NULL OR issued <= capacity)
    )
);

CREATE INDEX idx_ticket_templates_merchant ON ticket_templates(merchant_id, created_at DESC);

CREATE TABLE wallet_items (
    id UUID PRIMARY KEY,
    template_id UUID NOT NULL REFERENCES ticket_templates(id) ON DELETE CASCADE,
    merchant_id UUID NOT NULL REFERENCES accounts(id),
    holder_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    title VARCHAR(120) NOT NULL,
    status VARCHAR(16) NOT NULL DEFAULT 'Active',
    issued_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    redeemed_at TIMESTAMPTZ,
    valid_until TIMESTAMPTZ,
    CONSTRAINT chk_wallet_items_status CHECK (status IN ('Active', 'Redeemed', 'Expired')),
    CONSTRAINT chk_wallet_items_redeemed CHECK ((status = 'Redeemed') = (redeemed_at IS NOT NULL))
);

CREATE INDEX idx_wallet_items_holder ON wallet_items(holder_id, issued_at DESC);
";
