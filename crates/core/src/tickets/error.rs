//! Ticket errors.

use thiserror::Error;

use bluepay_shared::types::{AccountId, TicketTemplateId, WalletItemId};

use crate::directory::DirectoryError;

/// Errors that can occur during ticket operations.
#[derive(Debug, Error)]
pub enum TicketError {
    /// Only business accounts may create templates.
    #[error("Account {0} is not a business account")]
    NotMerchant(AccountId),

    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Template not found.
    #[error("Ticket template not found: {0}")]
    TemplateNotFound(TicketTemplateId),

    /// Wallet item not found.
    #[error("Ticket not found: {0}")]
    WalletItemNotFound(WalletItemId),

    /// Template input is invalid.
    #[error("Invalid ticket template: {0}")]
    InvalidTemplate(String),

    /// Template no longer issues tickets.
    #[error("Ticket template {0} is inactive")]
    TemplateInactive(TicketTemplateId),

    /// Every ticket has been issued.
    #[error("Ticket template {0} is sold out")]
    SoldOut(TicketTemplateId),

    /// Validity window has closed.
    #[error("Ticket has expired")]
    Expired,

    /// Only the issuing merchant may do this.
    #[error("Account {0} did not issue this ticket")]
    NotIssuer(AccountId),

    /// Ticket was already used.
    #[error("Ticket {0} was already redeemed")]
    AlreadyRedeemed(WalletItemId),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TicketError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotMerchant(_) => "NOT_MERCHANT",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::TemplateNotFound(_) => "TEMPLATE_NOT_FOUND",
            Self::WalletItemNotFound(_) => "TICKET_NOT_FOUND",
            Self::InvalidTemplate(_) => "INVALID_TEMPLATE",
            Self::TemplateInactive(_) => "TEMPLATE_INACTIVE",
            Self::SoldOut(_) => "SOLD_OUT",
            Self::Expired => "TICKET_EXPIRED",
            Self::NotIssuer(_) => "NOT_ISSUER",
            Self::AlreadyRedeemed(_) => "ALREADY_REDEEMED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidTemplate(_) => 400,
            Self::NotMerchant(_) | Self::NotIssuer(_) => 403,
            Self::AccountNotFound(_) | Self::TemplateNotFound(_) | Self::WalletItemNotFound(_) => {
                404
            }
            Self::TemplateInactive(_) | Self::SoldOut(_) | Self::AlreadyRedeemed(_) => 409,
            Self::Expired => 410,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }
}

impl From<DirectoryError> for TicketError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound(id) => Self::AccountNotFound(id),
            DirectoryError::Database(msg) => Self::Database(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}
