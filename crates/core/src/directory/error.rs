//! Account directory errors.

use thiserror::Error;

use bluepay_shared::types::AccountId;

/// Errors that can occur during directory operations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// An account with this id or email already exists.
    #[error("Account already exists: {0}")]
    AlreadyExists(String),

    /// Another account holds this username.
    #[error("Username {0} is already taken")]
    UsernameTaken(String),

    /// The username is malformed.
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    /// Account not found.
    #[error("Account not found: {0}")]
    NotFound(AccountId),

    /// A profile field is invalid.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl DirectoryError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AlreadyExists(_) => "ACCOUNT_EXISTS",
            Self::UsernameTaken(_) => "USERNAME_TAKEN",
            Self::InvalidUsername(_) => "INVALID_USERNAME",
            Self::NotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidUsername(_) | Self::Validation(_) => 400,
            Self::NotFound(_) => 404,
            Self::AlreadyExists(_) | Self::UsernameTaken(_) => 409,
            Self::Database(_) => 500,
        }
    }
}
