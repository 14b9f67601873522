//! Account directory.
//!
//! Profiles, handles and lookup. The directory never writes a balance.

mod error;
mod service;
mod types;

use async_trait::async_trait;

use bluepay_shared::types::AccountId;

use crate::account::{Account, Username};

pub use error::DirectoryError;
pub use service::{DirectoryService, NAME_MAX_LEN, SEARCH_LIMIT, SEARCH_MIN_QUERY};
pub use types::{NewAccount, ProfileUpdate};

/// Storage backend for account profiles.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Creates an account with a zero balance.
    async fn create_account(&self, account: NewAccount) -> Result<Account, DirectoryError>;

    /// Reads an account.
    async fn account(&self, id: AccountId) -> Result<Option<Account>, DirectoryError>;

    /// Finds an account by handle.
    async fn find_by_username(&self, username: &Username)
    -> Result<Option<Account>, DirectoryError>;

    /// Finds an account by lower-cased email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, DirectoryError>;

    /// Prefix search over handle and names, ordered by handle.
    async fn search(&self, query: &str, limit: u64) -> Result<Vec<Account>, DirectoryError>;

    /// Sets the account's handle.
    async fn claim_username(
        &self,
        id: AccountId,
        username: &Username,
    ) -> Result<Account, DirectoryError>;

    /// Applies a profile update.
    async fn update_profile(
        &self,
        id: AccountId,
        update: ProfileUpdate,
    ) -> Result<Account, DirectoryError>;
}
