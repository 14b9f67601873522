//! Directory service: input validation in front of an [`AccountDirectory`].

use std::sync::Arc;

use tracing::info;

use bluepay_shared::types::AccountId;

use super::{AccountDirectory, DirectoryError, NewAccount, ProfileUpdate};
use crate::account::{Account, Username};

/// Maximum results of a directory search.
pub const SEARCH_LIMIT: u64 = 20;
/// Queries shorter than this return nothing.
pub const SEARCH_MIN_QUERY: usize = 2;
/// Maximum length of a first or last name.
pub const NAME_MAX_LEN: usize = 100;

/// Account directory operations.
#[derive(Clone)]
pub struct DirectoryService {
    directory: Arc<dyn AccountDirectory>,
}

impl DirectoryService {
    /// Creates a service over `directory`.
    #[must_use]
    pub fn new(directory: Arc<dyn AccountDirectory>) -> Self {
        Self { directory }
    }

    /// Registers a new account with a zero balance.
    pub async fn create_account(&self, mut input: NewAccount) -> Result<Account, DirectoryError> {
        input.first_name = validate_name("first_name", &input.first_name)?;
        input.last_name = validate_name("last_name", &input.last_name)?;
        input.email = normalize_email(&input.email)?;

        let account = self.directory.create_account(input).await?;
        info!(account = %account.id, email = %account.email, "Account created");
        Ok(account)
    }

    /// Reads an account.
    pub async fn account(&self, id: AccountId) -> Result<Account, DirectoryError> {
        self.directory
            .account(id)
            .await?
            .ok_or(DirectoryError::NotFound(id))
    }

    /// Looks up `@handle` (the `@` is optional).
    pub async fn find_by_username(&self, handle: &str) -> Result<Option<Account>, DirectoryError> {
        let username: Username = handle.parse().map_err(DirectoryError::InvalidUsername)?;
        self.directory.find_by_username(&username).await
    }

    /// Looks up an email address, case-insensitively.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Account>, DirectoryError> {
        let email = normalize_email(email)?;
        self.directory.find_by_email(&email).await
    }

    /// Prefix search for the payee picker.
    pub async fn search(&self, query: &str, limit: u64) -> Result<Vec<Account>, DirectoryError> {
        let query = query.trim();
        let query = query.strip_prefix('@').unwrap_or(query).to_lowercase();
        if query.chars().count() < SEARCH_MIN_QUERY {
            return Ok(Vec::new());
        }
        self.directory
            .search(&query, limit.clamp(1, SEARCH_LIMIT))
            .await
    }

    /// Claims a handle for the account.
    pub async fn claim_username(&self, id: AccountId, handle: &str) -> Result<Account, DirectoryError> {
        let username: Username = handle.parse().map_err(DirectoryError::InvalidUsername)?;
        let account = self.directory.claim_username(id, &username).await?;
        info!(account = %id, username = %username, "Username claimed");
        Ok(account)
    }

    /// Edits profile fields.
    pub async fn update_profile(
        &self,
        id: AccountId,
        mut update: ProfileUpdate,
    ) -> Result<Account, DirectoryError> {
        if let Some(name) = update.first_name.as_deref() {
            update.first_name = Some(validate_name("first_name", name)?);
        }
        if let Some(name) = update.last_name.as_deref() {
            update.last_name = Some(validate_name("last_name", name)?);
        }
        if update.is_empty() {
            return self.account(id).await;
        }
        self.directory.update_profile(id, update).await
    }
}

fn validate_name(field: &str, value: &str) -> Result<String, DirectoryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DirectoryError::Validation(format!("{field} is required")));
    }
    if trimmed.chars().count() > NAME_MAX_LEN {
        return Err(DirectoryError::Validation(format!(
            "{field} must be at most {NAME_MAX_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn normalize_email(email: &str) -> Result<String, DirectoryError> {
    let email = email.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        });
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(DirectoryError::Validation(format!("invalid email '{email}'")));
    }
    Ok(email)
}
