use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use bluepay_shared::types::AccountId;

use super::MemoryBackend;
use crate::account::{Account, Username};
use crate::directory::{AccountDirectory, DirectoryError, NewAccount, ProfileUpdate};

#[async_trait]
impl AccountDirectory for MemoryBackend {
    async fn create_account(&self, input: NewAccount) -> Result<Account, DirectoryError> {
        let mut state = self.state.lock().await;
        if state.accounts.contains_key(&input.id) {
            return Err(DirectoryError::AlreadyExists(input.id.to_string()));
        }
        let email = input.email.to_lowercase();
        if state.accounts.values().any(|a| a.email == email) {
            return Err(DirectoryError::AlreadyExists(email));
        }

        let account = Account {
            id: input.id,
            first_name: input.first_name,
            last_name: input.last_name,
            email,
            username: None,
            balance: Decimal::ZERO,
            currency: input.currency,
            account_type: input.account_type,
            onboarded: false,
            created_at: Utc::now(),
        };
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn account(&self, id: AccountId) -> Result<Option<Account>, DirectoryError> {
        Ok(self.state.lock().await.accounts.get(&id).cloned())
    }

    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<Account>, DirectoryError> {
        let state = self.state.lock().await;
        Ok(state
            .accounts
            .values()
            .find(|a| a.username.as_ref() == Some(username))
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, DirectoryError> {
        let email = email.to_lowercase();
        let state = self.state.lock().await;
        Ok(state.accounts.values().find(|a| a.email == email).cloned())
    }

    async fn search(&self, query: &str, limit: u64) -> Result<Vec<Account>, DirectoryError> {
        let query = query.to_lowercase();
        let state = self.state.lock().await;
        let mut hits: Vec<Account> = state
            .accounts
            .values()
            .filter(|a| {
                a.username.as_ref().is_some_and(|u| u.handle().starts_with(&query))
                    || a.first_name.to_lowercase().starts_with(&query)
                    || a.last_name.to_lowercase().starts_with(&query)
            })
            .cloned()
            .collect();
        // Accounts without a handle sort last.
        hits.sort_by(|a, b| {
            let key = |x: &Account| (x.username.is_none(), x.username.clone(), x.id);
            key(a).cmp(&key(b))
        });
        hits.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(hits)
    }

    async fn claim_username(
        &self,
        id: AccountId,
        username: &Username,
    ) -> Result<Account, DirectoryError> {
        let mut state = self.state.lock().await;
        if state
            .accounts
            .values()
            .any(|a| a.id != id && a.username.as_ref() == Some(username))
        {
            return Err(DirectoryError::UsernameTaken(username.to_string()));
        }
        let account = state
            .accounts
            .get_mut(&id)
            .ok_or(DirectoryError::NotFound(id))?;
        account.username = Some(username.clone());
        Ok(account.clone())
    }

    async fn update_profile(
        &self,
        id: AccountId,
        update: ProfileUpdate,
    ) -> Result<Account, DirectoryError> {
        let mut state = self.state.lock().await;
        let account = state
            .accounts
            .get_mut(&id)
            .ok_or(DirectoryError::NotFound(id))?;
        if let Some(first_name) = update.first_name {
            account.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            account.last_name = last_name;
        }
        if let Some(account_type) = update.account_type {
            account.account_type = account_type;
        }
        if let Some(onboarded) = update.onboarded {
            account.onboarded = onboarded;
        }
        Ok(account.clone())
    }
}
