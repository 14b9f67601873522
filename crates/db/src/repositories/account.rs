//! Account repository: the PostgreSQL account directory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func, NullOrdering};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, Order,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
};
use tracing::debug;

use bluepay_core::account::{Account, Username};
use bluepay_core::directory::{AccountDirectory, DirectoryError, NewAccount, ProfileUpdate};
use bluepay_shared::types::AccountId;

use crate::entities::accounts;

/// Converts a stored row into a domain account.
pub(crate) fn to_account(model: accounts::Model) -> Result<Account, String> {
    Ok(Account {
        id: AccountId::from_uuid(model.id),
        first_name: model.first_name,
        last_name: model.last_name,
        email: model.email,
        username: model.username.map(Username::try_from).transpose()?,
        balance: model.balance,
        currency: model.currency.parse()?,
        account_type: model.account_type.parse()?,
        onboarded: model.onboarded,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

fn db_err(e: DbErr) -> DirectoryError {
    DirectoryError::Database(e.to_string())
}

fn convert(model: accounts::Model) -> Result<Account, DirectoryError> {
    to_account(model).map_err(DirectoryError::Database)
}

/// Escapes `LIKE` wildcards in user input.
fn like_prefix(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("{escaped}%")
}

/// Account repository backed by the `accounts` table.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: DatabaseConnection,
}

impl AccountRepository {
    /// Creates a new account repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find(&self, id: AccountId) -> Result<accounts::Model, DirectoryError> {
        accounts::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or(DirectoryError::NotFound(id))
    }
}

#[async_trait]
impl AccountDirectory for AccountRepository {
    async fn create_account(&self, input: NewAccount) -> Result<Account, DirectoryError> {
        let now: DateTime<Utc> = Utc::now();
        let email = input.email.to_lowercase();
        let model = accounts::ActiveModel {
            id: Set(input.id.into_inner()),
            first_name: Set(input.first_name),
            last_name: Set(input.last_name),
            email: Set(email.clone()),
            username: Set(None),
            balance: Set(Decimal::ZERO),
            currency: Set(input.currency.code().to_string()),
            account_type: Set(input.account_type.as_str().to_string()),
            onboarded: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let created = model.insert(&self.db).await.map_err(|e| {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                DirectoryError::AlreadyExists(email.clone())
            } else {
                db_err(e)
            }
        })?;

        debug!(account_id = %created.id, "Account row inserted");
        convert(created)
    }

    async fn account(&self, id: AccountId) -> Result<Option<Account>, DirectoryError> {
        accounts::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(convert)
            .transpose()
    }

    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<Account>, DirectoryError> {
        accounts::Entity::find()
            .filter(accounts::Column::Username.eq(username.as_str()))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(convert)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, DirectoryError> {
        accounts::Entity::find()
            .filter(accounts::Column::Email.eq(email.to_lowercase()))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(convert)
            .transpose()
    }

    async fn search(&self, query: &str, limit: u64) -> Result<Vec<Account>, DirectoryError> {
        let query = query.to_lowercase();
        let pattern = like_prefix(&query);

        let rows = accounts::Entity::find()
            .filter(
                Condition::any()
                    .add(accounts::Column::Username.like(format!("@{pattern}")))
                    .add(Expr::expr(Func::lower(Expr::col(accounts::Column::FirstName))).like(&pattern))
                    .add(Expr::expr(Func::lower(Expr::col(accounts::Column::LastName))).like(&pattern)),
            )
            .order_by_with_nulls(accounts::Column::Username, Order::Asc, NullOrdering::Last)
            .order_by_asc(accounts::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(convert).collect()
    }

    async fn claim_username(
        &self,
        id: AccountId,
        username: &Username,
    ) -> Result<Account, DirectoryError> {
        let current = self.find(id).await?;
        if current.username.as_deref() == Some(username.as_str()) {
            return convert(current);
        }

        let mut model: accounts::ActiveModel = current.into();
        model.username = Set(Some(username.to_string()));
        model.updated_at = Set(Utc::now().into());

        let updated = model.update(&self.db).await.map_err(|e| {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                DirectoryError::UsernameTaken(username.to_string())
            } else {
                db_err(e)
            }
        })?;

        convert(updated)
    }

    async fn update_profile(
        &self,
        id: AccountId,
        update: ProfileUpdate,
    ) -> Result<Account, DirectoryError> {
        let mut model: accounts::ActiveModel = self.find(id).await?.into();
        if let Some(first_name) = update.first_name {
            model.first_name = Set(first_name);
        }
        if let Some(last_name) = update.last_name {
            model.last_name = Set(last_name);
        }
        if let Some(account_type) = update.account_type {
            model.account_type = Set(account_type.as_str().to_string());
        }
        if let Some(onboarded) = update.onboarded {
            model.onboarded = Set(onboarded);
        }
        model.updated_at = Set(Utc::now().into());

        let updated = model.update(&self.db).await.map_err(db_err)?;
        convert(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_prefix_escapes_wildcards() {
        assert_eq!(like_prefix("ann"), "ann%");
        assert_eq!(like_prefix("a_b"), "a\\_b%");
        assert_eq!(like_prefix("50%"), "50\\%%");
    }

    #[test]
    fn test_to_account_rejects_unknown_currency() {
        let now = Utc::now().into();
        let model = accounts::Model {
            id: uuid::Uuid::now_v7(),
            first_name: "Ann".into(),
            last_name: "Lee".into(),
            email: "ann@example.com".into(),
            username: Some("@ann".into()),
            balance: Decimal::ZERO,
            currency: "XXX".into(),
            account_type: "personal".into(),
            onboarded: true,
            created_at: now,
            updated_at: now,
        };
        assert!(to_account(model.clone()).is_err());

        let ok = accounts::Model {
            currency: "USD".into(),
            ..model
        };
        let account = to_account(ok).unwrap();
        assert_eq!(account.username.unwrap().as_str(), "@ann");
    }
}
