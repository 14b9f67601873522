//! Wallet accounts.
//!
//! The account id comes from the auth provider. Everything except `balance`
//! is edited through the directory; `balance` is only ever written by the
//! ledger.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bluepay_shared::types::{AccountId, Currency, Money};

/// Minimum handle length, excluding the `@`.
pub const USERNAME_MIN_LEN: usize = 3;
/// Maximum handle length, excluding the `@`.
pub const USERNAME_MAX_LEN: usize = 20;

/// Personal or business (merchant) account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Individual wallet.
    #[default]
    Personal,
    /// Merchant wallet; may issue tickets and itemized requests.
    Business,
}

impl AccountType {
    /// Returns the stored representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Business => "business",
        }
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "personal" => Ok(Self::Personal),
            "business" => Ok(Self::Business),
            _ => Err(format!("Unknown account type: {s}")),
        }
    }
}

/// A unique `@handle`, stored case-folded.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Returns the handle including the leading `@`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the handle without the leading `@`.
    #[must_use]
    pub fn handle(&self) -> &str {
        &self.0[1..]
    }
}

impl FromStr for Username {
    type Err = String;

    /// Accepts `@Handle` or `Handle`; the result is always `@handle`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let handle = s.trim();
        let handle = handle.strip_prefix('@').unwrap_or(handle).to_lowercase();

        let len = handle.chars().count();
        if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
            return Err(format!(
                "username must be {USERNAME_MIN_LEN}-{USERNAME_MAX_LEN} characters"
            ));
        }
        if !handle
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.')
        {
            return Err("username may only contain letters, digits, '_' and '.'".to_string());
        }
        if handle.starts_with('.') || handle.ends_with('.') {
            return Err("username cannot start or end with '.'".to_string());
        }

        Ok(Self(format!("@{handle}")))
    }
}

impl TryFrom<String> for Username {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A wallet account as seen by every module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account id (auth provider subject).
    pub id: AccountId,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Lower-cased email address.
    pub email: String,
    /// Claimed handle, if any.
    pub username: Option<Username>,
    /// Current balance; never negative.
    pub balance: Decimal,
    /// Wallet currency.
    pub currency: Currency,
    /// Personal or business.
    pub account_type: AccountType,
    /// Whether onboarding has been completed.
    pub onboarded: bool,
    /// Signup time.
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Returns the balance with its currency.
    #[must_use]
    pub fn balance_money(&self) -> Money {
        Money::new(self.balance, self.currency)
    }

    /// Returns "First Last", falling back to the username or email.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if !full.is_empty() {
            return full.to_string();
        }
        self.username
            .as_ref()
            .map_or_else(|| self.email.clone(), ToString::to_string)
    }

    /// Returns true for merchant accounts.
    #[must_use]
    pub fn is_business(&self) -> bool {
        self.account_type == AccountType::Business
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("@alice", "@alice")]
    #[case("Alice", "@alice")]
    #[case("  @Bob_99 ", "@bob_99")]
    #[case("@a.b", "@a.b")]
    fn test_username_accepts(#[case] input: &str, #[case] expected: &str) {
        let username: Username = input.parse().unwrap();
        assert_eq!(username.as_str(), expected);
        assert_eq!(username.handle(), &expected[1..]);
    }

    #[rstest]
    #[case("@ab")]
    #[case("@this_handle_is_far_too_long")]
    #[case("@has space")]
    #[case("@dash-ed")]
    #[case("@.dot")]
    #[case("@dot.")]
    #[case("@")]
    fn test_username_rejects(#[case] input: &str) {
        assert!(input.parse::<Username>().is_err());
    }

    #[test]
    fn test_username_serde_roundtrip_normalizes() {
        let username: Username = serde_json::from_str("\"@Carol\"").unwrap();
        assert_eq!(username.as_str(), "@carol");
        assert!(serde_json::from_str::<Username>("\"x\"").is_err());
    }

    #[test]
    fn test_account_type_from_str() {
        assert_eq!("personal".parse::<AccountType>().unwrap(), AccountType::Personal);
        assert_eq!("business".parse::<AccountType>().unwrap(), AccountType::Business);
        assert!("admin".parse::<AccountType>().is_err());
        assert_eq!(AccountType::Business.as_str(), "business");
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut account = Account {
            id: AccountId::new(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            username: None,
            balance: Decimal::ZERO,
            currency: Currency::Usd,
            account_type: AccountType::Personal,
            onboarded: false,
            created_at: Utc::now(),
        };
        assert_eq!(account.display_name(), "Ada Lovelace");

        account.first_name.clear();
        account.last_name.clear();
        assert_eq!(account.display_name(), "ada@example.com");

        account.username = Some("@ada".parse().unwrap());
        assert_eq!(account.display_name(), "@ada");
    }
}
