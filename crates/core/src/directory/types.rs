//! Directory input types.

use serde::Deserialize;

use bluepay_shared::types::{AccountId, Currency};

use crate::account::AccountType;

/// Signup data. The id is the auth provider's subject.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    /// Account id.
    pub id: AccountId,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Email address; stored lower-cased.
    pub email: String,
    /// Wallet currency.
    pub currency: Currency,
    /// Personal or business.
    #[serde(default)]
    pub account_type: AccountType,
}

/// Editable profile fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    /// New given name.
    pub first_name: Option<String>,
    /// New family name.
    pub last_name: Option<String>,
    /// New account type.
    pub account_type: Option<AccountType>,
    /// Onboarding flag.
    pub onboarded: Option<bool>,
}

impl ProfileUpdate {
    /// Returns true if nothing would change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.account_type.is_none()
            && self.onboarded.is_none()
    }
}
