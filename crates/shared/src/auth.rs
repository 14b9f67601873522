//! Bearer token claims.
//!
//! Identity is owned by the external auth provider; the token subject is the
//! wallet account id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::AccountId;

/// JWT claims for access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (wallet account ID).
    pub sub: AccountId,
    /// Email the provider verified, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Issuer (the auth provider).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Intended audience.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// Issued at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
}

impl Claims {
    /// Creates new claims for an account.
    #[must_use]
    pub fn new(account_id: AccountId, email: Option<String>, expires_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            sub: account_id,
            email,
            iss: None,
            aud: None,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        }
    }

    /// Sets the issuer and audience.
    #[must_use]
    pub fn issued_by(mut self, iss: Option<String>, aud: Option<String>) -> Self {
        self.iss = iss;
        self.aud = aud;
        self
    }

    /// Returns the account ID from claims.
    #[must_use]
    pub const fn account_id(&self) -> AccountId {
        self.sub
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_claims_new_sets_correct_fields() {
        let account_id = AccountId::new();
        let expires_at = Utc::now() + Duration::hours(1);

        let claims = Claims::new(account_id, Some("p@example.com".into()), expires_at);

        assert_eq!(claims.account_id(), account_id);
        assert_eq!(claims.email.as_deref(), Some("p@example.com"));
        assert!(claims.iat <= Utc::now().timestamp());
        assert_eq!(claims.exp, expires_at.timestamp());
    }
}
