//! Account balance mutations.
//!
//! This is the only place a new balance is computed. Stores receive the
//! result as a [`BalanceChange`] carrying both the balance that was read and
//! the balance to write, so a store can refuse to apply it over a value that
//! changed underneath.

use rust_decimal::Decimal;

use bluepay_shared::types::AccountId;

use super::error::LedgerError;
use crate::account::Account;

/// A compare-and-set balance update for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceChange {
    account: AccountId,
    previous: Decimal,
    current: Decimal,
}

impl BalanceChange {
    /// The account being updated.
    #[must_use]
    pub const fn account(&self) -> AccountId {
        self.account
    }

    /// Balance read inside the atomic unit.
    #[must_use]
    pub const fn previous(&self) -> Decimal {
        self.previous
    }

    /// Balance to write.
    #[must_use]
    pub const fn current(&self) -> Decimal {
        self.current
    }

    /// Signed difference applied to the account.
    #[must_use]
    pub fn delta(&self) -> Decimal {
        self.current - self.previous
    }
}

/// Takes `amount` out of `account`.
pub(crate) fn debit(account: &Account, amount: Decimal) -> Result<BalanceChange, LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::NonPositiveAmount);
    }
    if account.balance < amount {
        return Err(LedgerError::InsufficientFunds {
            account: account.id,
            available: account.balance,
            requested: amount,
        });
    }
    let current = account
        .balance
        .checked_sub(amount)
        .ok_or_else(|| LedgerError::Internal("balance underflow".to_string()))?;

    Ok(BalanceChange {
        account: account.id,
        previous: account.balance,
        current,
    })
}

/// Adds `amount` to `account`.
pub(crate) fn credit(account: &Account, amount: Decimal) -> Result<BalanceChange, LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::NonPositiveAmount);
    }
    let current = account
        .balance
        .checked_add(amount)
        .ok_or_else(|| LedgerError::Internal("balance overflow".to_string()))?;

    Ok(BalanceChange {
        account: account.id,
        previous: account.balance,
        current,
    })
}

/// Moves `amount` from `payer` to `payee`.
///
/// Returns the debit and the credit, in that order. The sum of both deltas is
/// always zero.
pub(crate) fn transfer(
    payer: &Account,
    payee: &Account,
    amount: Decimal,
) -> Result<(BalanceChange, BalanceChange), LedgerError> {
    if payer.id == payee.id {
        return Err(LedgerError::SameAccount);
    }
    let debit = debit(payer, amount)?;
    let credit = credit(payee, amount)?;
    Ok((debit, credit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountType;
    use bluepay_shared::types::Currency;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn account(balance: Decimal) -> Account {
        Account {
            id: AccountId::new(),
            first_name: "Test".into(),
            last_name: "User".into(),
            email: "test@example.com".into(),
            username: None,
            balance,
            currency: Currency::Usd,
            account_type: AccountType::Personal,
            onboarded: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_debit_within_balance() {
        let payer = account(dec!(100.00));
        let change = debit(&payer, dec!(40.00)).unwrap();
        assert_eq!(change.previous(), dec!(100.00));
        assert_eq!(change.current(), dec!(60.00));
        assert_eq!(change.delta(), dec!(-40.00));
    }

    #[test]
    fn test_debit_entire_balance() {
        let payer = account(dec!(25.00));
        assert_eq!(debit(&payer, dec!(25.00)).unwrap().current(), Decimal::ZERO);
    }

    #[test]
    fn test_debit_over_balance() {
        let payer = account(dec!(10.00));
        let err = debit(&payer, dec!(40.00)).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientFunds { available, requested, .. }
                if available == dec!(10.00) && requested == dec!(40.00)
        ));
    }

    #[test]
    fn test_non_positive_amounts() {
        let a = account(dec!(10.00));
        assert!(matches!(debit(&a, Decimal::ZERO), Err(LedgerError::NonPositiveAmount)));
        assert!(matches!(credit(&a, dec!(-1)), Err(LedgerError::NonPositiveAmount)));
    }

    #[test]
    fn test_transfer_conserves_total() {
        let payer = account(dec!(100.00));
        let payee = account(dec!(5.50));
        let (d, c) = transfer(&payer, &payee, dec!(0.10)).unwrap();
        assert_eq!(d.delta() + c.delta(), Decimal::ZERO);
        assert_eq!(d.current() + c.current(), dec!(105.50));
    }

    #[test]
    fn test_transfer_to_self() {
        let a = account(dec!(100.00));
        assert!(matches!(transfer(&a, &a, dec!(1)), Err(LedgerError::SameAccount)));
    }
}
