//! Business rule validation for ledger operations.
//!
//! Checks that need no account data run before the store is touched. Checks
//! that depend on the wallets (currency, precision) run inside the atomic
//! unit, against the accounts that were just read.

use rust_decimal::Decimal;

use bluepay_shared::types::{AccountId, Currency, Money};

use super::error::LedgerError;
use super::types::OrderItem;
use crate::account::Account;

/// Validates the amount and the two parties of an operation.
///
/// # Errors
///
/// Returns `NonPositiveAmount` or `SameAccount`.
pub fn validate_parties(
    from: AccountId,
    to: AccountId,
    amount: Decimal,
) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::NonPositiveAmount);
    }
    if from == to {
        return Err(LedgerError::SameAccount);
    }
    Ok(())
}

/// Validates that an amount is expressible in `currency`.
///
/// # Errors
///
/// Returns `InvalidPrecision` when the amount has more decimal places than
/// the currency's minor unit.
pub fn validate_precision(amount: Decimal, currency: Currency) -> Result<(), LedgerError> {
    if Money::new(amount, currency).fits_minor_units() {
        Ok(())
    } else {
        Err(LedgerError::InvalidPrecision { amount, currency })
    }
}

/// Validates that both wallets hold the same currency and returns it.
///
/// # Errors
///
/// Returns `CurrencyMismatch`.
pub fn validate_currencies(payer: &Account, payee: &Account) -> Result<Currency, LedgerError> {
    if payer.currency == payee.currency {
        Ok(payer.currency)
    } else {
        Err(LedgerError::CurrencyMismatch {
            payer: payer.currency,
            payee: payee.currency,
        })
    }
}

/// Validates an itemized request.
///
/// # Errors
///
/// Returns `InvalidOrderItems` if the list is empty, a name is blank, a price
/// is not positive, or the prices do not sum to `amount`.
pub fn validate_order_items(items: &[OrderItem], amount: Decimal) -> Result<(), LedgerError> {
    if items.is_empty() {
        return Err(LedgerError::InvalidOrderItems(
            "at least one item is required".to_string(),
        ));
    }

    let mut total = Decimal::ZERO;
    for (index, item) in items.iter().enumerate() {
        if item.name.trim().is_empty() {
            return Err(LedgerError::InvalidOrderItems(format!(
                "item {index} has no name"
            )));
        }
        if item.price <= Decimal::ZERO {
            return Err(LedgerError::InvalidOrderItems(format!(
                "item '{}' must have a positive price",
                item.name
            )));
        }
        total = total.checked_add(item.price).ok_or_else(|| {
            LedgerError::InvalidOrderItems("item total overflows".to_string())
        })?;
    }

    if total != amount {
        return Err(LedgerError::InvalidOrderItems(format!(
            "items sum to {total}, request is for {amount}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn item(name: &str, price: Decimal) -> OrderItem {
        OrderItem {
            name: name.to_string(),
            price,
        }
    }

    #[test]
    fn test_parties() {
        let a = AccountId::new();
        let b = AccountId::new();
        assert!(validate_parties(a, b, dec!(1)).is_ok());
        assert!(matches!(
            validate_parties(a, b, Decimal::ZERO),
            Err(LedgerError::NonPositiveAmount)
        ));
        assert!(matches!(
            validate_parties(a, b, dec!(-5)),
            Err(LedgerError::NonPositiveAmount)
        ));
        assert!(matches!(
            validate_parties(a, a, dec!(1)),
            Err(LedgerError::SameAccount)
        ));
    }

    #[rstest]
    #[case(dec!(10.50), Currency::Usd, true)]
    #[case(dec!(10.500), Currency::Usd, true)]
    #[case(dec!(10.505), Currency::Usd, false)]
    #[case(dec!(1500), Currency::Jpy, true)]
    #[case(dec!(100.5), Currency::Jpy, false)]
    fn test_precision(#[case] amount: Decimal, #[case] currency: Currency, #[case] ok: bool) {
        assert_eq!(validate_precision(amount, currency).is_ok(), ok);
    }

    #[test]
    fn test_order_items_sum() {
        let items = vec![item("Coffee", dec!(3.50)), item("Bagel", dec!(2.25))];
        assert!(validate_order_items(&items, dec!(5.75)).is_ok());
        assert!(matches!(
            validate_order_items(&items, dec!(6.00)),
            Err(LedgerError::InvalidOrderItems(_))
        ));
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![item("  ", dec!(1.00))])]
    #[case(vec![item("Free sample", Decimal::ZERO)])]
    fn test_order_items_rejected(#[case] items: Vec<OrderItem>) {
        assert!(matches!(
            validate_order_items(&items, dec!(1.00)),
            Err(LedgerError::InvalidOrderItems(_))
        ));
    }
}
