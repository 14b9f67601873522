use super::*;
use rstest::rstest;
use rust_decimal_macros::dec;
use std::str::FromStr;

#[test]
fn test_money_creation() {
    let money = Money::new(dec!(1.00), Currency::Usd);
    assert_eq!(money.amount, dec!(1.00));
    assert_eq!(money.currency, Currency::Usd);
}

#[rstest]
#[case(dec!(10.50), Currency::Usd, true)]
#[case(dec!(10.500), Currency::Usd, true)]
#[case(dec!(10.505), Currency::Usd, false)]
#[case(dec!(100), Currency::Jpy, true)]
#[case(dec!(100.5), Currency::Jpy, false)]
#[case(dec!(0.01), Currency::Eur, true)]
fn test_money_fits_minor_units(
    #[case] amount: Decimal,
    #[case] currency: Currency,
    #[case] expected: bool,
) {
    assert_eq!(Money::new(amount, currency).fits_minor_units(), expected);
}

#[test]
fn test_money_display() {
    assert_eq!(Money::new(dec!(40.00), Currency::Usd).to_string(), "40.00 USD");
}

#[test]
fn test_currency_display() {
    assert_eq!(format!("{}", Currency::Usd), "USD");
    assert_eq!(format!("{}", Currency::Idr), "IDR");
    assert_eq!(format!("{}", Currency::Eur), "EUR");
    assert_eq!(format!("{}", Currency::Sgd), "SGD");
    assert_eq!(format!("{}", Currency::Jpy), "JPY");
}

#[test]
fn test_currency_from_str() {
    assert_eq!(Currency::from_str("USD").unwrap(), Currency::Usd);
    assert_eq!(Currency::from_str("usd").unwrap(), Currency::Usd);
    assert_eq!(Currency::from_str("IDR").unwrap(), Currency::Idr);
    assert!(Currency::from_str("INVALID").is_err());
    assert!(Currency::from_str("").is_err());
}

#[test]
fn test_money_serializes_amount_as_string() {
    let json = serde_json::to_value(Money::new(dec!(12.50), Currency::Sgd)).unwrap();
    assert_eq!(json["amount"], "12.50");
    assert_eq!(json["currency"], "SGD");
}
