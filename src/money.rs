//! Monetary amounts.
//!
//! Amounts are exact decimals with two decimal places. They are stored in the
//! database as text and sent to API clients as strings, e.g. `"1250.00"`.

use std::{
    iter::Sum,
    ops::Add,
    str::FromStr,
};

use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize, Serializer};

use crate::Error;

/// The number of decimal places kept for money.
pub const DECIMAL_PLACES: u32 = 2;

/// The maximum number of digits (including the decimal places) of an amount.
pub const MAX_DIGITS: u32 = 12;

/// A non-negative amount of money with at most two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// An amount of zero.
    pub const ZERO: Self = Self(Decimal::from_parts(0, 0, 0, false, DECIMAL_PLACES));

    /// Create and validate an amount.
    ///
    /// # Errors
    ///
    /// Returns an [Error::InvalidAmount] if `value` is negative, has more than
    /// [DECIMAL_PLACES] decimal places, or has more than [MAX_DIGITS] digits.
    pub fn new(value: Decimal) -> Result<Self, Error> {
        if value < Decimal::ZERO {
            return Err(Error::InvalidAmount(
                "el monto no puede ser negativo.".to_owned(),
            ));
        }

        let normalized = value.normalize();

        if normalized.scale() > DECIMAL_PLACES {
            return Err(Error::InvalidAmount(format!(
                "asegúrate de que no haya más de {DECIMAL_PLACES} decimales."
            )));
        }

        let max_whole_digits = MAX_DIGITS - DECIMAL_PLACES;
        if normalized.trunc() >= Decimal::from(10_i64.pow(max_whole_digits)) {
            return Err(Error::InvalidAmount(format!(
                "asegúrate de que no haya más de {MAX_DIGITS} dígitos en total."
            )));
        }

        Ok(Self::new_unchecked(normalized))
    }

    /// Create an amount without validation.
    ///
    /// The caller should ensure `value` is non-negative. The value is
    /// rescaled to two decimal places.
    pub fn new_unchecked(value: Decimal) -> Self {
        Self(round_to_cents(value))
    }

    /// The amount as a decimal.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::ZERO
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = Error;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim())
            .map_err(|error| Error::InvalidAmount(error.to_string()))?;

        Self::new(value)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serialize_two_places(&self.0, serializer)
    }
}

impl ToSql for Amount {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.to_string()))
    }
}

impl FromSql for Amount {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;

        Decimal::from_str(text)
            .map(Amount::new_unchecked)
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// Round `value` half-to-even to two decimal places and pad it to exactly two
/// decimal places.
pub fn round_to_cents(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointNearestEven);
    rounded.rescale(DECIMAL_PLACES);

    rounded
}

/// Serialize a decimal as a string with exactly two decimal places.
///
/// For use with `#[serde(serialize_with = "...")]` on values that may be
/// negative, such as balances.
pub fn serialize_two_places<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&round_to_cents(*value).to_string())
}

/// Format `amount` as a dollar amount with thousands separators, e.g. "$1,234.50".
///
/// Negative amounts are formatted as "-$1,234.50".
pub fn format_currency(amount: Decimal) -> String {
    let rounded = round_to_cents(amount.abs()).to_string();
    let (whole, cents) = rounded.split_once('.').unwrap_or((&rounded, "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < Decimal::ZERO { "-" } else { "" };

    format!("{sign}${grouped}.{cents}")
}

#[cfg(test)]
mod amount_tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;
    use serde_json::json;

    use crate::{Error, money::Amount};

    #[test]
    fn new_pads_to_two_decimal_places() {
        let amount = Amount::new(Decimal::new(255, 1)).unwrap();

        assert_eq!(serde_json::to_value(amount).unwrap(), json!("25.50"));
    }

    #[test]
    fn new_fails_on_negative() {
        let result = Amount::new(Decimal::new(-1, 0));

        assert!(matches!(result, Err(Error::InvalidAmount(_))));
    }

    #[test]
    fn new_fails_on_three_decimal_places() {
        let result = Amount::new(Decimal::new(12345, 3));

        assert!(matches!(result, Err(Error::InvalidAmount(_))));
    }

    #[test]
    fn new_accepts_trailing_zeros_beyond_two_places() {
        let result = Amount::new(Decimal::new(12300, 3));

        assert_eq!(result, Ok(Amount::new_unchecked(Decimal::new(123, 1))));
    }

    #[test]
    fn new_fails_on_too_many_digits() {
        assert!(Amount::new(Decimal::new(9_999_999_999_99, 2)).is_ok());
        assert!(matches!(
            Amount::new(Decimal::new(10_000_000_000, 0)),
            Err(Error::InvalidAmount(_))
        ));
    }

    #[test]
    fn deserializes_from_string_and_number() {
        let from_string: Amount = serde_json::from_value(json!("1200.00")).unwrap();
        let from_number: Amount = serde_json::from_value(json!(1200)).unwrap();
        let from_float: Amount = serde_json::from_value(json!(25.5)).unwrap();

        assert_eq!(from_string, Amount::from_str("1200").unwrap());
        assert_eq!(from_number, from_string);
        assert_eq!(from_float, Amount::from_str("25.50").unwrap());
    }

    #[test]
    fn deserialize_rejects_negative() {
        let result: Result<Amount, _> = serde_json::from_value(json!("-5.00"));

        assert!(result.is_err());
    }

    #[test]
    fn sum_of_amounts() {
        let amounts = [
            Amount::from_str("10.10").unwrap(),
            Amount::from_str("0.90").unwrap(),
        ];

        let total: Amount = amounts.iter().sum();

        assert_eq!(total, Amount::from_str("11").unwrap());
    }
}

#[cfg(test)]
mod format_currency_tests {
    use rust_decimal::Decimal;

    use crate::money::format_currency;

    #[test]
    fn formats_zero() {
        assert_eq!(format_currency(Decimal::ZERO), "$0.00");
    }

    #[test]
    fn formats_small_amount() {
        assert_eq!(format_currency(Decimal::new(1230, 2)), "$12.30");
    }

    #[test]
    fn formats_thousands_separators() {
        assert_eq!(format_currency(Decimal::new(123456789, 2)), "$1,234,567.89");
        assert_eq!(format_currency(Decimal::new(100000, 0)), "$100,000.00");
        assert_eq!(format_currency(Decimal::new(999, 0)), "$999.00");
    }

    #[test]
    fn formats_negative_amount() {
        assert_eq!(format_currency(Decimal::new(-150050, 2)), "-$1,500.50");
    }

    #[test]
    fn rounds_half_to_even() {
        assert_eq!(format_currency(Decimal::new(1005, 3)), "$1.00");
        assert_eq!(format_currency(Decimal::new(1015, 3)), "$1.02");
    }
}
