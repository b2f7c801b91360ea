use std::{
    fmt::{self, Display},
    iter::Sum,
    ops::{Add, Mul},
    str::FromStr,
};

use rust_decimal::Decimal;
use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};

/// A monetary amount in rupees.
///
/// The backend is inconsistent about how it sends money: most fields are
/// decimal strings (`"499.00"`), some are plain JSON numbers. Both forms
/// deserialize into the same exact decimal value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Amount(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// `None` when the product does not fit a decimal.
    pub fn checked_mul(self, quantity: u32) -> Option<Amount> {
        self.0.checked_mul(Decimal::from(quantity)).map(Amount)
    }

    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    /// Formats as `₹1234.50`.
    pub fn rupees(&self) -> String {
        format!("₹{}", self)
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Amount {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim()).map(Amount)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount(value)
    }
}

impl From<u32> for Amount {
    fn from(value: u32) -> Self {
        Amount(Decimal::from(value))
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl Mul<u32> for Amount {
    type Output = Amount;

    fn mul(self, rhs: u32) -> Amount {
        Amount(self.0 * Decimal::from(rhs))
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a decimal amount as a string or a number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        Amount::from_str(v).map_err(|e| E::custom(format!("invalid amount `{}`: {}", v, e)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        Ok(Amount(Decimal::from(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        Ok(Amount(Decimal::from(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
        Decimal::try_from(v)
            .map(Amount)
            .map_err(|e| E::custom(format!("invalid amount `{}`: {}", v, e)))
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn deserializes_strings_and_numbers() {
        let from_str: Amount = serde_json::from_str("\"499.50\"").unwrap();
        let from_int: Amount = serde_json::from_str("40").unwrap();
        assert_eq!(from_str, Amount::new(dec!(499.50)));
        assert_eq!(from_int, Amount::new(dec!(40)));
    }

    #[test]
    fn rejects_garbage() {
        assert!(serde_json::from_str::<Amount>("\"12,00\"").is_err());
        assert!(serde_json::from_str::<Amount>("null").is_err());
    }

    #[test]
    fn arithmetic_and_formatting() {
        let unit = Amount::new(dec!(120.25));
        let total: Amount = vec![unit * 2, Amount::from(10)].into_iter().sum();
        assert_eq!(total, Amount::new(dec!(250.50)));
        assert_eq!(total.rupees(), "₹250.50");
        assert_eq!(Amount::ZERO.to_string(), "0.00");
        assert!(Amount::new(dec!(-1)).is_negative());
        assert!(!Amount::ZERO.is_negative());
    }

    #[test]
    fn checked_arithmetic_reports_overflow() {
        let max = Amount::new(Decimal::MAX);
        assert_eq!(max.checked_mul(1), Some(max));
        assert_eq!(max.checked_mul(2), None);
        assert_eq!(max.checked_add(Amount::from(1)), None);
        assert_eq!(
            Amount::new(dec!(12.50)).checked_mul(4),
            Some(Amount::new(dec!(50)))
        );
    }
}
