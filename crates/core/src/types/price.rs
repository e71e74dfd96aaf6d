//! Money amounts using decimal arithmetic.
//!
//! All catalog prices are in Nigerian naira and are whole-unit amounts
//! (`39500` means ₦39,500), but the type keeps full decimal precision so tax
//! calculations do not lose fractions before the final rounding step.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Mul};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// ISO 4217 currency codes the storefront can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    NGN,
    USD,
    GBP,
}

impl CurrencyCode {
    /// Display symbol for the currency.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::NGN => "₦",
            Self::USD => "$",
            Self::GBP => "£",
        }
    }
}

/// A non-negative amount of money in the store currency.
///
/// Serialized as a JSON number so a persisted cart line reads
/// `"unitPrice": 39500`. Deserialization also accepts decimal strings and
/// rejects negative amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(Decimal);

impl Money {
    /// Zero naira.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create an amount, clamping negative values to zero.
    #[must_use]
    pub fn new(amount: Decimal) -> Self {
        Self(amount.max(Decimal::ZERO))
    }

    /// Create an amount from whole currency units.
    #[must_use]
    pub fn from_units(units: i64) -> Self {
        Self::new(Decimal::from(units))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    /// Whether the amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Multiply by a rate (e.g. a tax rate), keeping full precision.
    #[must_use]
    pub fn scale(self, rate: Decimal) -> Self {
        Self::new(self.0 * rate)
    }

    /// Round to whole currency units, half away from zero.
    #[must_use]
    pub fn round_units(self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Format for display with thousands separators (e.g. "₦39,500").
    #[must_use]
    pub fn display(self, currency: CurrencyCode) -> String {
        let rounded = self.round_units().0.normalize();
        let digits = rounded.trunc().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        format!("{}{grouped}", currency.symbol())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display(CurrencyCode::default()))
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Mul<u32> for Money {
    type Output = Self;

    fn mul(self, rhs: u32) -> Self {
        Self(self.0 * Decimal::from(rhs))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0.to_i64() {
            Some(units) if self.0.fract().is_zero() => serializer.serialize_i64(units),
            _ => serializer.serialize_f64(self.0.to_f64().unwrap_or_default()),
        }
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = <Decimal as Deserialize>::deserialize(deserializer)?;
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(serde::de::Error::custom(format!(
                "money amount must not be negative, got {amount}"
            )));
        }
        Ok(Self(amount))
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_amounts_clamp_to_zero() {
        assert_eq!(Money::new(Decimal::from(-5)), Money::ZERO);
    }

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Money::from_units(39_500).to_string(), "₦39,500");
        assert_eq!(Money::from_units(1_234_567).to_string(), "₦1,234,567");
        assert_eq!(Money::from_units(500).to_string(), "₦500");
        assert_eq!(Money::ZERO.to_string(), "₦0");
    }

    #[test]
    fn test_round_units_half_away_from_zero() {
        let amount = Money::new(Decimal::new(29_625, 1)); // 2962.5
        assert_eq!(amount.round_units(), Money::from_units(2963));
    }

    #[test]
    fn test_deserializes_from_number_and_string() {
        let from_number: Money = serde_json::from_str("39500").unwrap();
        let from_string: Money = serde_json::from_str("\"39500\"").unwrap();
        assert_eq!(from_number, from_string);
        assert_eq!(from_number, Money::from_units(39_500));
    }

    #[test]
    fn test_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Money::from_units(39_500)).unwrap(), "39500");
        let fractional = Money::new(Decimal::new(12_345, 1));
        assert_eq!(serde_json::to_string(&fractional).unwrap(), "1234.5");
    }

    #[test]
    fn test_negative_amounts_are_rejected() {
        assert!(serde_json::from_str::<Money>("-500").is_err());
        assert!(serde_json::from_str::<Money>("\"-0.01\"").is_err());
        assert_eq!(serde_json::from_str::<Money>("0").unwrap(), Money::ZERO);
    }

    #[test]
    fn test_line_multiplication_and_sum() {
        let total: Money = [Money::from_units(100) * 3, Money::from_units(50) * 2]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_units(400));
    }
}
