//! Monetary amounts.
//!
//! `Money` wraps `rust_decimal::Decimal` so currency arithmetic never goes
//! through binary floating point. All arithmetic is checked; rounding happens
//! only in [`Money::rounded`] / [`Money::to_display_string`], which are meant
//! for presentation and never for accumulators.

use core::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_object::ValueObject;

/// Decimal places used when rendering an amount.
pub const DISPLAY_SCALE: u32 = 2;

/// A signed decimal amount of money (single implicit currency).
///
/// JSON form is a decimal string (`"25.50"`); numbers are accepted on input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn zero() -> Self {
        Self::ZERO
    }

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// `self × quantity`, `None` on overflow.
    pub fn checked_mul_quantity(self, quantity: i64) -> Option<Money> {
        self.0.checked_mul(Decimal::from(quantity)).map(Money)
    }

    /// Checked sum of an iterator of amounts; `None` on overflow.
    pub fn try_sum<I>(amounts: I) -> Option<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(m))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Amount rounded to [`DISPLAY_SCALE`] places, midpoint away from zero.
    pub fn rounded(&self) -> Money {
        Money(
            self.0
                .round_dp_with_strategy(DISPLAY_SCALE, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Fixed two-place rendering (`"25.50"`, `"-40.00"`).
    pub fn to_display_string(&self) -> String {
        let mut d = self.rounded().0;
        d.rescale(DISPLAY_SCALE);
        d.to_string()
    }
}

impl core::ops::Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .map(Money)
            .map_err(|e| DomainError::validation(format!("invalid amount '{s}': {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn decimal_sum_has_no_float_drift() {
        let tenth = Money::new(dec!(0.1));
        let total = Money::try_sum(std::iter::repeat_n(tenth, 10)).unwrap();
        assert_eq!(total, Money::new(dec!(1.0)));
    }

    #[test]
    fn multiplication_by_quantity() {
        let price = Money::new(dec!(10.00));
        assert_eq!(price.checked_mul_quantity(2), Some(Money::new(dec!(20.00))));
    }

    #[test]
    fn overflow_is_reported_not_wrapped() {
        let max = Money::new(Decimal::MAX);
        assert_eq!(max.checked_add(Money::new(dec!(1))), None);
        assert_eq!(max.checked_mul_quantity(2), None);
    }

    #[test]
    fn display_rounds_half_away_from_zero() {
        assert_eq!(Money::new(dec!(2.345)).to_display_string(), "2.35");
        assert_eq!(Money::new(dec!(-2.345)).to_display_string(), "-2.35");
        assert_eq!(Money::new(dec!(25.5)).to_display_string(), "25.50");
        assert_eq!(Money::new(dec!(7)).to_display_string(), "7.00");
    }

    #[test]
    fn sign_helpers() {
        assert!(Money::new(dec!(-0.01)).is_negative());
        assert!(!Money::zero().is_negative());
        assert!(!Money::zero().is_positive());
        assert!(Money::new(dec!(0.01)).is_positive());
        assert_eq!(-Money::new(dec!(40)), Money::new(dec!(-40)));
    }

    #[test]
    fn json_accepts_strings_and_numbers() {
        let from_str: Money = serde_json::from_str("\"10.50\"").unwrap();
        let from_num: Money = serde_json::from_str("10.5").unwrap();
        assert_eq!(from_str, from_num);
        assert_eq!(serde_json::to_string(&from_str).unwrap(), "\"10.50\"");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("12.x".parse::<Money>().is_err());
        assert_eq!(" 3.10 ".parse::<Money>().unwrap(), Money::new(dec!(3.1)));
    }
}
