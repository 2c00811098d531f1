//! Money amounts with two fractional digits.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of fractional digits kept for every amount.
pub const SCALE: u32 = 2;

/// A currency amount backed by a decimal, always rounded to cents.
///
/// Serializes as a decimal string (e.g. `"12.34"`) so no precision is lost on
/// the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Creates an amount, rounding half away from zero to two digits.
    pub fn new(amount: Decimal) -> Self {
        let mut amount = amount.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero);
        amount.rescale(SCALE);
        Self(amount)
    }

    /// Creates an amount from a whole number of cents.
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, SCALE))
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(Decimal::new(0, SCALE))
    }

    /// Returns the decimal amount.
    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Multiplies by a quantity, or returns `None` if the result overflows.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(Decimal::from(quantity)).map(Money::new)
    }

    /// Adds two amounts, or returns `None` if the result overflows.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Reduces the amount by `percentage` percent.
    ///
    /// The percentage is clamped to `0..=100`, so the result is never negative
    /// for a non-negative amount and never larger than the original.
    pub fn discounted(&self, percentage: Decimal) -> Money {
        let pct = percentage.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
        let off = self.0 * (pct / Decimal::ONE_HUNDRED);
        Money::new(self.0 - off)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_negative() {
            write!(f, "-${:.2}", self.0.abs())
        } else {
            write!(f, "${:.2}", self.0)
        }
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim()).map(Money::new)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Money::new(amount)
    }
}
