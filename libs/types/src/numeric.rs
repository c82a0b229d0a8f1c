//! Fixed-point decimal types for stakes and prices
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! `Money` carries 8 fractional digits, matching the `DECIMAL(20,8)` columns
//! the platform persists. Input with more digits is rejected; only computed
//! results (fees, pro-rata shares) are rounded, half-to-even, so that
//! repeated splitting of pooled stakes carries no systematic bias.

use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::errors::MoneyError;

/// Fractional digits carried by every `Money` value.
pub const MONEY_SCALE: u32 = 8;

/// Fractional digits allowed in a `Price` (`DECIMAL(10,4)`).
pub const PRICE_SCALE: u32 = 4;

/// Fractional digits allowed in an order quantity.
///
/// `PRICE_SCALE + QUANTITY_SCALE == MONEY_SCALE`, so collateral derived from
/// `price × quantity` is always exact.
pub const QUANTITY_SCALE: u32 = 4;

/// Rounding used wherever a result has more than `MONEY_SCALE` digits.
pub const BANKERS: RoundingStrategy = RoundingStrategy::MidpointNearestEven;

/// Largest representable amount: twenty nines with eight of them fractional.
pub fn max_money() -> Decimal {
    Decimal::from_i128_with_scale(99_999_999_999_999_999_999, MONEY_SCALE)
}

/// Round to the money scale with banker's rounding.
pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(MONEY_SCALE, BANKERS);
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// Non-negative monetary amount with 8 fractional digits
///
/// Used for stakes, quantities, collateral and payouts. All arithmetic is
/// checked: exceeding `max_money()` yields `Overflow`, going below zero yields
/// `NegativeResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Create from a decimal with at most 8 significant fractional digits
    pub fn try_new(value: Decimal) -> Result<Self, MoneyError> {
        if value.normalize().scale() > MONEY_SCALE {
            return Err(MoneyError::Precision {
                value: value.to_string(),
                max_scale: MONEY_SCALE,
            });
        }
        Self::rounded(value)
    }

    /// Create from a computed decimal, rounding to 8 digits half-to-even
    pub fn rounded(value: Decimal) -> Result<Self, MoneyError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(MoneyError::Negative {
                value: value.to_string(),
            });
        }
        let rounded = round_money(value);
        if rounded > max_money() {
            return Err(MoneyError::Overflow);
        }
        Ok(Self(rounded))
    }

    pub fn zero() -> Self {
        Self::ZERO
    }

    pub fn from_u64(value: u64) -> Self {
        // u64::MAX has 20 digits; anything that large is clamped by try_new
        Self::try_new(Decimal::from(value)).unwrap_or(Self(max_money()))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Number of significant fractional digits (trailing zeros ignored)
    pub fn fractional_digits(&self) -> u32 {
        self.0.normalize().scale()
    }

    pub fn checked_add(self, rhs: Money) -> Result<Money, MoneyError> {
        let sum = self.0.checked_add(rhs.0).ok_or(MoneyError::Overflow)?;
        Money::try_new(sum)
    }

    /// Subtract, failing with `NegativeResult` rather than going below zero
    pub fn checked_sub(self, rhs: Money) -> Result<Money, MoneyError> {
        if rhs.0 > self.0 {
            return Err(MoneyError::NegativeResult {
                lhs: self.to_string(),
                rhs: rhs.to_string(),
            });
        }
        Money::try_new(self.0 - rhs.0)
    }

    pub fn saturating_sub(self, rhs: Money) -> Money {
        self.checked_sub(rhs).unwrap_or(Money::ZERO)
    }

    /// Multiply by a non-negative rate (fee percentage, price, ratio)
    pub fn mul_rate(self, rate: Decimal) -> Result<Money, MoneyError> {
        if rate.is_sign_negative() && !rate.is_zero() {
            return Err(MoneyError::Negative {
                value: rate.to_string(),
            });
        }
        let product = self.0.checked_mul(rate).ok_or(MoneyError::Overflow)?;
        Money::rounded(product)
    }

    /// `self × numerator ÷ denominator`, rounded half-to-even
    ///
    /// Used for pro-rata shares of a pool, where the exact quotient is
    /// frequently non-terminating.
    pub fn mul_div(self, numerator: Money, denominator: Money) -> Result<Money, MoneyError> {
        if denominator.is_zero() {
            return Err(MoneyError::DivisionByZero);
        }
        let product = self.0.checked_mul(numerator.0).ok_or(MoneyError::Overflow)?;
        let quotient = product
            .checked_div(denominator.0)
            .ok_or(MoneyError::Overflow)?;
        Money::rounded(quotient)
    }

    /// Sum an iterator of amounts, failing on overflow
    pub fn checked_sum<I>(amounts: I) -> Result<Money, MoneyError>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, amount| acc.checked_add(amount))
    }

    pub fn min(self, other: Money) -> Money {
        if self <= other {
            self
        } else {
            other
        }
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::ZERO
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Money::try_new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str_exact(s).map_err(|_| MoneyError::Parse {
            input: s.to_string(),
        })?;
        Money::try_new(value)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Probability-like price of an outcome, strictly inside (0, 1)
///
/// At most 4 fractional digits. A back order at price `p` commits `p` per
/// unit of quantity; the matching lay commits `1 - p`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Validate bounds and precision, returning `None` when out of range
    pub fn try_new(value: Decimal) -> Option<Self> {
        let normalized = value.normalize();
        if normalized <= Decimal::ZERO || normalized >= Decimal::ONE {
            return None;
        }
        if normalized.scale() > PRICE_SCALE {
            return None;
        }
        Some(Self(normalized))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// `1 - price`: what the lay side commits per unit
    pub fn complement(&self) -> Price {
        Price((Decimal::ONE - self.0).normalize())
    }

    /// Check alignment to a tick size (e.g. 0.01)
    pub fn is_aligned_to(&self, tick: Decimal) -> bool {
        if tick <= Decimal::ZERO {
            return false;
        }
        (self.0 % tick).is_zero()
    }
}

impl TryFrom<Decimal> for Price {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Price::try_new(value).ok_or(MoneyError::InvalidPrice {
            value: value.to_string(),
        })
    }
}

impl From<Price> for Decimal {
    fn from(value: Price) -> Self {
        value.0
    }
}

impl FromStr for Price {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str_exact(s).map_err(|_| MoneyError::Parse {
            input: s.to_string(),
        })?;
        Price::try_from(value)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
