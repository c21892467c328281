use crate::error::{EscrowError, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

/// Number of decimal places kept when an amount is scaled by a fraction.
pub const MONEY_SCALE: u32 = 4;

/// A non-negative monetary amount.
///
/// Wraps `rust_decimal::Decimal` so that balances, stakes and ledger legs can
/// never hold a negative value. Subtraction is checked; scaling by a
/// [`FeeRate`] rounds to [`MONEY_SCALE`] places with banker's rounding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Token(Decimal);

impl Token {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self> {
        if value < Decimal::ZERO {
            return Err(EscrowError::ValidationError(format!(
                "Amount must be greater than or equal to 0, but got {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Subtracts `rhs`, failing if the result would be negative.
    pub fn checked_sub(self, rhs: Self) -> Result<Self> {
        if rhs.0 > self.0 {
            return Err(EscrowError::ValidationError(format!(
                "Cannot subtract {rhs} from {self}: result would be negative"
            )));
        }
        Ok(Self(self.0 - rhs.0))
    }

    /// Multiplies by a fraction, e.g. to compute a fee cut.
    pub fn scale(self, rate: FeeRate) -> Self {
        Self(
            (self.0 * rate.value())
                .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven),
        )
    }
}

impl Add for Token {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Token {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, t| acc + t)
    }
}

impl TryFrom<Decimal> for Token {
    type Error = EscrowError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Token> for Decimal {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A fraction in `[0, 1]`, used for fee cuts and time windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct FeeRate(Decimal);

impl FeeRate {
    pub const ZERO: Self = Self(Decimal::ZERO);
    pub const ONE: Self = Self(Decimal::ONE);

    pub fn new(value: Decimal) -> Result<Self> {
        if value < Decimal::ZERO || value > Decimal::ONE {
            return Err(EscrowError::ValidationError(format!(
                "Fee rate must be between 0 and 1, but got {value}"
            )));
        }
        Ok(Self(value))
    }

    /// `value` hundredths, e.g. `percent(10)` is 0.10. Out-of-range values
    /// fail to compile when used in a const.
    pub const fn percent(value: u32) -> Self {
        assert!(value <= 100, "fee rate percent must not exceed 100");
        Self(Decimal::from_parts(value, 0, 0, false, 2))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for FeeRate {
    type Error = EscrowError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<FeeRate> for Decimal {
    fn from(rate: FeeRate) -> Self {
        rate.0
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
