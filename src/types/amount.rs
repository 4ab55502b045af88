//! Validated monetary amounts
//!
//! Debits and recharge amounts must be strictly positive. `Amount` can only be
//! built through validation, so anything holding one has already passed the
//! "reject before submission" check.

use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

use super::error::LedgerError;

/// Strictly positive decimal amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(Decimal);

impl Amount {
    /// Parse operator input into an amount
    ///
    /// Surrounding whitespace is ignored. Non-numeric input, zero and
    /// negative values are rejected with `LedgerError::InvalidAmount`.
    pub fn parse(input: &str) -> Result<Self, LedgerError> {
        let value =
            Decimal::from_str(input.trim()).map_err(|_| LedgerError::invalid_amount(input))?;
        Self::try_from(value).map_err(|_| LedgerError::invalid_amount(input))
    }

    /// The underlying decimal value
    pub fn value(self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        if value > Decimal::ZERO {
            Ok(Amount(value))
        } else {
            Err(LedgerError::invalid_amount(&value.to_string()))
        }
    }
}

impl FromStr for Amount {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::parse(s)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}
