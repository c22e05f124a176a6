//! Money types with exact decimal arithmetic
//!
//! Amounts are fixed-point decimals with two fractional digits backed by
//! rust_decimal. Nothing in this module rounds: input with more precision than
//! a cent is rejected, and arithmetic that cannot be represented fails with
//! `MoneyError::Overflow`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of fractional digits carried by every amount and balance
pub const SCALE: u32 = 2;

/// Largest balance an account can hold, the capacity of `NUMERIC(14, 2)`
pub const MAX_BALANCE: Decimal = dec!(999999999999.99);

/// Why a piece of input could not be turned into an amount
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidAmountReason {
    /// Not a finite decimal number
    Malformed(String),
    /// Zero or negative
    NonPositive,
    /// More than two significant fractional digits
    TooPrecise { scale: u32 },
}

impl fmt::Display for InvalidAmountReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidAmountReason::Malformed(input) => write!(f, "'{}' is not a valid number", input),
            InvalidAmountReason::NonPositive => write!(f, "amount must be positive"),
            InvalidAmountReason::TooPrecise { scale } => write!(
                f,
                "amount has {} decimal places, at most {} are allowed",
                scale, SCALE
            ),
        }
    }
}

/// Errors that can occur during money operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(InvalidAmountReason),

    #[error("{}", range_message(*amount, *min, *max))]
    AmountOutOfRange {
        amount: Decimal,
        min: Decimal,
        max: Decimal,
    },

    #[error("Overflow during calculation")]
    Overflow,

    #[error("Balance {balance:.2} would exceed the account limit of {max:.2}")]
    BalanceLimit { balance: Decimal, max: Decimal },
}

fn range_message(amount: Decimal, min: Decimal, max: Decimal) -> String {
    if amount < min {
        format!("Amount must be at least {:.2}", min)
    } else {
        format!("Amount cannot exceed {:.2}", max)
    }
}

impl MoneyError {
    fn malformed(input: &str) -> Self {
        MoneyError::InvalidAmount(InvalidAmountReason::Malformed(input.to_string()))
    }

    /// Returns true for range failures below the configured minimum
    pub fn is_below_minimum(&self) -> bool {
        matches!(self, MoneyError::AmountOutOfRange { amount, min, .. } if amount < min)
    }
}

/// Inclusive bounds a single operation amount must fall within
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountLimits {
    pub min: Decimal,
    pub max: Decimal,
}

impl AmountLimits {
    pub fn new(min: Decimal, max: Decimal) -> Self {
        Self { min, max }
    }

    fn check(&self, amount: Decimal) -> Result<(), MoneyError> {
        if amount < self.min || amount > self.max {
            return Err(MoneyError::AmountOutOfRange {
                amount,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

impl Default for AmountLimits {
    fn default() -> Self {
        Self {
            min: dec!(0.01),
            max: dec!(1000000.00),
        }
    }
}

/// A validated, strictly positive monetary amount with scale 2
///
/// Direction is never encoded in the sign of an `Amount`; see [`Delta`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    /// Parses user-supplied text and validates it against `limits`
    ///
    /// # Errors
    ///
    /// - `MoneyError::InvalidAmount` for malformed or non-positive input
    /// - `MoneyError::AmountOutOfRange` when outside `limits`
    /// - `MoneyError::InvalidAmount` for in-range input finer than a cent
    pub fn parse(input: &str, limits: &AmountLimits) -> Result<Self, MoneyError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(MoneyError::malformed(input));
        }
        let value = Decimal::from_str(trimmed).map_err(|_| MoneyError::malformed(input))?;
        Self::from_decimal(value, limits)
    }

    /// Validates an already numeric value against `limits`
    ///
    /// The range is checked before the scale, so `0.001` is below the
    /// minimum rather than too precise.
    pub fn from_decimal(value: Decimal, limits: &AmountLimits) -> Result<Self, MoneyError> {
        if value <= Decimal::ZERO {
            return Err(MoneyError::InvalidAmount(InvalidAmountReason::NonPositive));
        }
        limits.check(value.normalize())?;
        Self::from_ledger(value)
    }

    /// Rebuilds an amount read back from storage
    ///
    /// Range limits are not applied because they may have changed since the
    /// entry was written; positivity and scale still are.
    pub fn from_ledger(value: Decimal) -> Result<Self, MoneyError> {
        if value <= Decimal::ZERO {
            return Err(MoneyError::InvalidAmount(InvalidAmountReason::NonPositive));
        }
        let mut normalized = value.normalize();
        if normalized.scale() > SCALE {
            return Err(MoneyError::InvalidAmount(InvalidAmountReason::TooPrecise {
                scale: normalized.scale(),
            }));
        }
        normalized.rescale(SCALE);
        Ok(Self(normalized))
    }

    /// Returns the amount as a decimal
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Returns the delta that credits this amount
    pub fn credit(self) -> Delta {
        Delta::Credit(self)
    }

    /// Returns the delta that debits this amount
    pub fn debit(self) -> Delta {
        Delta::Debit(self)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Decimal {
        amount.0
    }
}

/// A signed change to a balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Delta {
    Credit(Amount),
    Debit(Amount),
}

impl Delta {
    /// The amount moved, without direction
    pub fn amount(&self) -> Amount {
        match self {
            Delta::Credit(amount) | Delta::Debit(amount) => *amount,
        }
    }

    /// The delta as a signed decimal (credits positive)
    pub fn signed(&self) -> Decimal {
        match self {
            Delta::Credit(amount) => amount.0,
            Delta::Debit(amount) => -amount.0,
        }
    }

    /// The delta that undoes this one
    pub fn reversed(&self) -> Delta {
        match self {
            Delta::Credit(amount) => Delta::Debit(*amount),
            Delta::Debit(amount) => Delta::Credit(*amount),
        }
    }

    /// Applies the delta to a balance exactly
    ///
    /// # Errors
    ///
    /// - `MoneyError::Overflow` if the result is not representable
    /// - `MoneyError::BalanceLimit` if the result is above [`MAX_BALANCE`]
    pub fn apply(&self, balance: Decimal) -> Result<Decimal, MoneyError> {
        let result = match self {
            Delta::Credit(amount) => balance.checked_add(amount.0),
            Delta::Debit(amount) => balance.checked_sub(amount.0),
        }
        .ok_or(MoneyError::Overflow)?;
        check_ceiling(result)
    }
}

impl fmt::Display for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delta::Credit(amount) => write!(f, "+{}", amount),
            Delta::Debit(amount) => write!(f, "-{}", amount),
        }
    }
}

fn check_ceiling(balance: Decimal) -> Result<Decimal, MoneyError> {
    if balance > MAX_BALANCE {
        return Err(MoneyError::BalanceLimit {
            balance,
            max: MAX_BALANCE,
        });
    }
    Ok(balance)
}

/// Normalizes a stored balance to scale 2 without rounding
///
/// # Errors
///
/// - `MoneyError::InvalidAmount` if the balance carries sub-cent digits
/// - `MoneyError::BalanceLimit` if it is above [`MAX_BALANCE`]
pub fn normalize_balance(balance: Decimal) -> Result<Decimal, MoneyError> {
    let mut normalized = balance.normalize();
    if normalized.scale() > SCALE {
        return Err(MoneyError::InvalidAmount(InvalidAmountReason::TooPrecise {
            scale: normalized.scale(),
        }));
    }
    normalized.rescale(SCALE);
    check_ceiling(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_amount() {
        let amount = Amount::parse("50.00", &AmountLimits::default()).unwrap();
        assert_eq!(amount.value(), dec!(50.00));
        assert_eq!(amount.to_string(), "50.00");
    }

    #[test]
    fn test_parse_pads_scale() {
        let amount = Amount::parse("7", &AmountLimits::default()).unwrap();
        assert_eq!(amount.value().scale(), 2);
        assert_eq!(amount.to_string(), "7.00");
    }

    #[test]
    fn test_parse_rejects_zero() {
        let result = Amount::parse("0.00", &AmountLimits::default());
        assert_eq!(
            result,
            Err(MoneyError::InvalidAmount(InvalidAmountReason::NonPositive))
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let result = Amount::parse("12abc", &AmountLimits::default());
        assert!(matches!(
            result,
            Err(MoneyError::InvalidAmount(InvalidAmountReason::Malformed(_)))
        ));
    }

    #[test]
    fn test_delta_apply() {
        let amount = Amount::parse("30.00", &AmountLimits::default()).unwrap();
        assert_eq!(amount.debit().apply(dec!(100.00)).unwrap(), dec!(70.00));
        assert_eq!(amount.credit().apply(dec!(5.00)).unwrap(), dec!(35.00));
        assert_eq!(amount.debit().reversed(), amount.credit());
    }
}
