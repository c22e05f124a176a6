//! Ledger domain errors

use rust_decimal::Decimal;
use thiserror::Error;

use core_kernel::{AccountId, AccountRef, MoneyError};

/// Errors that can occur in the ledger domain
///
/// This is the closed set of failures the engine reports to its callers.
/// None of them leave a partially applied operation behind.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Malformed, non-positive, too precise or out-of-range amount, or one
    /// that would push a balance past its ceiling
    #[error(transparent)]
    InvalidAmount(#[from] MoneyError),

    /// Unknown account, employee or search term
    #[error("{entity} not found: {key}")]
    NotFound {
        entity: &'static str,
        key: String,
    },

    /// The debit would take the balance below the floor
    #[error("Insufficient funds in account {account_id}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account_id: AccountId,
        balance: Decimal,
        requested: Decimal,
    },

    /// The request is well-formed but not allowed
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Lock contention or timeout; the caller may retry
    #[error("Ledger busy, please retry: {0}")]
    Busy(String),

    /// The underlying store is unavailable or misbehaving
    #[error("Storage failure: {0}")]
    StorageFailure(String),
}

impl LedgerError {
    /// Creates a NotFound error for an account reference
    pub fn account_not_found(account: impl std::fmt::Display) -> Self {
        LedgerError::NotFound {
            entity: "Account",
            key: account.to_string(),
        }
    }

    /// Creates a NotFound error for an unresolved account reference
    pub fn unresolved(account: &AccountRef) -> Self {
        Self::account_not_found(account)
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        LedgerError::InvalidOperation(message.into())
    }

    pub fn busy(message: impl Into<String>) -> Self {
        LedgerError::Busy(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        LedgerError::StorageFailure(message.into())
    }

    /// Returns true if retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Busy(_))
    }

    /// Returns true if this error indicates the entity was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::NotFound { .. })
    }

    /// Stable machine-readable code for the failure kind
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidAmount(MoneyError::AmountOutOfRange { .. }) => "amount_out_of_range",
            LedgerError::InvalidAmount(MoneyError::BalanceLimit { .. }) => "balance_limit",
            LedgerError::InvalidAmount(_) => "invalid_amount",
            LedgerError::NotFound { .. } => "not_found",
            LedgerError::InsufficientFunds { .. } => "insufficient_funds",
            LedgerError::InvalidOperation(_) => "invalid_operation",
            LedgerError::Busy(_) => "busy",
            LedgerError::StorageFailure(_) => "storage_failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::InvalidAmountReason;
    use rust_decimal_macros::dec;

    #[test]
    fn test_codes_are_distinct_for_amount_failures() {
        let invalid = LedgerError::from(MoneyError::InvalidAmount(InvalidAmountReason::NonPositive));
        let range = LedgerError::from(MoneyError::AmountOutOfRange {
            amount: dec!(0.001),
            min: dec!(0.01),
            max: dec!(1000000.00),
        });
        assert_eq!(invalid.code(), "invalid_amount");
        assert_eq!(range.code(), "amount_out_of_range");
    }

    #[test]
    fn test_amount_message_is_verbatim() {
        let err = LedgerError::from(MoneyError::InvalidAmount(InvalidAmountReason::NonPositive));
        assert_eq!(err.to_string(), "Invalid amount: amount must be positive");
    }

    #[test]
    fn test_only_busy_is_retryable() {
        assert!(LedgerError::busy("lock timeout").is_retryable());
        assert!(!LedgerError::storage("down").is_retryable());
        assert!(LedgerError::account_not_found("bob").is_not_found());
    }
}
