//! Comprehensive unit tests for the Money module
//!
//! Tests cover parsing, validation reasons, range limits, delta
//! arithmetic and the absence of rounding.

use core_kernel::{Amount, AmountLimits, Delta, InvalidAmountReason, MoneyError};
use core_kernel::money::{normalize_balance, MAX_BALANCE};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn limits() -> AmountLimits {
    AmountLimits::default()
}

mod parsing {
    use super::*;

    #[test]
    fn test_parse_plain_amount() {
        let amount = Amount::parse("50.00", &limits()).unwrap();
        assert_eq!(amount.value(), dec!(50.00));
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let amount = Amount::parse("  12.5\n", &limits()).unwrap();
        assert_eq!(amount.value(), dec!(12.50));
        assert_eq!(amount.to_string(), "12.50");
    }

    #[test]
    fn test_parse_accepts_trailing_zeros() {
        let amount = Amount::parse("10.500", &limits()).unwrap();
        assert_eq!(amount.value(), dec!(10.50));
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(matches!(
            Amount::parse("   ", &limits()),
            Err(MoneyError::InvalidAmount(InvalidAmountReason::Malformed(_)))
        ));
    }

    #[test]
    fn test_parse_rejects_non_finite_text() {
        for input in ["NaN", "inf", "-inf", "Infinity"] {
            assert!(
                matches!(
                    Amount::parse(input, &limits()),
                    Err(MoneyError::InvalidAmount(InvalidAmountReason::Malformed(_)))
                ),
                "{} should be malformed",
                input
            );
        }
    }

    #[test]
    fn test_parse_rejects_letters() {
        let err = Amount::parse("ten", &limits()).unwrap_err();
        assert!(err.to_string().contains("'ten' is not a valid number"));
    }

    #[test]
    fn test_parse_rejects_sub_cent_precision() {
        assert_eq!(
            Amount::parse("0.015", &limits()),
            Err(MoneyError::InvalidAmount(InvalidAmountReason::TooPrecise { scale: 3 }))
        );
    }
}

mod validation {
    use super::*;

    #[test]
    fn test_zero_is_non_positive() {
        assert_eq!(
            Amount::parse("0.00", &limits()),
            Err(MoneyError::InvalidAmount(InvalidAmountReason::NonPositive))
        );
    }

    #[test]
    fn test_negative_is_non_positive() {
        assert_eq!(
            Amount::parse("-5", &limits()),
            Err(MoneyError::InvalidAmount(InvalidAmountReason::NonPositive))
        );
    }

    #[test]
    fn test_minimum_is_inclusive() {
        assert_eq!(Amount::parse("0.01", &limits()).unwrap().value(), dec!(0.01));
    }

    #[test]
    fn test_maximum_is_inclusive() {
        assert_eq!(
            Amount::parse("1000000.00", &limits()).unwrap().value(),
            dec!(1000000.00)
        );
    }

    #[test]
    fn test_above_maximum_is_out_of_range() {
        let err = Amount::parse("1000000.01", &limits()).unwrap_err();
        assert!(matches!(err, MoneyError::AmountOutOfRange { .. }));
        assert!(!err.is_below_minimum());
        assert_eq!(err.to_string(), "Amount cannot exceed 1000000.00");
    }

    #[test]
    fn test_below_custom_minimum_is_out_of_range() {
        let custom = AmountLimits::new(dec!(1.00), dec!(500.00));
        let err = Amount::parse("0.50", &custom).unwrap_err();
        assert!(err.is_below_minimum());
        assert_eq!(err.to_string(), "Amount must be at least 1.00");
    }

    #[test]
    fn test_sub_cent_below_minimum_is_out_of_range() {
        let err = Amount::parse("0.001", &limits()).unwrap_err();
        assert!(err.is_below_minimum());
        assert_eq!(err.to_string(), "Amount must be at least 0.01");

        let err = Amount::parse("1000000.001", &limits()).unwrap_err();
        assert!(matches!(err, MoneyError::AmountOutOfRange { .. }));
        assert!(!err.is_below_minimum());
    }

    #[test]
    fn test_distinct_reasons_have_distinct_messages() {
        let messages: Vec<String> = ["abc", "0", "0.001", "2000000"]
            .iter()
            .map(|input| Amount::parse(input, &limits()).unwrap_err().to_string())
            .collect();

        for (i, a) in messages.iter().enumerate() {
            for b in messages.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_from_ledger_skips_range_check() {
        let amount = Amount::from_ledger(dec!(5000000.00)).unwrap();
        assert_eq!(amount.value(), dec!(5000000.00));
    }
}

mod deltas {
    use super::*;

    #[test]
    fn test_signed_values() {
        let amount = Amount::parse("20.00", &limits()).unwrap();
        assert_eq!(amount.credit().signed(), dec!(20.00));
        assert_eq!(amount.debit().signed(), dec!(-20.00));
    }

    #[test]
    fn test_debit_may_produce_negative_result() {
        // The floor is enforced by the store, not by the arithmetic
        let amount = Amount::parse("20.00", &limits()).unwrap();
        assert_eq!(amount.debit().apply(dec!(10.00)).unwrap(), dec!(-10.00));
    }

    #[test]
    fn test_overflow_is_reported() {
        let amount = Amount::parse("1.00", &limits()).unwrap();
        assert_eq!(Delta::Credit(amount).apply(Decimal::MAX), Err(MoneyError::Overflow));
    }

    #[test]
    fn test_credit_past_balance_ceiling_is_rejected() {
        let cent = Amount::parse("0.01", &limits()).unwrap();
        assert_eq!(cent.credit().apply(MAX_BALANCE - dec!(0.01)).unwrap(), MAX_BALANCE);
        assert_eq!(
            cent.credit().apply(MAX_BALANCE),
            Err(MoneyError::BalanceLimit {
                balance: MAX_BALANCE + dec!(0.01),
                max: MAX_BALANCE,
            })
        );
        assert_eq!(cent.debit().apply(MAX_BALANCE).unwrap(), MAX_BALANCE - dec!(0.01));
    }

    #[test]
    fn test_display() {
        let amount = Amount::parse("3.5", &limits()).unwrap();
        assert_eq!(amount.credit().to_string(), "+3.50");
        assert_eq!(amount.debit().to_string(), "-3.50");
    }

    #[test]
    fn test_no_drift_over_repeated_cents() {
        let cent = Amount::parse("0.01", &limits()).unwrap();
        let mut balance = dec!(0.00);
        for _ in 0..10_000 {
            balance = cent.credit().apply(balance).unwrap();
        }
        assert_eq!(balance, dec!(100.00));
        for _ in 0..10_000 {
            balance = cent.debit().apply(balance).unwrap();
        }
        assert_eq!(balance, Decimal::ZERO);
    }
}

mod balances {
    use super::*;

    #[test]
    fn test_normalize_balance_pads_scale() {
        let balance = normalize_balance(dec!(5)).unwrap();
        assert_eq!(balance.scale(), 2);
        assert_eq!(balance, dec!(5.00));
    }

    #[test]
    fn test_normalize_balance_rejects_sub_cent() {
        assert!(normalize_balance(dec!(5.001)).is_err());
    }

    #[test]
    fn test_normalize_balance_rejects_above_ceiling() {
        assert_eq!(normalize_balance(MAX_BALANCE), Ok(MAX_BALANCE));
        assert!(matches!(
            normalize_balance(dec!(1000000000000)),
            Err(MoneyError::BalanceLimit { .. })
        ));
    }
}
