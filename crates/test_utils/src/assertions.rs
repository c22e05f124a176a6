//! Custom Assertions
//!
//! Assertion helpers for ledger receipts and entries with descriptive panic
//! messages.

use rust_decimal::Decimal;

use core_kernel::AccountId;
use domain_ledger::{EntryKind, LedgerEntry, LedgerError, OperationReceipt};

/// Asserts that a receipt reports `expected` as the new balance of `account`
pub fn assert_receipt_balance(receipt: &OperationReceipt, account: AccountId, expected: Decimal) {
    match receipt.balance_of(account) {
        Some(actual) => assert_eq!(
            actual, expected,
            "Balance of {} after {}: expected {}, got {}",
            account, receipt.operation_id, expected, actual
        ),
        None => panic!(
            "Receipt {} has no balance for {}",
            receipt.operation_id, account
        ),
    }
}

/// Asserts that `entries` are a matched transfer pair from `from` to `to`
///
/// One out leg and one in leg with the same amount, timestamp and operation.
pub fn assert_matched_transfer(entries: &[LedgerEntry], from: AccountId, to: AccountId) {
    assert_eq!(
        entries.len(),
        2,
        "A transfer writes exactly two entries, got {}",
        entries.len()
    );

    let out_leg = entries
        .iter()
        .find(|e| e.kind == EntryKind::TransferOut)
        .unwrap_or_else(|| panic!("No transfer_out leg in {:?}", entries));
    let in_leg = entries
        .iter()
        .find(|e| e.kind == EntryKind::TransferIn)
        .unwrap_or_else(|| panic!("No transfer_in leg in {:?}", entries));

    assert_eq!(out_leg.account_id, from, "Out leg is on the wrong account");
    assert_eq!(in_leg.account_id, to, "In leg is on the wrong account");
    assert_eq!(out_leg.amount, in_leg.amount, "Transfer legs differ in amount");
    assert_eq!(
        out_leg.occurred_at, in_leg.occurred_at,
        "Transfer legs differ in timestamp"
    );
    assert_eq!(
        out_leg.operation_id, in_leg.operation_id,
        "Transfer legs belong to different operations"
    );
}

/// Asserts that entries are in newest-first `(occurred_at, id)` order
pub fn assert_newest_first(entries: &[LedgerEntry]) {
    for pair in entries.windows(2) {
        assert!(
            pair[0].cursor() > pair[1].cursor(),
            "Entry {} should come after entry {}",
            pair[1].id,
            pair[0].id
        );
    }
}

/// Asserts that an operation failed with the given error code
pub fn assert_ledger_error<T: std::fmt::Debug>(result: Result<T, LedgerError>, code: &str) {
    match result {
        Ok(value) => panic!("Expected a {} failure, got {:?}", code, value),
        Err(e) => assert_eq!(e.code(), code, "Unexpected error: {}", e),
    }
}

/// Asserts that a balance has exactly two fractional digits and is not negative
pub fn assert_valid_balance(balance: Decimal) {
    assert!(balance >= Decimal::ZERO, "Balance {} is negative", balance);
    assert_eq!(balance.scale(), 2, "Balance {} is not at scale 2", balance);
}
