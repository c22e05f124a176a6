//! Ledger reconciliation
//!
//! Every transfer writes exactly two entries sharing one operation id: a
//! `TransferOut` on the source and a `TransferIn` on the destination, with
//! the same amount and the same timestamp. Reconciliation checks that this
//! holds across a set of entries and totals each kind of movement.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use core_kernel::{OperationId, TimeWindow};

use crate::entry::{EntryKind, LedgerEntry};

/// Sum of entry amounts per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct KindTotals {
    pub deposits: Decimal,
    pub withdrawals: Decimal,
    pub transfers_out: Decimal,
    pub transfers_in: Decimal,
}

impl KindTotals {
    fn add(&mut self, entry: &LedgerEntry) {
        let amount = entry.amount.value();
        match entry.kind {
            EntryKind::Deposit => self.deposits += amount,
            EntryKind::Withdrawal => self.withdrawals += amount,
            EntryKind::TransferOut => self.transfers_out += amount,
            EntryKind::TransferIn => self.transfers_in += amount,
        }
    }
}

/// Transfer entries of one operation that do not form a matched pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedOperation {
    pub operation_id: OperationId,
    pub entries: Vec<LedgerEntry>,
}

/// Result of checking a set of ledger entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Window the entries were restricted to, if any
    pub window: Option<TimeWindow>,
    pub totals: KindTotals,
    pub entry_count: usize,
    /// Ordered by operation id
    pub unmatched: Vec<UnmatchedOperation>,
}

impl Reconciliation {
    /// Checks `entries`, keeping only those inside `window` when one is given
    pub fn from_entries(entries: &[LedgerEntry], window: Option<TimeWindow>) -> Self {
        let mut totals = KindTotals::default();
        let mut entry_count = 0;
        let mut transfers: BTreeMap<OperationId, Vec<&LedgerEntry>> = BTreeMap::new();

        let in_window = entries
            .iter()
            .filter(|e| window.map_or(true, |w| w.contains(&e.occurred_at)));

        for entry in in_window {
            entry_count += 1;
            totals.add(entry);
            if entry.kind.is_transfer() {
                transfers.entry(entry.operation_id).or_default().push(entry);
            }
        }

        let unmatched = transfers
            .into_iter()
            .filter(|(_, legs)| !is_matched_pair(legs))
            .map(|(operation_id, legs)| UnmatchedOperation {
                operation_id,
                entries: legs.into_iter().cloned().collect(),
            })
            .collect();

        Self {
            window,
            totals,
            entry_count,
            unmatched,
        }
    }

    /// True when transfer totals agree and every transfer leg has its pair
    pub fn is_balanced(&self) -> bool {
        self.totals.transfers_out == self.totals.transfers_in && self.unmatched.is_empty()
    }

    /// Net change of the sum of all balances: deposits minus withdrawals
    pub fn net_flow(&self) -> Decimal {
        self.totals.deposits - self.totals.withdrawals
    }
}

fn is_matched_pair(legs: &[&LedgerEntry]) -> bool {
    let [a, b] = legs else { return false };
    let (out, inbound) = match (a.kind, b.kind) {
        (EntryKind::TransferOut, EntryKind::TransferIn) => (a, b),
        (EntryKind::TransferIn, EntryKind::TransferOut) => (b, a),
        _ => return false,
    };
    out.amount == inbound.amount
        && out.occurred_at == inbound.occurred_at
        && out.account_id != inbound.account_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, FixedOffset, TimeZone};
    use core_kernel::{AccountId, Amount, AmountLimits, EntryId};
    use rust_decimal_macros::dec;

    fn at(hour: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(7200)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 1, hour, 0, 0)
            .unwrap()
    }

    fn entry(id: i64, account: i64, kind: EntryKind, amount: &str, hour: u32, op: OperationId) -> LedgerEntry {
        LedgerEntry {
            id: EntryId::new(id),
            account_id: AccountId::new(account),
            employee_id: None,
            kind,
            amount: Amount::parse(amount, &AmountLimits::default()).unwrap(),
            occurred_at: at(hour),
            operation_id: op,
        }
    }

    fn transfer(first_id: i64, from: i64, to: i64, amount: &str, hour: u32) -> Vec<LedgerEntry> {
        let op = OperationId::new();
        vec![
            entry(first_id, from, EntryKind::TransferOut, amount, hour, op),
            entry(first_id + 1, to, EntryKind::TransferIn, amount, hour, op),
        ]
    }

    #[test]
    fn test_matched_transfers_balance() {
        let mut entries = transfer(1, 1, 2, "30.00", 9);
        entries.extend(transfer(3, 2, 1, "5.00", 10));
        entries.push(entry(5, 1, EntryKind::Deposit, "100.00", 11, OperationId::new()));

        let report = Reconciliation::from_entries(&entries, None);
        assert!(report.is_balanced());
        assert_eq!(report.totals.transfers_out, dec!(35.00));
        assert_eq!(report.totals.transfers_in, dec!(35.00));
        assert_eq!(report.net_flow(), dec!(100.00));
        assert_eq!(report.entry_count, 5);
    }

    #[test]
    fn test_orphan_leg_is_unmatched() {
        let mut entries = transfer(1, 1, 2, "30.00", 9);
        entries.pop();

        let report = Reconciliation::from_entries(&entries, None);
        assert!(!report.is_balanced());
        assert_eq!(report.unmatched.len(), 1);
        assert_eq!(report.unmatched[0].entries.len(), 1);
    }

    #[test]
    fn test_amount_mismatch_is_unmatched() {
        let op = OperationId::new();
        let entries = vec![
            entry(1, 1, EntryKind::TransferOut, "30.00", 9, op),
            entry(2, 2, EntryKind::TransferIn, "29.99", 9, op),
        ];

        let report = Reconciliation::from_entries(&entries, None);
        assert_eq!(report.unmatched.len(), 1);
        assert!(!report.is_balanced());
    }

    #[test]
    fn test_window_filters_entries() {
        let mut entries = transfer(1, 1, 2, "30.00", 9);
        entries.push(entry(3, 1, EntryKind::Withdrawal, "10.00", 15, OperationId::new()));

        let window = TimeWindow::new(at(12), at(18)).unwrap();
        let report = Reconciliation::from_entries(&entries, Some(window));
        assert_eq!(report.entry_count, 1);
        assert_eq!(report.totals.withdrawals, dec!(10.00));
        assert_eq!(report.totals.transfers_out, Decimal::ZERO);
        assert!(report.is_balanced());
    }
}
