//! Ledger entries and the queries that read them
//!
//! Entries are immutable once committed. Direction lives in `EntryKind`;
//! `amount` is always positive.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{AccountId, Amount, EmployeeId, EntryId, OperationId, TimeWindow};

/// What a ledger entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Deposit,
    Withdrawal,
    TransferOut,
    TransferIn,
}

impl EntryKind {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Deposit => "deposit",
            EntryKind::Withdrawal => "withdrawal",
            EntryKind::TransferOut => "transfer_out",
            EntryKind::TransferIn => "transfer_in",
        }
    }

    /// Human-readable label for statements and reports
    pub fn label(&self) -> &'static str {
        match self {
            EntryKind::Deposit => "Deposit",
            EntryKind::Withdrawal => "Withdrawal",
            EntryKind::TransferOut => "Transfer Out",
            EntryKind::TransferIn => "Transfer In",
        }
    }

    /// Returns true if the entry increased the account's balance
    pub fn is_credit(&self) -> bool {
        matches!(self, EntryKind::Deposit | EntryKind::TransferIn)
    }

    /// Returns true for either leg of a transfer
    pub fn is_transfer(&self) -> bool {
        matches!(self, EntryKind::TransferOut | EntryKind::TransferIn)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(EntryKind::Deposit),
            "withdrawal" => Ok(EntryKind::Withdrawal),
            "transfer_out" => Ok(EntryKind::TransferOut),
            "transfer_in" => Ok(EntryKind::TransferIn),
            other => Err(format!("Unknown entry kind: {}", other)),
        }
    }
}

/// A committed ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    /// Assigned at commit, increasing
    pub id: EntryId,
    /// The account whose balance changed
    pub account_id: AccountId,
    /// Acting employee, `None` for self-service
    pub employee_id: Option<EmployeeId>,
    pub kind: EntryKind,
    /// Always positive
    pub amount: Amount,
    /// Operation time in the branch offset
    pub occurred_at: DateTime<FixedOffset>,
    /// Shared by all entries of one operation unit
    pub operation_id: OperationId,
}

impl LedgerEntry {
    /// Position of this entry in the ledger ordering
    pub fn cursor(&self) -> EntryCursor {
        EntryCursor {
            occurred_at: self.occurred_at,
            id: self.id,
        }
    }
}

/// An entry staged by the engine, before storage assigns its identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub account_id: AccountId,
    pub employee_id: Option<EmployeeId>,
    pub kind: EntryKind,
    pub amount: Amount,
    /// Filled in by the store when absent
    pub occurred_at: Option<DateTime<FixedOffset>>,
    pub operation_id: OperationId,
}

/// Keyset position in the `(occurred_at, id)` ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryCursor {
    pub occurred_at: DateTime<FixedOffset>,
    pub id: EntryId,
}

/// Ordering of entry listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Newest first
    #[default]
    Descending,
    /// Oldest first
    Ascending,
}

/// Parameters for reading a page of entries
///
/// Pages are ordered by `(occurred_at, id)`. Passing the cursor of the last
/// entry of one page yields the next page; a listing can be restarted from
/// any cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryQuery {
    /// Maximum number of entries, `None` for all
    pub limit: Option<u32>,
    /// Continue strictly after this position in `order`
    pub after: Option<EntryCursor>,
    pub order: SortOrder,
    /// Only entries that occurred inside this window
    pub window: Option<TimeWindow>,
}

impl EntryQuery {
    /// Newest `limit` entries
    pub fn latest(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Default::default()
        }
    }

    /// Every entry, newest first
    pub fn all() -> Self {
        Self::default()
    }

    /// Every entry, oldest first
    pub fn chronological() -> Self {
        Self {
            order: SortOrder::Ascending,
            ..Default::default()
        }
    }

    /// Continues after `cursor`
    pub fn after(mut self, cursor: EntryCursor) -> Self {
        self.after = Some(cursor);
        self
    }

    /// Restricts the listing to `window`
    pub fn within(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// Returns true if an entry at `cursor` is inside the window and
    /// belongs after the query's cursor
    pub fn admits(&self, cursor: &EntryCursor) -> bool {
        if let Some(window) = &self.window {
            if !window.contains(&cursor.occurred_at) {
                return false;
            }
        }
        match (&self.after, self.order) {
            (None, _) => true,
            (Some(after), SortOrder::Descending) => cursor < after,
            (Some(after), SortOrder::Ascending) => cursor > after,
        }
    }
}

/// A ledger entry joined with the names a report needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub entry: LedgerEntry,
    pub account_username: Option<String>,
    pub account_full_name: Option<String>,
    pub employee_username: Option<String>,
    pub employee_full_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cursor(hour: u32, id: i64) -> EntryCursor {
        let offset = FixedOffset::east_opt(7200).unwrap();
        EntryCursor {
            occurred_at: offset.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
            id: EntryId::new(id),
        }
    }

    #[test]
    fn test_kind_round_trips_through_storage_name() {
        for kind in [
            EntryKind::Deposit,
            EntryKind::Withdrawal,
            EntryKind::TransferOut,
            EntryKind::TransferIn,
        ] {
            assert_eq!(kind.as_str().parse::<EntryKind>().unwrap(), kind);
        }
        assert!("Transfer Out".parse::<EntryKind>().is_err());
    }

    #[test]
    fn test_cursor_orders_by_time_then_id() {
        assert!(cursor(9, 5) < cursor(10, 1));
        assert!(cursor(10, 1) < cursor(10, 2));
    }

    #[test]
    fn test_query_admits_after_cursor() {
        let descending = EntryQuery::all().after(cursor(10, 2));
        assert!(descending.admits(&cursor(10, 1)));
        assert!(!descending.admits(&cursor(10, 2)));

        let ascending = EntryQuery::chronological().after(cursor(10, 2));
        assert!(ascending.admits(&cursor(11, 1)));
        assert!(!ascending.admits(&cursor(9, 9)));
    }

    #[test]
    fn test_query_admits_only_inside_window() {
        let window = TimeWindow::new(cursor(10, 0).occurred_at, cursor(12, 0).occurred_at).unwrap();
        let query = EntryQuery::chronological().within(window);
        assert!(query.admits(&cursor(10, 1)));
        assert!(query.admits(&cursor(11, 7)));
        assert!(!query.admits(&cursor(12, 1)));
        assert!(!query.admits(&cursor(9, 3)));
    }
}
