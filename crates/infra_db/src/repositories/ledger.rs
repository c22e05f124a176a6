//! Ledger entry repository
//!
//! Entries are only ever inserted. Listings use keyset pagination on
//! `(occurred_at, id)` so a page can be resumed from any entry.

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use core_kernel::{AccountId, Amount, EmployeeId, EntryId, OperationId};
use domain_ledger::{EntryKind, EntryQuery, LedgerEntry, NewLedgerEntry, ReportRow, SortOrder};

use crate::error::DatabaseError;

/// Database row for the ledger_entries table
#[derive(Debug, Clone, FromRow)]
pub struct EntryRow {
    pub id: i64,
    pub account_id: i64,
    pub employee_id: Option<i64>,
    pub kind: String,
    pub amount: Decimal,
    pub occurred_at: DateTime<Utc>,
    pub utc_offset_seconds: i32,
    pub operation_id: Uuid,
}

impl TryFrom<EntryRow> for LedgerEntry {
    type Error = DatabaseError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        let kind = row.kind.parse::<EntryKind>().map_err(DatabaseError::decode)?;
        let amount = Amount::from_ledger(row.amount)
            .map_err(|e| DatabaseError::decode(format!("entry {}: {}", row.id, e)))?;
        let offset = FixedOffset::east_opt(row.utc_offset_seconds).ok_or_else(|| {
            DatabaseError::decode(format!(
                "entry {}: invalid UTC offset {}s",
                row.id, row.utc_offset_seconds
            ))
        })?;

        Ok(LedgerEntry {
            id: EntryId::new(row.id),
            account_id: AccountId::new(row.account_id),
            employee_id: row.employee_id.map(EmployeeId::new),
            kind,
            amount,
            occurred_at: row.occurred_at.with_timezone(&offset),
            operation_id: OperationId::from_uuid(row.operation_id),
        })
    }
}

/// An entry row joined with account and employee names
#[derive(Debug, Clone, FromRow)]
pub struct ReportRecord {
    #[sqlx(flatten)]
    pub entry: EntryRow,
    pub account_username: Option<String>,
    pub account_full_name: Option<String>,
    pub employee_username: Option<String>,
    pub employee_full_name: Option<String>,
}

impl TryFrom<ReportRecord> for ReportRow {
    type Error = DatabaseError;

    fn try_from(record: ReportRecord) -> Result<Self, Self::Error> {
        Ok(ReportRow {
            entry: record.entry.try_into()?,
            account_username: record.account_username,
            account_full_name: record.account_full_name,
            employee_username: record.employee_username,
            employee_full_name: record.employee_full_name,
        })
    }
}

const ENTRY_COLUMNS: &str = "e.id, e.account_id, e.employee_id, e.kind, e.amount, \
     e.occurred_at, e.utc_offset_seconds, e.operation_id";

/// Appends the window, keyset condition, ordering and limit of `query`
fn push_page(builder: &mut QueryBuilder<'_, Postgres>, query: &EntryQuery) {
    if let Some(window) = query.window {
        builder
            .push(" AND e.occurred_at >= ")
            .push_bind(window.start.with_timezone(&Utc))
            .push(" AND e.occurred_at < ")
            .push_bind(window.end.with_timezone(&Utc));
    }

    if let Some(after) = query.after {
        let comparison = match query.order {
            SortOrder::Descending => "<",
            SortOrder::Ascending => ">",
        };
        builder
            .push(format!(" AND (e.occurred_at, e.id) {comparison} ("))
            .push_bind(after.occurred_at.with_timezone(&Utc))
            .push(", ")
            .push_bind(after.id.value())
            .push(")");
    }

    builder.push(match query.order {
        SortOrder::Descending => " ORDER BY e.occurred_at DESC, e.id DESC",
        SortOrder::Ascending => " ORDER BY e.occurred_at ASC, e.id ASC",
    });

    if let Some(limit) = query.limit {
        builder.push(" LIMIT ").push_bind(i64::from(limit));
    }
}

/// Repository for the append-only ledger
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// One page of entries, optionally restricted to one account
    pub async fn page(
        &self,
        account_id: Option<i64>,
        query: &EntryQuery,
    ) -> Result<Vec<EntryRow>, DatabaseError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries e WHERE TRUE"
        ));
        if let Some(account_id) = account_id {
            builder.push(" AND e.account_id = ").push_bind(account_id);
        }
        push_page(&mut builder, query);

        let rows = builder
            .build_query_as::<EntryRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// One page of the whole ledger joined with names
    pub async fn report_page(&self, query: &EntryQuery) -> Result<Vec<ReportRecord>, DatabaseError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            r#"
            SELECT {ENTRY_COLUMNS},
                   a.username AS account_username,
                   a.full_name AS account_full_name,
                   emp.username AS employee_username,
                   emp.full_name AS employee_full_name
            FROM ledger_entries e
            LEFT JOIN accounts a ON a.id = e.account_id
            LEFT JOIN employees emp ON emp.id = e.employee_id
            WHERE TRUE
            "#
        ));
        push_page(&mut builder, query);

        let rows = builder
            .build_query_as::<ReportRecord>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Inserts an entry inside the caller's transaction
    ///
    /// The row becomes visible to other sessions only when that transaction
    /// commits.
    pub async fn insert(
        conn: &mut PgConnection,
        entry: &NewLedgerEntry,
        occurred_at: DateTime<FixedOffset>,
    ) -> Result<EntryRow, DatabaseError> {
        let row = sqlx::query_as::<_, EntryRow>(
            r#"
            INSERT INTO ledger_entries (
                account_id, employee_id, kind, amount,
                occurred_at, utc_offset_seconds, operation_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, account_id, employee_id, kind, amount,
                      occurred_at, utc_offset_seconds, operation_id
            "#,
        )
        .bind(entry.account_id.value())
        .bind(entry.employee_id.map(|id| id.value()))
        .bind(entry.kind.as_str())
        .bind(entry.amount.value())
        .bind(occurred_at.with_timezone(&Utc))
        .bind(occurred_at.offset().local_minus_utc())
        .bind(*entry.operation_id.as_uuid())
        .fetch_one(conn)
        .await?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn row(kind: &str, amount: Decimal, offset: i32) -> EntryRow {
        EntryRow {
            id: 11,
            account_id: 4,
            employee_id: None,
            kind: kind.to_string(),
            amount,
            occurred_at: Utc::now(),
            utc_offset_seconds: offset,
            operation_id: Uuid::now_v7(),
        }
    }

    #[test]
    fn test_row_converts_with_offset() {
        let entry = LedgerEntry::try_from(row("transfer_in", dec!(12.50), 7200)).unwrap();
        assert_eq!(entry.kind, EntryKind::TransferIn);
        assert_eq!(entry.amount.value(), dec!(12.50));
        assert_eq!(entry.occurred_at.offset().local_minus_utc(), 7200);
        assert_eq!(entry.employee_id, None);
    }

    #[test]
    fn test_corrupt_rows_are_rejected() {
        assert!(matches!(
            LedgerEntry::try_from(row("refund", dec!(1.00), 0)),
            Err(DatabaseError::Decode(_))
        ));
        assert!(matches!(
            LedgerEntry::try_from(row("deposit", dec!(0.00), 0)),
            Err(DatabaseError::Decode(_))
        ));
        assert!(matches!(
            LedgerEntry::try_from(row("deposit", dec!(1.00), 90_000)),
            Err(DatabaseError::Decode(_))
        ));
    }

    #[test]
    fn test_page_sql_for_descending_cursor() {
        let cursor = domain_ledger::EntryCursor {
            occurred_at: Utc::now().fixed_offset(),
            id: EntryId::new(9),
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM ledger_entries e WHERE TRUE");
        push_page(&mut builder, &EntryQuery::latest(10).after(cursor));

        let sql = builder.sql();
        assert!(sql.contains("(e.occurred_at, e.id) < ($1, $2)"));
        assert!(sql.contains("ORDER BY e.occurred_at DESC, e.id DESC"));
        assert!(sql.ends_with("LIMIT $3"));
    }

    #[test]
    fn test_page_sql_for_windowed_scan() {
        let start = Utc::now().fixed_offset();
        let window = core_kernel::TimeWindow::new(start, start + chrono::Duration::hours(1)).unwrap();
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM ledger_entries e WHERE TRUE");
        push_page(&mut builder, &EntryQuery::chronological().within(window));

        let sql = builder.sql();
        assert!(sql.contains("AND e.occurred_at >= $1 AND e.occurred_at < $2"));
        assert!(sql.ends_with("ORDER BY e.occurred_at ASC, e.id ASC"));
    }

    #[test]
    fn test_page_sql_for_ascending_scan() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM ledger_entries e WHERE TRUE");
        push_page(&mut builder, &EntryQuery::chronological());

        let sql = builder.sql();
        assert!(sql.ends_with("ORDER BY e.occurred_at ASC, e.id ASC"));
        assert!(!sql.contains("LIMIT"));
    }

    proptest! {
        #[test]
        fn test_stored_offset_and_cents_come_back_unchanged(
            offset_minutes in -(14 * 60)..=(14 * 60),
            cents in 1i64..100_000_000_000,
        ) {
            let offset = offset_minutes * 60;
            let entry = LedgerEntry::try_from(row("withdrawal", Decimal::new(cents, 2), offset)).unwrap();
            prop_assert_eq!(entry.occurred_at.offset().local_minus_utc(), offset);
            prop_assert_eq!(entry.amount.value(), Decimal::new(cents, 2));
            prop_assert_eq!(entry.amount.value().scale(), 2);
        }
    }
}
