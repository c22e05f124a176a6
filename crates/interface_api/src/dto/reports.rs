//! Report DTOs

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{EmployeeId, EntryId, OperationId};
use domain_ledger::{Employee, Reconciliation, ReportRow};

use super::accounts::{encode_cursor, EntryResponse};

/// A ledger entry with the names of its account and employee
#[derive(Debug, Serialize)]
pub struct TransactionRow {
    #[serde(flatten)]
    pub entry: EntryResponse,
    pub account_username: Option<String>,
    pub account_full_name: Option<String>,
    pub employee_username: Option<String>,
    pub employee_full_name: Option<String>,
}

impl From<&ReportRow> for TransactionRow {
    fn from(row: &ReportRow) -> Self {
        Self {
            entry: EntryResponse::from(&row.entry),
            account_username: row.account_username.clone(),
            account_full_name: row.account_full_name.clone(),
            employee_username: row.employee_username.clone(),
            employee_full_name: row.employee_full_name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionReport {
    pub rows: Vec<TransactionRow>,
    pub next: Option<String>,
}

impl TransactionReport {
    pub fn new(rows: &[ReportRow], limit: u32) -> Self {
        let next = match rows.last() {
            Some(last) if rows.len() == limit as usize => Some(encode_cursor(&last.entry.cursor())),
            _ => None,
        };
        Self {
            rows: rows.iter().map(TransactionRow::from).collect(),
            next,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EmployeeResponse {
    pub id: EmployeeId,
    pub username: String,
    pub full_name: Option<String>,
    pub role: Option<String>,
}

impl From<Employee> for EmployeeResponse {
    fn from(employee: Employee) -> Self {
        Self {
            id: employee.id,
            username: employee.username,
            full_name: employee.full_name,
            role: employee.role,
        }
    }
}

/// `?from=&to=` bounds of a reconciliation, both RFC 3339
#[derive(Debug, Default, Deserialize)]
pub struct WindowParams {
    pub from: Option<DateTime<FixedOffset>>,
    pub to: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Serialize)]
pub struct UnmatchedResponse {
    pub operation_id: OperationId,
    pub entry_ids: Vec<EntryId>,
}

#[derive(Debug, Serialize)]
pub struct ReconciliationResponse {
    pub from: Option<DateTime<FixedOffset>>,
    pub to: Option<DateTime<FixedOffset>>,
    pub entry_count: usize,
    pub deposits: Decimal,
    pub withdrawals: Decimal,
    pub transfers_out: Decimal,
    pub transfers_in: Decimal,
    pub net_flow: Decimal,
    pub balanced: bool,
    pub unmatched: Vec<UnmatchedResponse>,
}

impl From<Reconciliation> for ReconciliationResponse {
    fn from(report: Reconciliation) -> Self {
        Self {
            from: report.window.map(|w| w.start),
            to: report.window.map(|w| w.end),
            entry_count: report.entry_count,
            deposits: report.totals.deposits,
            withdrawals: report.totals.withdrawals,
            transfers_out: report.totals.transfers_out,
            transfers_in: report.totals.transfers_in,
            net_flow: report.net_flow(),
            balanced: report.is_balanced(),
            unmatched: report
                .unmatched
                .into_iter()
                .map(|op| UnmatchedResponse {
                    operation_id: op.operation_id,
                    entry_ids: op.entries.iter().map(|e| e.id).collect(),
                })
                .collect(),
        }
    }
}
