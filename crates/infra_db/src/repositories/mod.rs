//! Repository implementations for ledger storage
//!
//! Repositories encapsulate SQL queries and map between database rows and
//! domain types. Methods that must run inside a unit of work take a
//! `&mut PgConnection` instead of using the pool.

pub mod accounts;
pub mod ledger;

pub use accounts::{AccountRepository, AccountRow, EmployeeRow};
pub use ledger::{EntryRow, LedgerRepository, ReportRecord};
