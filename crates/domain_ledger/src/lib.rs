//! Ledger Domain - Balances, transfers and the transaction ledger
//!
//! This crate holds the branch ledger's business rules. Customers own a single
//! balance; employees deposit, withdraw and transfer on their behalf, and
//! customers may transfer from their own account. Every balance change is
//! recorded as an immutable ledger entry.
//!
//! # Guarantees
//!
//! - Balances never go below zero
//! - An operation is applied entirely or not at all
//! - Each transfer writes exactly one `TransferOut` and one `TransferIn` entry
//!   sharing an operation id and a timestamp
//! - Operations on the same account are serialized; transfers lock both
//!   accounts in ascending id order with a bounded wait
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_ledger::{InMemoryLedger, TransferEngine, LedgerQueries};
//!
//! let ledger = Arc::new(InMemoryLedger::default());
//! let engine = TransferEngine::new(ledger.clone(), Arc::new(BranchClock::default()));
//!
//! let receipt = engine
//!     .transfer(&AccountRef::parse("alice"), &AccountRef::parse("bob"), "30.00", None)
//!     .await?;
//!
//! let recent = LedgerQueries::new(ledger).recent(&AccountRef::parse("alice"), 10).await?;
//! ```

pub mod account;
pub mod entry;
pub mod error;
pub mod ports;
pub mod memory;
pub mod engine;
pub mod query;
pub mod reconciliation;

pub use account::{Account, Employee};
pub use entry::{EntryCursor, EntryKind, EntryQuery, LedgerEntry, NewLedgerEntry, ReportRow, SortOrder};
pub use error::LedgerError;
pub use ports::{LedgerPort, LedgerTransaction, LockSet};
pub use memory::InMemoryLedger;
pub use engine::{BalanceChange, EngineConfig, OperationKind, OperationReceipt, TransferEngine};
pub use query::{resolve_account, CustomerView, LedgerQueries, DEFAULT_RECENT_LIMIT};
pub use reconciliation::{KindTotals, Reconciliation, UnmatchedOperation};
