//! Core Kernel - Foundational types for the branch ledger
//!
//! This crate provides the building blocks shared by the ledger engine, its
//! storage adapters and the HTTP layer:
//! - Amounts with exact two-digit decimal arithmetic
//! - The operation clock (fixed UTC offset) and time windows
//! - Typed identifiers and account references
//! - Port marker traits and health reporting

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod error;
pub mod ports;

pub use money::{Amount, AmountLimits, Delta, MoneyError, InvalidAmountReason};
pub use temporal::{Clock, BranchClock, FixedClock, TimeWindow, TemporalError};
pub use identifiers::{AccountId, EmployeeId, EntryId, OperationId, AccountRef};
pub use error::CoreError;
pub use ports::{DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth};
