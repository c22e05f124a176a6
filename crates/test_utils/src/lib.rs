//! Test Utilities Crate
//!
//! Shared test infrastructure, fixtures, and helpers for the branch ledger
//! test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built accounts, employees, clock and an in-memory branch
//! - `builders`: Builder patterns for accounts and employees
//! - `database`: PostgreSQL container management for integration tests
//! - `assertions`: Ledger-specific assertion helpers
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
