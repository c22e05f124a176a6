//! Ledger Domain Ports
//!
//! Storage is reached through two traits:
//!
//! - `LedgerPort` is the long-lived handle. It serves consistent reads and
//!   opens units of work.
//! - `LedgerTransaction` is one unit of work. It holds the update locks of the
//!   accounts in its `LockSet`, stages balance changes and ledger appends, and
//!   publishes them all at `commit` or none of them at `rollback`.
//!
//! Dropping a `LedgerTransaction` without committing discards everything it
//! staged and releases its locks. An operation future that is cancelled
//! mid-way therefore leaves no trace.
//!
//! # Usage
//!
//! ```rust,ignore
//! let locks = LockSet::new([source.id, dest.id]);
//! let mut unit = port.begin(&locks, Duration::from_secs(5)).await?;
//! unit.apply_delta(source.id, amount.debit(), Decimal::ZERO).await?;
//! unit.apply_delta(dest.id, amount.credit(), Decimal::ZERO).await?;
//! unit.append(out_leg).await?;
//! unit.append(in_leg).await?;
//! let entries = unit.commit().await?;
//! ```

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;

use core_kernel::{AccountId, Delta, DomainPort, HealthCheckable};

use crate::account::{Account, Employee};
use crate::entry::{EntryQuery, LedgerEntry, NewLedgerEntry, ReportRow};
use crate::error::LedgerError;

/// The accounts a unit of work locks, in acquisition order
///
/// Identifiers are sorted ascending and deduplicated, so two units that touch
/// the same pair of accounts always acquire the locks in the same order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockSet {
    accounts: Vec<AccountId>,
}

impl LockSet {
    /// Creates a lock set from any collection of account identifiers
    pub fn new(accounts: impl IntoIterator<Item = AccountId>) -> Self {
        let mut accounts: Vec<AccountId> = accounts.into_iter().collect();
        accounts.sort();
        accounts.dedup();
        Self { accounts }
    }

    /// Accounts in acquisition order
    pub fn accounts(&self) -> &[AccountId] {
        &self.accounts
    }

    /// Returns true if `id` is covered by this set
    pub fn contains(&self, id: AccountId) -> bool {
        self.accounts.binary_search(&id).is_ok()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// Long-lived handle on ledger storage
#[async_trait]
pub trait LedgerPort: DomainPort + HealthCheckable {
    /// Opens a unit of work holding the update locks of `lock_set`
    ///
    /// Waits at most `lock_timeout` for all locks together.
    ///
    /// # Errors
    ///
    /// - `LedgerError::Busy` if the locks cannot be acquired in time
    /// - `LedgerError::NotFound` if an account in the set does not exist
    async fn begin(
        &self,
        lock_set: &LockSet,
        lock_timeout: Duration,
    ) -> Result<Box<dyn LedgerTransaction>, LedgerError>;

    /// Reads an account by identifier
    async fn get(&self, id: AccountId) -> Result<Account, LedgerError>;

    /// Reads an account by its unique username
    async fn get_by_name(&self, username: &str) -> Result<Account, LedgerError>;

    /// All accounts ordered by identifier
    async fn accounts(&self) -> Result<Vec<Account>, LedgerError>;

    /// All employees ordered by identifier
    async fn employees(&self) -> Result<Vec<Employee>, LedgerError>;

    /// One page of an account's entries
    async fn entries_for(
        &self,
        account_id: AccountId,
        query: &EntryQuery,
    ) -> Result<Vec<LedgerEntry>, LedgerError>;

    /// One page of the whole ledger
    async fn all_entries(&self, query: &EntryQuery) -> Result<Vec<LedgerEntry>, LedgerError>;

    /// One page of the whole ledger joined with account and employee names
    async fn report(&self, query: &EntryQuery) -> Result<Vec<ReportRow>, LedgerError>;
}

/// One all-or-nothing unit of work
#[async_trait]
pub trait LedgerTransaction: Send {
    /// The locked account as this unit currently sees it
    async fn account(&mut self, id: AccountId) -> Result<Account, LedgerError>;

    /// Applies a balance change to a locked account
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `LedgerError::InsufficientFunds` if the result would be below `min_balance`
    /// - `LedgerError::InvalidOperation` if `id` is not in the unit's lock set
    async fn apply_delta(
        &mut self,
        id: AccountId,
        delta: Delta,
        min_balance: Decimal,
    ) -> Result<Decimal, LedgerError>;

    /// Stages a ledger entry
    async fn append(&mut self, entry: NewLedgerEntry) -> Result<(), LedgerError>;

    /// Publishes every staged change and returns the committed entries in
    /// append order
    async fn commit(self: Box<Self>) -> Result<Vec<LedgerEntry>, LedgerError>;

    /// Discards every staged change and releases the locks
    async fn rollback(self: Box<Self>) -> Result<(), LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_set_sorts_and_dedups() {
        let set = LockSet::new([AccountId::new(9), AccountId::new(2), AccountId::new(9)]);
        assert_eq!(set.accounts(), &[AccountId::new(2), AccountId::new(9)]);
        assert_eq!(set.len(), 2);
        assert!(set.contains(AccountId::new(9)));
        assert!(!set.contains(AccountId::new(3)));
    }

    #[test]
    fn test_opposite_directions_share_order() {
        let forward = LockSet::new([AccountId::new(1), AccountId::new(2)]);
        let backward = LockSet::new([AccountId::new(2), AccountId::new(1)]);
        assert_eq!(forward, backward);
    }
}
