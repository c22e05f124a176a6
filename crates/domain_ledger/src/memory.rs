//! In-memory ledger store
//!
//! A complete `LedgerPort` implementation kept in process memory. It backs the
//! engine's tests and local development and follows the same locking rules as
//! the PostgreSQL adapter:
//!
//! - every account has its own `tokio::sync::Mutex`, taken in `LockSet` order
//!   with one deadline for the whole set;
//! - a unit stages its balance changes and entries privately;
//! - `commit` publishes them under a single write guard of the shared state,
//!   with no await point between the individual writes, so readers see either
//!   all of an operation or none of it.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, instrument, warn};

use core_kernel::money::normalize_balance;
use core_kernel::{
    AccountId, BranchClock, Clock, Delta, DomainPort, EmployeeId, EntryId, HealthCheckResult,
    HealthCheckable,
};

use crate::account::{Account, Employee};
use crate::entry::{EntryQuery, LedgerEntry, NewLedgerEntry, ReportRow};
use crate::error::LedgerError;
use crate::ports::{LedgerPort, LedgerTransaction, LockSet};

#[derive(Debug, Default)]
struct LedgerState {
    accounts: BTreeMap<AccountId, Account>,
    employees: BTreeMap<EmployeeId, Employee>,
    locks: HashMap<AccountId, Arc<Mutex<()>>>,
    entries: Vec<LedgerEntry>,
    next_entry_id: i64,
}

impl LedgerState {
    fn account_by_name(&self, username: &str) -> Option<&Account> {
        self.accounts.values().find(|a| a.username == username)
    }

    fn page<'a>(
        &'a self,
        query: &EntryQuery,
        filter: impl Fn(&LedgerEntry) -> bool,
    ) -> Vec<&'a LedgerEntry> {
        let mut matching: Vec<&LedgerEntry> = self
            .entries
            .iter()
            .filter(|e| filter(e) && query.admits(&e.cursor()))
            .collect();

        matching.sort_by_key(|e| e.cursor());
        if query.order == crate::entry::SortOrder::Descending {
            matching.reverse();
        }
        if let Some(limit) = query.limit {
            matching.truncate(limit as usize);
        }
        matching
    }
}

/// Process-local `LedgerPort`
#[derive(Clone)]
pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryLedger {
    /// Creates an empty store stamping entries with `clock` when the caller
    /// supplies no timestamp
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(RwLock::new(LedgerState {
                next_entry_id: 1,
                ..Default::default()
            })),
            clock,
        }
    }

    /// Loads a provisioned account
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidOperation` for a duplicate id or username,
    /// a negative balance, or a balance with sub-cent digits
    pub async fn insert_account(&self, mut account: Account) -> Result<(), LedgerError> {
        account.balance = normalize_balance(account.balance)
            .map_err(|e| LedgerError::invalid_operation(format!("Invalid opening balance: {}", e)))?;
        if account.balance < Decimal::ZERO {
            return Err(LedgerError::invalid_operation("Opening balance cannot be negative"));
        }

        let mut state = self.state.write().await;
        if state.accounts.contains_key(&account.id) {
            return Err(LedgerError::invalid_operation(format!("{} already exists", account.id)));
        }
        if state.account_by_name(&account.username).is_some() {
            return Err(LedgerError::invalid_operation(format!(
                "Username '{}' already exists",
                account.username
            )));
        }

        state.locks.insert(account.id, Arc::new(Mutex::new(())));
        state.accounts.insert(account.id, account);
        Ok(())
    }

    /// Loads a provisioned employee
    pub async fn insert_employee(&self, employee: Employee) -> Result<(), LedgerError> {
        let mut state = self.state.write().await;
        if state.employees.contains_key(&employee.id) {
            return Err(LedgerError::invalid_operation(format!("{} already exists", employee.id)));
        }
        state.employees.insert(employee.id, employee);
        Ok(())
    }

    /// Number of committed entries
    pub async fn entry_count(&self) -> usize {
        self.state.read().await.entries.len()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(Arc::new(BranchClock::default()))
    }
}

impl std::fmt::Debug for InMemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLedger").finish_non_exhaustive()
    }
}

impl DomainPort for InMemoryLedger {}

#[async_trait]
impl HealthCheckable for InMemoryLedger {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult::healthy("memory-ledger", 0)
    }
}

#[async_trait]
impl LedgerPort for InMemoryLedger {
    #[instrument(skip(self, lock_set), fields(accounts = ?lock_set.accounts()))]
    async fn begin(
        &self,
        lock_set: &LockSet,
        lock_timeout: Duration,
    ) -> Result<Box<dyn LedgerTransaction>, LedgerError> {
        let locks: Vec<(AccountId, Arc<Mutex<()>>)> = {
            let state = self.state.read().await;
            lock_set
                .accounts()
                .iter()
                .map(|id| {
                    state
                        .locks
                        .get(id)
                        .cloned()
                        .map(|lock| (*id, lock))
                        .ok_or_else(|| LedgerError::account_not_found(id))
                })
                .collect::<Result<_, _>>()?
        };

        let deadline = Instant::now() + lock_timeout;
        let mut guards = Vec::with_capacity(locks.len());
        for (id, lock) in locks {
            match timeout_at(deadline, lock.lock_owned()).await {
                Ok(guard) => guards.push(guard),
                Err(_) => {
                    warn!(account_id = %id, "Timed out waiting for account lock");
                    return Err(LedgerError::busy(format!(
                        "timed out after {}ms waiting for {}",
                        lock_timeout.as_millis(),
                        id
                    )));
                }
            }
        }

        // Balances cannot move while we hold the locks, so this snapshot stays current
        let staged = {
            let state = self.state.read().await;
            lock_set
                .accounts()
                .iter()
                .filter_map(|id| state.accounts.get(id).map(|a| (*id, a.clone())))
                .collect()
        };

        debug!("Unit of work opened");
        Ok(Box::new(MemoryTransaction {
            state: Arc::clone(&self.state),
            clock: Arc::clone(&self.clock),
            _guards: guards,
            staged,
            pending: Vec::new(),
        }))
    }

    async fn get(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.state
            .read()
            .await
            .accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::account_not_found(id))
    }

    async fn get_by_name(&self, username: &str) -> Result<Account, LedgerError> {
        self.state
            .read()
            .await
            .account_by_name(username)
            .cloned()
            .ok_or_else(|| LedgerError::account_not_found(username))
    }

    async fn accounts(&self) -> Result<Vec<Account>, LedgerError> {
        Ok(self.state.read().await.accounts.values().cloned().collect())
    }

    async fn employees(&self) -> Result<Vec<Employee>, LedgerError> {
        Ok(self.state.read().await.employees.values().cloned().collect())
    }

    async fn entries_for(
        &self,
        account_id: AccountId,
        query: &EntryQuery,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let state = self.state.read().await;
        if !state.accounts.contains_key(&account_id) {
            return Err(LedgerError::account_not_found(account_id));
        }
        Ok(state
            .page(query, |e| e.account_id == account_id)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn all_entries(&self, query: &EntryQuery) -> Result<Vec<LedgerEntry>, LedgerError> {
        let state = self.state.read().await;
        Ok(state.page(query, |_| true).into_iter().cloned().collect())
    }

    async fn report(&self, query: &EntryQuery) -> Result<Vec<ReportRow>, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .page(query, |_| true)
            .into_iter()
            .map(|entry| {
                let account = state.accounts.get(&entry.account_id);
                let employee = entry.employee_id.and_then(|id| state.employees.get(&id));
                ReportRow {
                    entry: entry.clone(),
                    account_username: account.map(|a| a.username.clone()),
                    account_full_name: account.and_then(|a| a.full_name.clone()),
                    employee_username: employee.map(|e| e.username.clone()),
                    employee_full_name: employee.and_then(|e| e.full_name.clone()),
                }
            })
            .collect())
    }
}

/// A unit of work against `InMemoryLedger`
struct MemoryTransaction {
    state: Arc<RwLock<LedgerState>>,
    clock: Arc<dyn Clock>,
    _guards: Vec<OwnedMutexGuard<()>>,
    staged: BTreeMap<AccountId, Account>,
    pending: Vec<NewLedgerEntry>,
}

impl MemoryTransaction {
    fn locked(&mut self, id: AccountId) -> Result<&mut Account, LedgerError> {
        self.staged
            .get_mut(&id)
            .ok_or_else(|| LedgerError::invalid_operation(format!("{} is not locked by this unit", id)))
    }
}

#[async_trait]
impl LedgerTransaction for MemoryTransaction {
    async fn account(&mut self, id: AccountId) -> Result<Account, LedgerError> {
        self.locked(id).map(|a| a.clone())
    }

    async fn apply_delta(
        &mut self,
        id: AccountId,
        delta: Delta,
        min_balance: Decimal,
    ) -> Result<Decimal, LedgerError> {
        let account = self.locked(id)?;
        let new_balance = delta.apply(account.balance)?;
        if new_balance < min_balance {
            return Err(LedgerError::InsufficientFunds {
                account_id: id,
                balance: account.balance,
                requested: delta.amount().value(),
            });
        }
        account.balance = new_balance;
        Ok(new_balance)
    }

    async fn append(&mut self, entry: NewLedgerEntry) -> Result<(), LedgerError> {
        if !self.staged.contains_key(&entry.account_id) {
            return Err(LedgerError::invalid_operation(format!(
                "{} is not locked by this unit",
                entry.account_id
            )));
        }
        self.pending.push(entry);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<Vec<LedgerEntry>, LedgerError> {
        let this = *self;
        let mut state = this.state.write().await;

        // No await below this point: the whole unit becomes visible at once
        for (id, account) in this.staged {
            if let Some(stored) = state.accounts.get_mut(&id) {
                stored.balance = account.balance;
            }
        }

        let mut committed = Vec::with_capacity(this.pending.len());
        for new_entry in this.pending {
            let entry = LedgerEntry {
                id: EntryId::new(state.next_entry_id),
                account_id: new_entry.account_id,
                employee_id: new_entry.employee_id,
                kind: new_entry.kind,
                amount: new_entry.amount,
                occurred_at: new_entry.occurred_at.unwrap_or_else(|| this.clock.now()),
                operation_id: new_entry.operation_id,
            };
            state.next_entry_id += 1;
            state.entries.push(entry.clone());
            committed.push(entry);
        }

        Ok(committed)
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        debug!(staged_entries = self.pending.len(), "Unit of work rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{Amount, AmountLimits, OperationId};
    use rust_decimal_macros::dec;

    use crate::entry::EntryKind;

    async fn ledger_with(accounts: &[(i64, &str, Decimal)]) -> InMemoryLedger {
        let ledger = InMemoryLedger::default();
        for (id, name, balance) in accounts {
            ledger
                .insert_account(Account::new(AccountId::new(*id), *name, *balance))
                .await
                .unwrap();
        }
        ledger
    }

    fn amount(text: &str) -> Amount {
        Amount::parse(text, &AmountLimits::default()).unwrap()
    }

    #[tokio::test]
    async fn test_rollback_discards_staged_changes() {
        let ledger = ledger_with(&[(1, "alice", dec!(100.00))]).await;
        let locks = LockSet::new([AccountId::new(1)]);

        let mut unit = ledger.begin(&locks, Duration::from_secs(1)).await.unwrap();
        let balance = unit
            .apply_delta(AccountId::new(1), amount("40.00").debit(), Decimal::ZERO)
            .await
            .unwrap();
        assert_eq!(balance, dec!(60.00));

        // Not visible before commit
        assert_eq!(ledger.get(AccountId::new(1)).await.unwrap().balance, dec!(100.00));

        unit.rollback().await.unwrap();
        assert_eq!(ledger.get(AccountId::new(1)).await.unwrap().balance, dec!(100.00));
        assert_eq!(ledger.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_commit_assigns_increasing_ids() {
        let ledger = ledger_with(&[(1, "alice", dec!(0.00))]).await;
        let locks = LockSet::new([AccountId::new(1)]);

        let mut unit = ledger.begin(&locks, Duration::from_secs(1)).await.unwrap();
        for _ in 0..3 {
            unit.apply_delta(AccountId::new(1), amount("1.00").credit(), Decimal::ZERO)
                .await
                .unwrap();
            unit.append(NewLedgerEntry {
                account_id: AccountId::new(1),
                employee_id: None,
                kind: EntryKind::Deposit,
                amount: amount("1.00"),
                occurred_at: None,
                operation_id: OperationId::new(),
            })
            .await
            .unwrap();
        }
        let entries = unit.commit().await.unwrap();

        let ids: Vec<i64> = entries.iter().map(|e| e.id.value()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(ledger.get(AccountId::new(1)).await.unwrap().balance, dec!(3.00));
    }

    #[tokio::test]
    async fn test_unlocked_account_is_rejected() {
        let ledger = ledger_with(&[(1, "alice", dec!(10.00)), (2, "bob", dec!(10.00))]).await;
        let locks = LockSet::new([AccountId::new(1)]);

        let mut unit = ledger.begin(&locks, Duration::from_secs(1)).await.unwrap();
        let result = unit
            .apply_delta(AccountId::new(2), amount("1.00").credit(), Decimal::ZERO)
            .await;
        assert!(matches!(result, Err(LedgerError::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn test_lock_timeout_is_busy() {
        let ledger = ledger_with(&[(1, "alice", dec!(10.00))]).await;
        let locks = LockSet::new([AccountId::new(1)]);

        let _held = ledger.begin(&locks, Duration::from_secs(1)).await.unwrap();
        let result = ledger.begin(&locks, Duration::from_millis(20)).await;
        assert!(matches!(result, Err(LedgerError::Busy(_))));
    }

    #[tokio::test]
    async fn test_dropped_unit_releases_locks() {
        let ledger = ledger_with(&[(1, "alice", dec!(10.00))]).await;
        let locks = LockSet::new([AccountId::new(1)]);

        {
            let mut unit = ledger.begin(&locks, Duration::from_secs(1)).await.unwrap();
            unit.apply_delta(AccountId::new(1), amount("10.00").debit(), Decimal::ZERO)
                .await
                .unwrap();
        }

        let unit = ledger.begin(&locks, Duration::from_millis(50)).await;
        assert!(unit.is_ok());
        assert_eq!(ledger.get(AccountId::new(1)).await.unwrap().balance, dec!(10.00));
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let ledger = ledger_with(&[(1, "alice", dec!(0.00))]).await;
        let result = ledger
            .insert_account(Account::new(AccountId::new(2), "alice", dec!(0.00)))
            .await;
        assert!(matches!(result, Err(LedgerError::InvalidOperation(_))));
    }
}
