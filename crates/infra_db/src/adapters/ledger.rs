//! PostgreSQL Ledger Adapter
//!
//! Implements `LedgerPort` on PostgreSQL. A unit of work is one database
//! transaction:
//!
//! - `begin` sets a transaction-local `lock_timeout` and locks the unit's
//!   account rows with `SELECT ... ORDER BY id FOR UPDATE`
//! - balance updates and entry inserts run inside that transaction
//! - `commit` publishes everything; `rollback`, or dropping the unit,
//!   discards it and releases the row locks
//!
//! Lock waits that exceed the timeout, deadlocks and serialization failures
//! all surface as `LedgerError::Busy`.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresLedgerAdapter;
//! use domain_ledger::{LedgerPort, TransferEngine};
//! use std::sync::Arc;
//!
//! let port: Arc<dyn LedgerPort> = Arc::new(PostgresLedgerAdapter::new(pool));
//! let engine = TransferEngine::new(port, Arc::new(BranchClock::default()));
//! ```

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use core_kernel::{
    AccountId, BranchClock, Clock, Delta, DomainPort, HealthCheckResult, HealthCheckable,
};
use domain_ledger::{
    Account, Employee, EntryQuery, LedgerEntry, LedgerError, LedgerPort, LedgerTransaction,
    LockSet, NewLedgerEntry, ReportRow,
};

use crate::error::DatabaseError;
use crate::repositories::{AccountRepository, LedgerRepository};

const ADAPTER_ID: &str = "postgres-ledger-adapter";

/// PostgreSQL-backed implementation of the LedgerPort trait
///
/// # Health Checking
///
/// The adapter implements `HealthCheckable` with a `SELECT 1` round trip.
#[derive(Clone)]
pub struct PostgresLedgerAdapter {
    accounts: AccountRepository,
    ledger: LedgerRepository,
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PostgresLedgerAdapter {
    /// Creates an adapter stamping default timestamps with the branch clock
    pub fn new(pool: PgPool) -> Self {
        Self::with_clock(pool, Arc::new(BranchClock::default()))
    }

    pub fn with_clock(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self {
            accounts: AccountRepository::new(pool.clone()),
            ledger: LedgerRepository::new(pool.clone()),
            pool,
            clock,
        }
    }

    /// Returns the account repository, for provisioning
    pub fn accounts_repository(&self) -> &AccountRepository {
        &self.accounts
    }

    /// Provisions an account
    pub async fn insert_account(&self, account: &Account) -> Result<Account, LedgerError> {
        Ok(self.accounts.insert(account).await?.into())
    }

    /// Provisions an employee
    pub async fn insert_employee(&self, employee: &Employee) -> Result<Employee, LedgerError> {
        Ok(self.accounts.insert_employee(employee).await?.into())
    }

    async fn open_unit(
        &self,
        lock_set: &LockSet,
        lock_timeout: Duration,
    ) -> Result<PostgresUnit, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", lock_timeout.as_millis().max(1)))
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from)?;

        let ids: Vec<i64> = lock_set.accounts().iter().map(|id| id.value()).collect();
        let rows = AccountRepository::lock_for_update(&mut tx, &ids).await?;

        let locked: BTreeMap<AccountId, Account> = rows
            .into_iter()
            .map(|row| {
                let account = Account::from(row);
                (account.id, account)
            })
            .collect();

        if let Some(missing) = lock_set.accounts().iter().find(|id| !locked.contains_key(*id)) {
            return Err(LedgerError::account_not_found(missing));
        }

        Ok(PostgresUnit {
            tx,
            locked,
            committed: Vec::new(),
            clock: Arc::clone(&self.clock),
        })
    }
}

impl std::fmt::Debug for PostgresLedgerAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresLedgerAdapter")
            .field("accounts", &self.accounts)
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

impl DomainPort for PostgresLedgerAdapter {}

#[async_trait]
impl HealthCheckable for PostgresLedgerAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult::healthy(ADAPTER_ID, latency_ms),
            Err(e) => HealthCheckResult::unhealthy(ADAPTER_ID, latency_ms, format!("Database error: {}", e)),
        }
    }
}

#[async_trait]
impl LedgerPort for PostgresLedgerAdapter {
    #[instrument(skip(self, lock_set), fields(accounts = ?lock_set.accounts()))]
    async fn begin(
        &self,
        lock_set: &LockSet,
        lock_timeout: Duration,
    ) -> Result<Box<dyn LedgerTransaction>, LedgerError> {
        // Bounds the wait for a pooled connection as well as the row locks
        match tokio::time::timeout(lock_timeout, self.open_unit(lock_set, lock_timeout)).await {
            Ok(Ok(unit)) => {
                debug!("Unit of work opened");
                Ok(Box::new(unit))
            }
            Ok(Err(e)) => {
                if e.is_retryable() {
                    warn!(error = %e, "Could not lock accounts");
                }
                Err(e)
            }
            Err(_) => {
                warn!(timeout_ms = lock_timeout.as_millis() as u64, "Timed out opening unit of work");
                Err(LedgerError::busy(format!(
                    "timed out after {}ms waiting for account locks",
                    lock_timeout.as_millis()
                )))
            }
        }
    }

    #[instrument(skip(self), fields(account_id = %id))]
    async fn get(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.accounts
            .find_by_id(id.value())
            .await?
            .map(Account::from)
            .ok_or_else(|| LedgerError::account_not_found(id))
    }

    #[instrument(skip(self))]
    async fn get_by_name(&self, username: &str) -> Result<Account, LedgerError> {
        self.accounts
            .find_by_username(username)
            .await?
            .map(Account::from)
            .ok_or_else(|| LedgerError::account_not_found(username))
    }

    async fn accounts(&self) -> Result<Vec<Account>, LedgerError> {
        Ok(self.accounts.list().await?.into_iter().map(Account::from).collect())
    }

    async fn employees(&self) -> Result<Vec<Employee>, LedgerError> {
        Ok(self
            .accounts
            .list_employees()
            .await?
            .into_iter()
            .map(Employee::from)
            .collect())
    }

    #[instrument(skip(self, query), fields(account_id = %account_id))]
    async fn entries_for(
        &self,
        account_id: AccountId,
        query: &EntryQuery,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        if self.accounts.find_by_id(account_id.value()).await?.is_none() {
            return Err(LedgerError::account_not_found(account_id));
        }
        let rows = self.ledger.page(Some(account_id.value()), query).await?;
        rows.into_iter()
            .map(|row| LedgerEntry::try_from(row).map_err(LedgerError::from))
            .collect()
    }

    async fn all_entries(&self, query: &EntryQuery) -> Result<Vec<LedgerEntry>, LedgerError> {
        let rows = self.ledger.page(None, query).await?;
        rows.into_iter()
            .map(|row| LedgerEntry::try_from(row).map_err(LedgerError::from))
            .collect()
    }

    async fn report(&self, query: &EntryQuery) -> Result<Vec<ReportRow>, LedgerError> {
        let records = self.ledger.report_page(query).await?;
        records
            .into_iter()
            .map(|record| ReportRow::try_from(record).map_err(LedgerError::from))
            .collect()
    }
}

/// A unit of work backed by one PostgreSQL transaction
struct PostgresUnit {
    tx: Transaction<'static, Postgres>,
    /// Locked rows as this unit has changed them
    locked: BTreeMap<AccountId, Account>,
    committed: Vec<LedgerEntry>,
    clock: Arc<dyn Clock>,
}

impl PostgresUnit {
    fn locked(&self, id: AccountId) -> Result<&Account, LedgerError> {
        self.locked
            .get(&id)
            .ok_or_else(|| LedgerError::invalid_operation(format!("{} is not locked by this unit", id)))
    }
}

#[async_trait]
impl LedgerTransaction for PostgresUnit {
    async fn account(&mut self, id: AccountId) -> Result<Account, LedgerError> {
        self.locked(id).cloned()
    }

    async fn apply_delta(
        &mut self,
        id: AccountId,
        delta: Delta,
        min_balance: Decimal,
    ) -> Result<Decimal, LedgerError> {
        let current = self.locked(id)?.balance;
        let new_balance = delta.apply(current)?;
        if new_balance < min_balance {
            return Err(LedgerError::InsufficientFunds {
                account_id: id,
                balance: current,
                requested: delta.amount().value(),
            });
        }

        AccountRepository::update_balance(&mut self.tx, id.value(), new_balance).await?;
        if let Some(account) = self.locked.get_mut(&id) {
            account.balance = new_balance;
        }
        Ok(new_balance)
    }

    async fn append(&mut self, entry: NewLedgerEntry) -> Result<(), LedgerError> {
        self.locked(entry.account_id)?;
        let occurred_at = entry.occurred_at.unwrap_or_else(|| self.clock.now());
        let row = LedgerRepository::insert(&mut self.tx, &entry, occurred_at).await?;
        self.committed.push(LedgerEntry::try_from(row)?);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<Vec<LedgerEntry>, LedgerError> {
        let this = *self;
        this.tx.commit().await.map_err(DatabaseError::from)?;
        Ok(this.committed)
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        self.tx.rollback().await.map_err(DatabaseError::from)?;
        Ok(())
    }
}
