//! Transfer engine
//!
//! The `TransferEngine` performs the three balance-changing operations:
//! deposit, withdraw and transfer. Each one runs as a single unit of work:
//!
//! 1. The amount text is validated before anything is read or locked
//! 2. Account references are resolved
//! 3. A unit of work is opened holding the locks of every named account
//! 4. Balance changes and ledger entries are staged
//! 5. The unit commits, or rolls back on the first failure
//!
//! A caller therefore observes either the whole operation or none of it. The
//! acting employee is always passed in explicitly.

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, info_span, warn, Instrument};

use core_kernel::{
    AccountId, AccountRef, Amount, AmountLimits, Clock, CoreError, Delta, EmployeeId, OperationId,
};

use crate::entry::{EntryKind, LedgerEntry, NewLedgerEntry};
use crate::error::LedgerError;
use crate::ports::{LedgerPort, LedgerTransaction, LockSet};
use crate::query::resolve_account;

/// Default bound on lock waits, in milliseconds
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

/// Engine settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Bounds applied to every operation amount
    #[serde(default)]
    pub limits: AmountLimits,
    /// Longest wait for the account locks of one operation
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl EngineConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Checks the settings for consistency
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` if the limits are not positive
    /// cent values with `min <= max`, or the lock timeout is zero
    pub fn validate(&self) -> Result<(), CoreError> {
        let AmountLimits { min, max } = self.limits;
        if min <= Decimal::ZERO {
            return Err(CoreError::configuration("minimum amount must be positive"));
        }
        if min > max {
            return Err(CoreError::configuration(format!(
                "minimum amount {} exceeds maximum {}",
                min, max
            )));
        }
        if min.normalize().scale() > 2 || max.normalize().scale() > 2 {
            return Err(CoreError::configuration("amount limits must be whole cents"));
        }
        if self.lock_timeout_ms == 0 {
            return Err(CoreError::configuration("lock timeout must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            limits: AmountLimits::default(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

/// The operation a receipt describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Deposit,
    Withdrawal,
    Transfer,
}

impl OperationKind {
    fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Deposit => "deposit",
            OperationKind::Withdrawal => "withdrawal",
            OperationKind::Transfer => "transfer",
        }
    }
}

/// Balance of one account after an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BalanceChange {
    pub account_id: AccountId,
    pub balance: Decimal,
}

/// What a committed operation did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationReceipt {
    pub operation_id: OperationId,
    pub kind: OperationKind,
    pub amount: Amount,
    pub occurred_at: DateTime<FixedOffset>,
    /// Committed entries in append order
    pub entries: Vec<LedgerEntry>,
    /// New balances of every account touched
    pub balances: Vec<BalanceChange>,
}

impl OperationReceipt {
    /// New balance of `account_id`, if the operation touched it
    pub fn balance_of(&self, account_id: AccountId) -> Option<Decimal> {
        self.balances
            .iter()
            .find(|change| change.account_id == account_id)
            .map(|change| change.balance)
    }
}

/// One staged balance change plus the entry that records it
struct Leg {
    account_id: AccountId,
    delta: Delta,
    kind: EntryKind,
}

/// Performs deposits, withdrawals and transfers against a `LedgerPort`
#[derive(Clone)]
pub struct TransferEngine {
    port: Arc<dyn LedgerPort>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl TransferEngine {
    /// Creates an engine with the default configuration
    pub fn new(port: Arc<dyn LedgerPort>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(port, clock, EngineConfig::default())
    }

    pub fn with_config(port: Arc<dyn LedgerPort>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        Self { port, clock, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The storage port, shared with read-side services
    pub fn port(&self) -> Arc<dyn LedgerPort> {
        Arc::clone(&self.port)
    }

    /// Credits `amount_text` to an account on behalf of an employee
    ///
    /// # Errors
    ///
    /// - `LedgerError::InvalidAmount` if the amount fails validation
    /// - `LedgerError::NotFound` if the account does not exist
    /// - `LedgerError::Busy` if the account lock cannot be acquired in time
    pub async fn deposit(
        &self,
        account: &AccountRef,
        amount_text: &str,
        employee: EmployeeId,
    ) -> Result<OperationReceipt, LedgerError> {
        let operation_id = OperationId::new();
        let span = info_span!(
            "ledger_operation",
            kind = "deposit",
            %operation_id,
            account = %account,
            employee = %employee
        );

        let outcome = async {
            let amount = Amount::parse(amount_text, &self.config.limits)?;
            let resolved = resolve_account(self.port.as_ref(), account).await?;
            let legs = [Leg {
                account_id: resolved.id,
                delta: amount.credit(),
                kind: EntryKind::Deposit,
            }];
            self.execute(operation_id, OperationKind::Deposit, amount, &legs, Some(employee))
                .await
        };
        logged(OperationKind::Deposit, outcome).instrument(span).await
    }

    /// Debits `amount_text` from an account on behalf of an employee
    ///
    /// # Errors
    ///
    /// As for [`TransferEngine::deposit`], plus
    /// `LedgerError::InsufficientFunds` if the balance is below the amount
    pub async fn withdraw(
        &self,
        account: &AccountRef,
        amount_text: &str,
        employee: EmployeeId,
    ) -> Result<OperationReceipt, LedgerError> {
        let operation_id = OperationId::new();
        let span = info_span!(
            "ledger_operation",
            kind = "withdrawal",
            %operation_id,
            account = %account,
            employee = %employee
        );

        let outcome = async {
            let amount = Amount::parse(amount_text, &self.config.limits)?;
            let resolved = resolve_account(self.port.as_ref(), account).await?;
            let legs = [Leg {
                account_id: resolved.id,
                delta: amount.debit(),
                kind: EntryKind::Withdrawal,
            }];
            self.execute(operation_id, OperationKind::Withdrawal, amount, &legs, Some(employee))
                .await
        };
        logged(OperationKind::Withdrawal, outcome).instrument(span).await
    }

    /// Moves `amount_text` from `source` to `destination`
    ///
    /// `employee` is `None` when the customer initiates the transfer.
    /// Both legs share one timestamp and one operation id.
    ///
    /// # Errors
    ///
    /// As for [`TransferEngine::withdraw`], plus
    /// `LedgerError::InvalidOperation` if both references name the same account
    pub async fn transfer(
        &self,
        source: &AccountRef,
        destination: &AccountRef,
        amount_text: &str,
        employee: Option<EmployeeId>,
    ) -> Result<OperationReceipt, LedgerError> {
        let operation_id = OperationId::new();
        let span = info_span!(
            "ledger_operation",
            kind = "transfer",
            %operation_id,
            source = %source,
            destination = %destination,
            employee = ?employee.map(|id| id.value())
        );

        let outcome = async {
            let amount = Amount::parse(amount_text, &self.config.limits)?;
            if source == destination {
                return Err(same_account());
            }

            let from = resolve_account(self.port.as_ref(), source).await?;
            let to = resolve_account(self.port.as_ref(), destination).await?;
            if from.id == to.id {
                return Err(same_account());
            }

            let legs = [
                Leg {
                    account_id: from.id,
                    delta: amount.debit(),
                    kind: EntryKind::TransferOut,
                },
                Leg {
                    account_id: to.id,
                    delta: amount.credit(),
                    kind: EntryKind::TransferIn,
                },
            ];
            self.execute(operation_id, OperationKind::Transfer, amount, &legs, employee)
                .await
        };
        logged(OperationKind::Transfer, outcome).instrument(span).await
    }

    /// Runs one unit of work over `legs`
    async fn execute(
        &self,
        operation_id: OperationId,
        kind: OperationKind,
        amount: Amount,
        legs: &[Leg],
        employee: Option<EmployeeId>,
    ) -> Result<OperationReceipt, LedgerError> {
        let lock_set = LockSet::new(legs.iter().map(|leg| leg.account_id));
        let mut unit = self.port.begin(&lock_set, self.config.lock_timeout()).await?;
        let occurred_at = self.clock.now();

        let balances = match stage(&mut *unit, operation_id, legs, employee, occurred_at).await {
            Ok(balances) => balances,
            Err(e) => return abort(unit, e).await,
        };
        let entries = unit.commit().await?;

        Ok(OperationReceipt {
            operation_id,
            kind,
            amount,
            occurred_at,
            entries,
            balances,
        })
    }
}

impl std::fmt::Debug for TransferEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Awaits an operation and logs how it ended
async fn logged(
    kind: OperationKind,
    outcome: impl Future<Output = Result<OperationReceipt, LedgerError>>,
) -> Result<OperationReceipt, LedgerError> {
    let result = outcome.await;
    match &result {
        Ok(receipt) => info!(
            operation = kind.as_str(),
            amount = %receipt.amount,
            entries = receipt.entries.len(),
            "Operation committed"
        ),
        Err(e @ LedgerError::StorageFailure(_)) => {
            error!(operation = kind.as_str(), error = %e, "Operation failed")
        }
        Err(e) => warn!(operation = kind.as_str(), code = e.code(), error = %e, "Operation rejected"),
    }
    result
}

fn same_account() -> LedgerError {
    LedgerError::invalid_operation("Cannot transfer to the same account")
}

/// Applies every leg in order; legs after a failing one are not attempted
async fn stage(
    unit: &mut dyn LedgerTransaction,
    operation_id: OperationId,
    legs: &[Leg],
    employee: Option<EmployeeId>,
    occurred_at: DateTime<FixedOffset>,
) -> Result<Vec<BalanceChange>, LedgerError> {
    let mut balances = Vec::with_capacity(legs.len());
    for leg in legs {
        let balance = unit.apply_delta(leg.account_id, leg.delta, Decimal::ZERO).await?;
        balances.push(BalanceChange {
            account_id: leg.account_id,
            balance,
        });
    }
    for leg in legs {
        unit.append(NewLedgerEntry {
            account_id: leg.account_id,
            employee_id: employee,
            kind: leg.kind,
            amount: leg.delta.amount(),
            occurred_at: Some(occurred_at),
            operation_id,
        })
        .await?;
    }
    Ok(balances)
}

/// Rolls the unit back and returns the error that caused it
async fn abort<T>(unit: Box<dyn LedgerTransaction>, cause: LedgerError) -> Result<T, LedgerError> {
    if let Err(rollback_error) = unit.rollback().await {
        // Storage discards an uncommitted unit on its own once the handle is gone
        error!(error = %rollback_error, "Rollback failed");
    }
    Err(cause)
}
