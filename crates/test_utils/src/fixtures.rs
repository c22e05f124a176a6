//! Pre-built Test Fixtures
//!
//! Ready-to-use test data for the ledger. Fixtures are consistent and
//! predictable so assertions can name exact values.

use chrono::{DateTime, FixedOffset, TimeZone};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use core_kernel::{AccountId, Amount, AmountLimits, EmployeeId, FixedClock};
use domain_ledger::{Account, Employee, InMemoryLedger, LedgerQueries, TransferEngine};

/// Fixture for amounts and balances
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// A validated amount; panics on invalid input
    pub fn amount(text: &str) -> Amount {
        Amount::parse(text, &AmountLimits::default())
            .unwrap_or_else(|e| panic!("invalid fixture amount {text:?}: {e}"))
    }

    pub fn opening_balance() -> Decimal {
        dec!(100.00)
    }

    pub fn small_balance() -> Decimal {
        dec!(5.00)
    }

    /// The largest single operation amount allowed by default
    pub fn max_amount() -> Amount {
        Self::amount("1000000.00")
    }
}

/// Fixture for timestamps in the branch offset
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// UTC+2, the branch offset
    pub fn branch_offset() -> FixedOffset {
        FixedOffset::east_opt(2 * 3600).expect("valid offset")
    }

    /// Opening time of the reference business day (2024-03-01 09:00 +02:00)
    pub fn business_day_open() -> DateTime<FixedOffset> {
        Self::branch_offset()
            .with_ymd_and_hms(2024, 3, 1, 9, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    /// A clock frozen at the opening of the reference business day
    pub fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(Self::business_day_open()))
    }
}

/// Fixture for the reference branch: two customers and one teller
pub struct BranchFixtures;

impl BranchFixtures {
    pub fn alice_id() -> AccountId {
        AccountId::new(1)
    }

    pub fn bob_id() -> AccountId {
        AccountId::new(2)
    }

    pub fn teller_id() -> EmployeeId {
        EmployeeId::new(1)
    }

    /// Alice with 100.00
    pub fn alice() -> Account {
        Account::new(Self::alice_id(), "alice", MoneyFixtures::opening_balance())
            .with_full_name("Alice Hassan")
            .with_email("alice@example.com")
    }

    /// Bob with 5.00
    pub fn bob() -> Account {
        Account::new(Self::bob_id(), "bob", MoneyFixtures::small_balance())
            .with_full_name("Bob Nabil")
    }

    pub fn teller() -> Employee {
        Employee::new(Self::teller_id(), "teller")
            .with_full_name("Omar Fathy")
            .with_role("teller")
    }
}

/// An in-memory branch wired to an engine and queries
pub struct TestBranch {
    pub ledger: Arc<InMemoryLedger>,
    pub clock: Arc<FixedClock>,
    pub engine: TransferEngine,
    pub queries: LedgerQueries,
}

impl TestBranch {
    /// An empty branch with the frozen fixture clock
    pub fn empty() -> Self {
        let clock = TemporalFixtures::clock();
        let ledger = Arc::new(InMemoryLedger::new(clock.clone()));
        let engine = TransferEngine::new(ledger.clone(), clock.clone());
        let queries = LedgerQueries::new(ledger.clone());
        Self {
            ledger,
            clock,
            engine,
            queries,
        }
    }

    /// The reference branch: alice, bob and the teller
    pub async fn standard() -> Self {
        Self::empty()
            .with_account(BranchFixtures::alice())
            .await
            .with_account(BranchFixtures::bob())
            .await
            .with_employee(BranchFixtures::teller())
            .await
    }

    /// Adds an account; panics if it cannot be provisioned
    pub async fn with_account(self, account: Account) -> Self {
        self.ledger
            .insert_account(account)
            .await
            .unwrap_or_else(|e| panic!("failed to provision account: {e}"));
        self
    }

    pub async fn with_employee(self, employee: Employee) -> Self {
        self.ledger
            .insert_employee(employee)
            .await
            .unwrap_or_else(|e| panic!("failed to provision employee: {e}"));
        self
    }

    /// Current balance of an account; panics if it does not exist
    pub async fn balance(&self, id: AccountId) -> Decimal {
        use domain_ledger::LedgerPort;
        self.ledger
            .get(id)
            .await
            .unwrap_or_else(|e| panic!("no balance for {id}: {e}"))
            .balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_standard_branch_is_operational() {
        let branch = TestBranch::standard().await;
        let alice = core_kernel::AccountRef::parse("alice");

        branch
            .engine
            .deposit(&alice, "10.00", BranchFixtures::teller_id())
            .await
            .unwrap();

        assert_eq!(branch.balance(BranchFixtures::alice_id()).await, dec!(110.00));
        assert_eq!(branch.queries.history(&alice).await.unwrap().len(), 1);
        assert_eq!(branch.queries.employees().await.unwrap().len(), 1);
    }

    #[test]
    fn test_fixture_amounts() {
        assert_eq!(MoneyFixtures::max_amount().value(), dec!(1000000.00));
        assert_eq!(TemporalFixtures::business_day_open().offset().local_minus_utc(), 7200);
    }
}
