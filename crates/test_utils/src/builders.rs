//! Test Data Builders
//!
//! Builder patterns for constructing accounts and employees with sensible
//! defaults. Unset names are filled with fake but plausible values.

use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::Fake;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{AccountId, EmployeeId};
use domain_ledger::{Account, Employee};

/// Builder for accounts
#[derive(Debug, Clone)]
pub struct TestAccountBuilder {
    id: AccountId,
    username: Option<String>,
    full_name: Option<String>,
    email: Option<String>,
    balance: Decimal,
}

impl TestAccountBuilder {
    pub fn new(id: i64) -> Self {
        Self {
            id: AccountId::new(id),
            username: None,
            full_name: None,
            email: None,
            balance: Decimal::ZERO,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = balance;
        self
    }

    /// A balance large enough that withdrawals in a test never run dry
    pub fn well_funded(self) -> Self {
        self.with_balance(dec!(1000000.00))
    }

    /// Builds the account
    ///
    /// The default username embeds the id so it stays unique across a
    /// branch; full name and email are generated.
    pub fn build(self) -> Account {
        let first: String = FirstName().fake();
        let last: String = LastName().fake();
        let username = self
            .username
            .unwrap_or_else(|| format!("{}{}", first.to_lowercase(), self.id.value()));
        let full_name = self.full_name.unwrap_or_else(|| format!("{first} {last}"));
        let email = self.email.unwrap_or_else(|| SafeEmail().fake());

        Account::new(self.id, username, self.balance)
            .with_full_name(full_name)
            .with_email(email)
    }
}

/// Builder for employees
#[derive(Debug, Clone)]
pub struct TestEmployeeBuilder {
    id: EmployeeId,
    username: Option<String>,
    full_name: Option<String>,
    role: String,
}

impl TestEmployeeBuilder {
    pub fn new(id: i64) -> Self {
        Self {
            id: EmployeeId::new(id),
            username: None,
            full_name: None,
            role: "teller".to_string(),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn build(self) -> Employee {
        let username = self
            .username
            .unwrap_or_else(|| format!("emp{}", self.id.value()));
        let full_name = self.full_name.unwrap_or_else(|| Name().fake());

        Employee::new(self.id, username)
            .with_full_name(full_name)
            .with_role(self.role)
    }
}

/// Builds `count` accounts with ids `1..=count`, each holding `balance`
pub fn funded_accounts(count: i64, balance: Decimal) -> Vec<Account> {
    (1..=count)
        .map(|id| TestAccountBuilder::new(id).with_balance(balance).build())
        .collect()
}
