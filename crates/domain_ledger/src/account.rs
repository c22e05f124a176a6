//! Customer accounts and staff reference records

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{AccountId, EmployeeId};

/// A customer's single checking balance
///
/// Accounts are provisioned outside the ledger core; the engine only ever
/// changes `balance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier
    pub id: AccountId,
    /// Unique login / display name
    pub username: String,
    /// Customer's full name
    pub full_name: Option<String>,
    /// Contact email
    pub email: Option<String>,
    /// Current balance, scale 2
    pub balance: Decimal,
}

impl Account {
    /// Creates a new account record
    ///
    /// # Arguments
    ///
    /// * `id` - Unique identifier
    /// * `username` - Unique account name
    /// * `balance` - Opening balance
    pub fn new(id: AccountId, username: impl Into<String>, balance: Decimal) -> Self {
        Self {
            id,
            username: username.into(),
            full_name: None,
            email: None,
            balance,
        }
    }

    /// Sets the full name
    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    /// Sets the contact email
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Name to show in reports: full name when known, username otherwise
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.username)
    }
}

/// A branch employee, read only to the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub username: String,
    pub full_name: Option<String>,
    pub role: Option<String>,
}

impl Employee {
    pub fn new(id: EmployeeId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            full_name: None,
            role: None,
        }
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_display_name_prefers_full_name() {
        let account = Account::new(AccountId::new(1), "mona", dec!(0.00));
        assert_eq!(account.display_name(), "mona");

        let account = account.with_full_name("Mona Samir");
        assert_eq!(account.display_name(), "Mona Samir");
    }
}
