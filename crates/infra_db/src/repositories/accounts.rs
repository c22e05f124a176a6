//! Account and employee repository
//!
//! Plain reads go through the pool. The locking read and the balance update
//! take an open connection so they run inside the caller's transaction.

use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};

use core_kernel::{AccountId, EmployeeId};
use domain_ledger::{Account, Employee};

use crate::error::DatabaseError;

/// Database row for the accounts table
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub id: i64,
    pub username: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub balance: Decimal,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: AccountId::new(row.id),
            username: row.username,
            full_name: row.full_name,
            email: row.email,
            balance: row.balance,
        }
    }
}

/// Database row for the employees table
#[derive(Debug, Clone, FromRow)]
pub struct EmployeeRow {
    pub id: i64,
    pub username: String,
    pub full_name: Option<String>,
    pub role: Option<String>,
}

impl From<EmployeeRow> for Employee {
    fn from(row: EmployeeRow) -> Self {
        Employee {
            id: EmployeeId::new(row.id),
            username: row.username,
            full_name: row.full_name,
            role: row.role,
        }
    }
}

const ACCOUNT_COLUMNS: &str = "id, username, full_name, email, balance";

/// Repository for accounts and employees
#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: PgPool,
}

impl AccountRepository {
    /// Creates a new AccountRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Finds an account by identifier
    pub async fn find_by_id(&self, id: i64) -> Result<Option<AccountRow>, DatabaseError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Finds an account by its unique username
    pub async fn find_by_username(&self, username: &str) -> Result<Option<AccountRow>, DatabaseError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// All accounts ordered by identifier
    pub async fn list(&self) -> Result<Vec<AccountRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// All employees ordered by identifier
    pub async fn list_employees(&self) -> Result<Vec<EmployeeRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, EmployeeRow>(
            "SELECT id, username, full_name, role FROM employees ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Provisions an account
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::DuplicateEntry` if the id or username is taken
    pub async fn insert(&self, account: &Account) -> Result<AccountRow, DatabaseError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            INSERT INTO accounts (id, username, full_name, email, balance)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(account.id.value())
        .bind(&account.username)
        .bind(&account.full_name)
        .bind(&account.email)
        .bind(account.balance)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::DuplicateEntry(_) => {
                DatabaseError::duplicate("Account", "username", &account.username)
            }
            other => other,
        })?;
        Ok(row)
    }

    /// Provisions an employee
    pub async fn insert_employee(&self, employee: &Employee) -> Result<EmployeeRow, DatabaseError> {
        let row = sqlx::query_as::<_, EmployeeRow>(
            r#"
            INSERT INTO employees (id, username, full_name, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, full_name, role
            "#,
        )
        .bind(employee.id.value())
        .bind(&employee.username)
        .bind(&employee.full_name)
        .bind(&employee.role)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Reads and row-locks accounts, in ascending id order
    ///
    /// Waits are bounded by the transaction's `lock_timeout`.
    pub async fn lock_for_update(
        conn: &mut PgConnection,
        ids: &[i64],
    ) -> Result<Vec<AccountRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(ids)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    /// Writes a new balance for a locked account
    pub async fn update_balance(
        conn: &mut PgConnection,
        id: i64,
        balance: Decimal,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE accounts SET balance = $2 WHERE id = $1")
            .bind(id)
            .bind(balance)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Account", id));
        }
        Ok(())
    }
}
