//! Database error types
//!
//! This module defines the error types that can occur during database operations,
//! and how they surface to the ledger domain.

use thiserror::Error;

use domain_ledger::LedgerError;

/// Errors that can occur during database operations
///
/// This enum captures connection issues, query failures, constraint
/// violations and lock contention.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to establish a database connection
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Entity not found in database
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation or out-of-range numeric value
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A row lock could not be taken within `lock_timeout` (55P03)
    #[error("Lock not available: {0}")]
    LockTimeout(String),

    /// The transaction was chosen as a deadlock victim (40P01)
    #[error("Deadlock detected: {0}")]
    Deadlock(String),

    /// Serializable isolation conflict (40001)
    #[error("Serialization failure: {0}")]
    SerializationFailure(String),

    /// Transaction error
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Migration error
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Pool settings that cannot work
    #[error("Invalid database configuration: {0}")]
    InvalidConfig(String),

    /// A stored row could not be turned into a domain value
    #[error("Corrupt row: {0}")]
    Decode(String),

    /// Pool exhaustion - no available connections
    #[error("Connection pool exhausted")]
    PoolExhausted,
}

impl DatabaseError {
    /// Creates a not found error for a specific entity type and identifier
    ///
    /// # Example
    ///
    /// ```rust
    /// use infra_db::DatabaseError;
    ///
    /// let error = DatabaseError::not_found("Account", "ACC-12");
    /// assert!(error.to_string().contains("Account"));
    /// ```
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        DatabaseError::NotFound(format!("{} with id '{}' not found", entity, id))
    }

    /// Creates a duplicate entry error
    pub fn duplicate(entity: &str, field: &str, value: impl std::fmt::Display) -> Self {
        DatabaseError::DuplicateEntry(format!(
            "{} with {} '{}' already exists",
            entity, field, value
        ))
    }

    pub fn decode(message: impl Into<String>) -> Self {
        DatabaseError::Decode(message.into())
    }

    /// Checks if this error indicates a record was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound(_))
    }

    /// Checks if this error is a constraint violation
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DatabaseError::DuplicateEntry(_)
                | DatabaseError::ForeignKeyViolation(_)
                | DatabaseError::ConstraintViolation(_)
        )
    }

    /// Checks if this error is a connection-related issue
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            DatabaseError::ConnectionFailed(_) | DatabaseError::PoolExhausted
        )
    }

    /// Checks if the failure came from contention and a retry may succeed
    pub fn is_contention(&self) -> bool {
        matches!(
            self,
            DatabaseError::LockTimeout(_)
                | DatabaseError::Deadlock(_)
                | DatabaseError::SerializationFailure(_)
                | DatabaseError::PoolExhausted
        )
    }
}

/// Converts SQLx errors to more specific DatabaseError variants
///
/// This function analyzes the SQLx error and maps it to the appropriate
/// DatabaseError variant based on the PostgreSQL error code.
impl From<&sqlx::Error> for DatabaseError {
    fn from(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => {
                DatabaseError::NotFound("Record not found".to_string())
            }
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::Io(e) => DatabaseError::ConnectionFailed(e.to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DatabaseError::Decode(error.to_string())
            }
            sqlx::Error::Database(db_err) => {
                // PostgreSQL error codes
                // https://www.postgresql.org/docs/current/errcodes-appendix.html
                let message = db_err.message().to_string();
                match db_err.code().as_deref() {
                    Some("23505") => DatabaseError::DuplicateEntry(message),
                    Some("23503") => DatabaseError::ForeignKeyViolation(message),
                    Some("23514") | Some("22003") => DatabaseError::ConstraintViolation(message),
                    Some("55P03") => DatabaseError::LockTimeout(message),
                    Some("40P01") => DatabaseError::Deadlock(message),
                    Some("40001") => DatabaseError::SerializationFailure(message),
                    _ => DatabaseError::QueryFailed(message),
                }
            }
            _ => DatabaseError::QueryFailed(error.to_string()),
        }
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        DatabaseError::from(&error)
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationFailed(error.to_string())
    }
}

/// Storage failures as the ledger domain sees them
///
/// Contention becomes `Busy` so callers know to retry; everything else is a
/// `StorageFailure` whose detail stays in the logs.
impl From<DatabaseError> for LedgerError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound(key) => LedgerError::NotFound {
                entity: "Record",
                key,
            },
            e if e.is_contention() => LedgerError::busy(e.to_string()),
            e => LedgerError::storage(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contention_maps_to_busy() {
        for error in [
            DatabaseError::LockTimeout("canceling statement due to lock timeout".into()),
            DatabaseError::Deadlock("deadlock detected".into()),
            DatabaseError::SerializationFailure("could not serialize access".into()),
            DatabaseError::PoolExhausted,
        ] {
            assert!(LedgerError::from(error).is_retryable());
        }
    }

    #[test]
    fn test_other_failures_map_to_storage() {
        let err = LedgerError::from(DatabaseError::ConnectionFailed("refused".into()));
        assert_eq!(err.code(), "storage_failure");

        let err = LedgerError::from(DatabaseError::ConstraintViolation("balance".into()));
        assert_eq!(err.code(), "storage_failure");
    }

    #[test]
    fn test_not_found_is_preserved() {
        let err = LedgerError::from(DatabaseError::not_found("Account", 3));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_pool_timeout_is_exhaustion() {
        let err = DatabaseError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, DatabaseError::PoolExhausted));
        assert!(err.is_connection_error());
    }
}
