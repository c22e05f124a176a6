//! Connection pool and schema migrations
//!
//! Every unit of work holds one pooled connection from `begin` until it
//! commits or rolls back, so the pool size caps how many operations can be in
//! flight at once. A caller never waits on the pool longer than it would
//! wait on an account lock.

use serde::Deserialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

use crate::error::DatabaseError;

/// Type alias for the PostgreSQL connection pool
pub type DatabasePool = PgPool;

/// Pool settings for the ledger database
///
/// # Example
///
/// ```rust
/// use infra_db::DatabaseConfig;
/// use std::time::Duration;
///
/// let config = DatabaseConfig::new("postgres://localhost/ledger")
///     .max_connections(20)
///     .acquire_timeout(Duration::from_millis(500));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Longest wait for a free connection
    pub acquire_timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_ms: 5_000,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Checks the settings before any connection is attempted
    pub fn validate(&self) -> Result<(), DatabaseError> {
        if self.url.trim().is_empty() {
            return Err(DatabaseError::InvalidConfig("database url must not be empty".into()));
        }
        if self.max_connections == 0 {
            return Err(DatabaseError::InvalidConfig("max_connections must be positive".into()));
        }
        if self.min_connections > self.max_connections {
            return Err(DatabaseError::InvalidConfig(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        if self.acquire_timeout_ms == 0 {
            return Err(DatabaseError::InvalidConfig("acquire_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(Duration::from_millis(self.acquire_timeout_ms))
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new("postgres://localhost/ledger")
    }
}

/// Connects a pool with the given settings
///
/// # Errors
///
/// - `DatabaseError::InvalidConfig` if the settings are inconsistent
/// - `DatabaseError::ConnectionFailed` if the database cannot be reached
pub async fn create_pool(config: DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    config.validate()?;
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        acquire_timeout_ms = config.acquire_timeout_ms,
        "Creating database pool"
    );

    config
        .pool_options()
        .connect(&config.url)
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))
}

/// Applies the schema migrations shipped in `migrations/`
///
/// Already applied migrations are skipped.
pub async fn run_migrations(pool: &DatabasePool) -> Result<(), DatabaseError> {
    info!("Applying ledger schema migrations");
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_pool_limits() {
        let config = DatabaseConfig::new("postgres://test/ledger")
            .max_connections(32)
            .min_connections(4)
            .acquire_timeout(Duration::from_millis(250));

        assert_eq!(config.max_connections, 32);
        assert_eq!(config.min_connections, 4);
        assert_eq!(config.acquire_timeout_ms, 250);
        assert!(config.validate().is_ok());

        let options = config.pool_options();
        assert_eq!(options.get_max_connections(), 32);
        assert_eq!(options.get_min_connections(), 4);
        assert_eq!(options.get_acquire_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_inconsistent_settings_are_rejected() {
        let base = DatabaseConfig::default();
        for config in [
            DatabaseConfig::new("  "),
            base.clone().max_connections(0),
            base.clone().max_connections(2).min_connections(3),
            base.acquire_timeout(Duration::ZERO),
        ] {
            assert!(matches!(config.validate(), Err(DatabaseError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: DatabaseConfig =
            serde_json::from_str(r#"{"url": "postgres://db/ledger", "max_connections": 4}"#).unwrap();
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.acquire_timeout_ms, 5_000);
    }
}
