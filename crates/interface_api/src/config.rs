//! API configuration

use rust_decimal::Decimal;
use serde::Deserialize;

use core_kernel::temporal::DEFAULT_UTC_OFFSET_HOURS;
use core_kernel::{AmountLimits, BranchClock, CoreError};
use domain_ledger::engine::DEFAULT_LOCK_TIMEOUT_MS;
use domain_ledger::EngineConfig;
use infra_db::DatabaseConfig;

/// API configuration
///
/// Read from `LEDGER_`-prefixed environment variables; anything unset keeps
/// its default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Database URL
    pub database_url: String,
    /// Upper bound on concurrent units of work
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    /// Log level
    pub log_level: String,
    /// Smallest amount a single operation may move
    pub min_amount: Decimal,
    /// Largest amount a single operation may move
    pub max_amount: Decimal,
    /// How long an operation waits for account locks
    pub lock_timeout_ms: u64,
    /// Branch offset from UTC for operation timestamps
    pub utc_offset_hours: i32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let limits = AmountLimits::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/ledger".to_string(),
            db_max_connections: 10,
            db_min_connections: 1,
            log_level: "info".to_string(),
            min_amount: limits.min,
            max_amount: limits.max,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("LEDGER"))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Engine settings carried by this configuration
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            limits: AmountLimits::new(self.min_amount, self.max_amount),
            lock_timeout_ms: self.lock_timeout_ms,
        }
    }

    /// Pool settings for the ledger database
    ///
    /// Waiting for a connection shares the lock timeout budget.
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(&self.database_url)
            .max_connections(self.db_max_connections)
            .min_connections(self.db_min_connections)
            .acquire_timeout(self.engine_config().lock_timeout())
    }

    /// The operation clock in the configured offset
    pub fn clock(&self) -> Result<BranchClock, CoreError> {
        Ok(BranchClock::with_offset_hours(self.utc_offset_hours)?)
    }

    /// Checks every setting the server cannot start without
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(CoreError::configuration("jwt_secret must not be empty"));
        }
        if self.jwt_expiration_secs == 0 {
            return Err(CoreError::configuration("jwt_expiration_secs must be positive"));
        }
        self.engine_config().validate()?;
        self.database_config()
            .validate()
            .map_err(|e| CoreError::configuration(e.to_string()))?;
        self.clock()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_are_valid() {
        let config = ApiConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_amount, dec!(0.01));
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert_eq!(config.engine_config(), EngineConfig::default());
    }

    #[test]
    fn test_engine_config_follows_settings() {
        let config = ApiConfig {
            min_amount: dec!(1.00),
            max_amount: dec!(500.00),
            lock_timeout_ms: 250,
            ..ApiConfig::default()
        };
        let engine = config.engine_config();
        assert_eq!(engine.limits, AmountLimits::new(dec!(1.00), dec!(500.00)));
        assert_eq!(engine.lock_timeout().as_millis(), 250);
    }

    #[test]
    fn test_database_config_follows_settings() {
        let config = ApiConfig {
            database_url: "postgres://db/branch".to_string(),
            db_max_connections: 24,
            lock_timeout_ms: 750,
            ..ApiConfig::default()
        };
        let database = config.database_config();
        assert_eq!(database.url, "postgres://db/branch");
        assert_eq!(database.max_connections, 24);
        assert_eq!(database.acquire_timeout_ms, 750);

        let starved = ApiConfig {
            db_max_connections: 0,
            ..ApiConfig::default()
        };
        assert!(starved.validate().is_err());
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let inverted = ApiConfig {
            min_amount: dec!(10.00),
            max_amount: dec!(5.00),
            ..ApiConfig::default()
        };
        assert!(inverted.validate().is_err());

        let offset = ApiConfig {
            utc_offset_hours: 30,
            ..ApiConfig::default()
        };
        assert!(offset.validate().is_err());

        let secret = ApiConfig {
            jwt_secret: "  ".to_string(),
            ..ApiConfig::default()
        };
        assert!(secret.validate().is_err());
    }
}
