//! Database Test Utilities
//!
//! Provides helpers for database testing including testcontainer management
//! and connection pooling for integration tests.

use once_cell::sync::Lazy;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};
use tokio::sync::{Mutex, MutexGuard, OnceCell};

/// Default PostgreSQL image for testing
const POSTGRES_IMAGE: &str = "postgres";
const POSTGRES_TAG: &str = "16-alpine";
const POSTGRES_USER: &str = "test_user";
const POSTGRES_PASSWORD: &str = "test_password";
const POSTGRES_DB: &str = "ledger_test";

/// Tables in dependency order, cleared between tests
const LEDGER_TABLES: &[&str] = &["ledger_entries", "accounts", "employees"];

/// Configuration for test database
#[derive(Debug, Clone)]
pub struct TestDatabaseConfig {
    pub user: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: u16,
}

impl Default for TestDatabaseConfig {
    fn default() -> Self {
        Self {
            user: POSTGRES_USER.to_string(),
            password: POSTGRES_PASSWORD.to_string(),
            database: POSTGRES_DB.to_string(),
            host: "localhost".to_string(),
            port: 5432,
        }
    }
}

impl TestDatabaseConfig {
    /// Creates the database connection URL
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

/// Starts a PostgreSQL container and returns it with its connection settings
async fn start_container(
) -> Result<(ContainerAsync<GenericImage>, TestDatabaseConfig), Box<dyn std::error::Error + Send + Sync>> {
    let container = GenericImage::new(POSTGRES_IMAGE, POSTGRES_TAG)
        .with_exposed_port(5432.tcp())
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_USER", POSTGRES_USER)
        .with_env_var("POSTGRES_PASSWORD", POSTGRES_PASSWORD)
        .with_env_var("POSTGRES_DB", POSTGRES_DB)
        .start()
        .await?;

    let port = container.get_host_port_ipv4(5432).await?;
    let host = container.get_host().await?.to_string();

    let config = TestDatabaseConfig {
        host,
        port,
        ..TestDatabaseConfig::default()
    };
    Ok((container, config))
}

/// Opens a pool on the current runtime
///
/// Concurrency tests hold several units of work open at once.
async fn connect(config: &TestDatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(16)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.connection_url())
        .await
}

/// Applies the ledger schema migration
async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    let schema = include_str!("../../../migrations/20240101_000001_ledger_schema.sql");
    sqlx::raw_sql(schema).execute(pool).await?;
    Ok(())
}

/// Clears all data while preserving the schema
///
/// Identity sequences restart, so provisioned ids are predictable again.
async fn clear_data(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(&format!(
        "TRUNCATE TABLE {} RESTART IDENTITY CASCADE",
        LEDGER_TABLES.join(", ")
    ))
    .execute(pool)
    .await?;
    Ok(())
}

/// A wrapper around a PostgreSQL test container
pub struct TestDatabase {
    _container: ContainerAsync<GenericImage>,
    pub config: TestDatabaseConfig,
    pub pool: PgPool,
}

impl TestDatabase {
    /// Starts a new PostgreSQL container with the ledger schema applied
    ///
    /// # Errors
    ///
    /// Returns an error if the container fails to start or the schema fails
    /// to apply
    pub async fn new() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let (container, config) = start_container().await?;
        let pool = connect(&config).await?;
        init_schema(&pool).await?;

        Ok(Self {
            _container: container,
            config,
            pool,
        })
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Clears all data while preserving the schema
    pub async fn clear_data(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        clear_data(&self.pool).await?;
        Ok(())
    }
}

/// A container shared by every test in the process
///
/// Only the container and its settings are shared. Pools are bound to the
/// runtime that opened them and each `#[tokio::test]` has its own runtime.
struct SharedContainer {
    _container: ContainerAsync<GenericImage>,
    config: TestDatabaseConfig,
}

static SHARED_CONTAINER: OnceCell<Arc<SharedContainer>> = OnceCell::const_new();

/// Serializes tests that share the database, since each one clears it
static SHARED_DATABASE_GUARD: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Exclusive access to the shared database, freshly cleared
///
/// The container starts on first use and the schema is applied once.
pub struct SharedTestDatabase {
    pub config: TestDatabaseConfig,
    pub pool: PgPool,
    _guard: MutexGuard<'static, ()>,
}

impl SharedTestDatabase {
    /// Waits for exclusive access, then opens a pool and clears all data
    ///
    /// # Panics
    ///
    /// Panics if the container cannot start or the database cannot be reset
    pub async fn acquire() -> Self {
        let guard = SHARED_DATABASE_GUARD.lock().await;

        let shared = SHARED_CONTAINER
            .get_or_init(|| async {
                let (container, config) = start_container()
                    .await
                    .expect("Failed to start shared test database");
                let pool = connect(&config)
                    .await
                    .expect("Failed to connect to shared test database");
                init_schema(&pool)
                    .await
                    .expect("Failed to apply ledger schema");
                pool.close().await;
                Arc::new(SharedContainer {
                    _container: container,
                    config,
                })
            })
            .await
            .clone();

        let pool = connect(&shared.config)
            .await
            .expect("Failed to connect to shared test database");
        clear_data(&pool)
            .await
            .expect("Failed to clear shared test database");

        Self {
            config: shared.config.clone(),
            pool,
            _guard: guard,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Creates an isolated test database for a single test
///
/// Use this when a test needs its own container
pub async fn create_isolated_test_database() -> Result<TestDatabase, Box<dyn std::error::Error + Send + Sync>> {
    TestDatabase::new().await
}

/// Helper macro for running database tests
#[macro_export]
macro_rules! db_test {
    ($name:ident, $body:expr) => {
        #[tokio::test]
        async fn $name() {
            let db = $crate::database::create_isolated_test_database()
                .await
                .expect("Failed to create test database");
            let pool = db.pool();
            $body
        }
    };
}

/// Helper trait for test assertions on database results
pub trait DatabaseTestAssertions {
    /// Asserts that a specific number of rows were affected
    fn assert_rows_affected(&self, expected: u64);
}

impl DatabaseTestAssertions for sqlx::postgres::PgQueryResult {
    fn assert_rows_affected(&self, expected: u64) {
        assert_eq!(
            self.rows_affected(),
            expected,
            "Expected {} rows affected, got {}",
            expected,
            self.rows_affected()
        );
    }
}
