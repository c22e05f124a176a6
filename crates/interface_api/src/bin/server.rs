//! Branch Ledger - API Server Binary
//!
//! This binary starts the HTTP API server for the branch ledger.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin ledger-api
//!
//! # Run with environment variables
//! LEDGER_PORT=8080 LEDGER_DATABASE_URL=postgres://... cargo run --bin ledger-api
//! ```
//!
//! # Environment Variables
//!
//! * `LEDGER_HOST` - Server host (default: 0.0.0.0)
//! * `LEDGER_PORT` - Server port (default: 8080)
//! * `LEDGER_JWT_SECRET` - JWT signing secret (required in production)
//! * `LEDGER_JWT_EXPIRATION_SECS` - JWT token expiration in seconds (default: 3600)
//! * `LEDGER_DATABASE_URL` - PostgreSQL connection string (`DATABASE_URL` also works)
//! * `LEDGER_DB_MAX_CONNECTIONS` / `LEDGER_DB_MIN_CONNECTIONS` - Pool size (default: 10 / 1)
//! * `LEDGER_LOG_LEVEL` - Log level: trace, debug, info, warn, error (default: info)
//! * `LEDGER_MIN_AMOUNT` / `LEDGER_MAX_AMOUNT` - Per-operation amount limits
//! * `LEDGER_LOCK_TIMEOUT_MS` - Wait for account locks (default: 5000)
//! * `LEDGER_UTC_OFFSET_HOURS` - Branch offset from UTC (default: 2)

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use infra_db::{create_pool, run_migrations, PostgresLedgerAdapter};
use interface_api::{config::ApiConfig, create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = load_config()?;

    init_tracing(&config.log_level);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        min_amount = %config.min_amount,
        max_amount = %config.max_amount,
        lock_timeout_ms = config.lock_timeout_ms,
        utc_offset_hours = config.utc_offset_hours,
        "Starting branch ledger API server"
    );

    let pool = create_pool(config.database_config())
        .await
        .context("connecting to the database")?;
    run_migrations(&pool).await.context("applying migrations")?;

    let clock = Arc::new(config.clock()?);
    let adapter = Arc::new(PostgresLedgerAdapter::with_clock(pool, clock.clone()));
    let state = AppState::with_clock(adapter, clock, config.clone())?;
    let app = create_router(state);

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .with_context(|| format!("invalid server address {}", config.server_addr()))?;

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Loads configuration from `LEDGER_*` variables
///
/// A bare `DATABASE_URL` is honoured when `LEDGER_DATABASE_URL` is unset.
fn load_config() -> anyhow::Result<ApiConfig> {
    let mut config = ApiConfig::from_env().context("reading LEDGER_* configuration")?;
    if std::env::var("LEDGER_DATABASE_URL").is_err() {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = url;
        }
    }
    config.validate()?;
    Ok(config)
}

/// Initializes the tracing subscriber for structured logging.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// In-flight requests complete before the process exits; an operation cut
/// short by shutdown rolls back with its unit of work.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
