//! HTTP API Layer
//!
//! This crate provides the REST API for the branch ledger using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Operations, account lookups, reports and health
//! - **Middleware**: Authentication, tracing, audit logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: Ledger failures mapped to HTTP statuses
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let state = AppState::new(port, config)?;
//! axum::serve(listener, create_router(state)).await?;
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use core_kernel::{Clock, CoreError};
use domain_ledger::{LedgerPort, LedgerQueries, TransferEngine};

use crate::config::ApiConfig;
use crate::handlers::{accounts, health, operations, reports};
use crate::middleware::{audit_middleware, auth_middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TransferEngine>,
    pub queries: Arc<LedgerQueries>,
    pub port: Arc<dyn LedgerPort>,
    pub config: ApiConfig,
}

impl AppState {
    /// Wires the engine and queries over `port` with the configured clock
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` if `config` does not validate
    pub fn new(port: Arc<dyn LedgerPort>, config: ApiConfig) -> Result<Self, CoreError> {
        let clock = Arc::new(config.clock()?);
        Self::with_clock(port, clock, config)
    }

    /// Same as [`AppState::new`] with an explicit clock
    pub fn with_clock(
        port: Arc<dyn LedgerPort>,
        clock: Arc<dyn Clock>,
        config: ApiConfig,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let engine = TransferEngine::with_config(port.clone(), clock, config.engine_config());
        Ok(Self {
            engine: Arc::new(engine),
            queries: Arc::new(LedgerQueries::new(port.clone())),
            port,
            config,
        })
    }
}

/// Creates the main API router
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let operation_routes = Router::new()
        .route("/deposit", post(operations::deposit))
        .route("/withdraw", post(operations::withdraw))
        .route("/transfer", post(operations::transfer));

    let account_routes = Router::new()
        .route("/:reference", get(accounts::get_account))
        .route("/:reference/entries", get(accounts::list_entries))
        .route("/:reference/recent", get(accounts::recent_entries));

    let report_routes = Router::new()
        .route("/transactions", get(reports::transactions))
        .route("/accounts", get(reports::accounts))
        .route("/employees", get(reports::employees))
        .route("/reconciliation", get(reports::reconciliation));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/operations", operation_routes)
        .nest("/accounts", account_routes)
        .route("/customers/search", get(accounts::search_customer))
        .nest("/reports", report_routes)
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
