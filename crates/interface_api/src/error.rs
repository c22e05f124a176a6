//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use domain_ledger::LedgerError;

use crate::auth::AuthError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    /// A failure reported by the ledger
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Ledger(e) => match e {
                LedgerError::InvalidAmount(_) => StatusCode::UNPROCESSABLE_ENTITY,
                LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
                LedgerError::InsufficientFunds { .. } => StatusCode::CONFLICT,
                LedgerError::InvalidOperation(_) => StatusCode::BAD_REQUEST,
                LedgerError::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,
                LedgerError::StorageFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    /// Set when retrying the same request may succeed
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_type, message, retryable) = match &self {
            // Storage detail stays in the logs
            ApiError::Ledger(LedgerError::StorageFailure(detail)) => {
                error!(detail = %detail, "Storage failure");
                ("storage_failure", "The ledger is unavailable".to_string(), false)
            }
            ApiError::Ledger(e) => (e.code(), ledger_message(e), e.is_retryable()),
            ApiError::BadRequest(msg) => ("bad_request", msg.clone(), false),
            ApiError::Unauthorized => ("unauthorized", "Unauthorized".to_string(), false),
            ApiError::Forbidden(msg) => ("forbidden", msg.clone(), false),
            ApiError::Internal(msg) => {
                error!(detail = %msg, "Internal error");
                ("internal_error", "Internal server error".to_string(), false)
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            retryable,
        };

        (status, Json(body)).into_response()
    }
}

/// Amount errors are shown to the teller verbatim
fn ledger_message(error: &LedgerError) -> String {
    match error {
        LedgerError::InvalidAmount(e) => e.to_string(),
        other => other.to_string(),
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingPermission(permission) => {
                ApiError::Forbidden(format!("Missing permission: {}", permission))
            }
            _ => ApiError::Unauthorized,
        }
    }
}
