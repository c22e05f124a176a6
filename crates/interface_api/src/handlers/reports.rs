//! Branch reports, for admins

use axum::{extract::State, Extension, Json};

use core_kernel::TimeWindow;

use crate::auth::{require_admin, Claims};
use crate::dto::accounts::{AccountResponse, PageParams};
use crate::dto::reports::{
    EmployeeResponse, ReconciliationResponse, TransactionReport, WindowParams,
};
use crate::handlers::{accounts::page_query, QueryParams};
use crate::{error::ApiError, AppState};

/// Every entry in the branch with names joined, newest first
pub async fn transactions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    QueryParams(params): QueryParams<PageParams>,
) -> Result<Json<TransactionReport>, ApiError> {
    require_admin(&claims)?;
    let (query, limit) = page_query(&params)?;

    let rows = state.queries.report(&query).await?;
    Ok(Json(TransactionReport::new(&rows, limit)))
}

pub async fn accounts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<AccountResponse>>, ApiError> {
    require_admin(&claims)?;
    let accounts = state.queries.accounts().await?;
    Ok(Json(accounts.into_iter().map(AccountResponse::from).collect()))
}

pub async fn employees(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<EmployeeResponse>>, ApiError> {
    require_admin(&claims)?;
    let employees = state.queries.employees().await?;
    Ok(Json(employees.into_iter().map(EmployeeResponse::from).collect()))
}

/// Checks transfer pairing and totals, over a window or the whole ledger
pub async fn reconciliation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    QueryParams(params): QueryParams<WindowParams>,
) -> Result<Json<ReconciliationResponse>, ApiError> {
    require_admin(&claims)?;

    let window = match (params.from, params.to) {
        (Some(from), Some(to)) => {
            Some(TimeWindow::new(from, to).map_err(|e| ApiError::bad_request(e.to_string()))?)
        }
        (None, None) => None,
        _ => return Err(ApiError::bad_request("Both 'from' and 'to' are required for a window")),
    };

    let report = state.queries.reconcile(window).await?;
    Ok(Json(report.into()))
}
