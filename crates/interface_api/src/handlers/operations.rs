//! Deposit, withdrawal and transfer handlers
//!
//! Tellers post every kind of operation and are recorded on the entries.
//! Customers may only transfer out of their own account.

use axum::{extract::State, http::StatusCode, Extension, Json};

use core_kernel::AccountRef;
use domain_ledger::resolve_account;

use crate::auth::{Actor, Claims};
use crate::dto::operations::{CashRequest, OperationResponse, TransferRequest};
use crate::{error::ApiError, AppState};

/// Posts a cash deposit
pub async fn deposit(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CashRequest>,
) -> Result<(StatusCode, Json<OperationResponse>), ApiError> {
    let employee = Actor::from_claims(&claims)?.require_employee()?;
    let account = AccountRef::parse(&request.account);

    let receipt = state.engine.deposit(&account, &request.amount, employee).await?;
    Ok((StatusCode::CREATED, Json(OperationResponse::visible_to(receipt, |_| true))))
}

/// Posts a cash withdrawal
pub async fn withdraw(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CashRequest>,
) -> Result<(StatusCode, Json<OperationResponse>), ApiError> {
    let employee = Actor::from_claims(&claims)?.require_employee()?;
    let account = AccountRef::parse(&request.account);

    let receipt = state.engine.withdraw(&account, &request.amount, employee).await?;
    Ok((StatusCode::CREATED, Json(OperationResponse::visible_to(receipt, |_| true))))
}

/// Moves money between two accounts
pub async fn transfer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<TransferRequest>,
) -> Result<(StatusCode, Json<OperationResponse>), ApiError> {
    let actor = Actor::from_claims(&claims)?;
    let mut source = AccountRef::parse(&request.from);
    let destination = AccountRef::parse(&request.to);

    if let Actor::Customer(own) = actor {
        let account = resolve_account(state.port.as_ref(), &source).await?;
        if account.id != own {
            return Err(ApiError::forbidden("Customers may only transfer from their own account"));
        }
        source = AccountRef::Id(account.id);
    }

    let receipt = state
        .engine
        .transfer(&source, &destination, &request.amount, actor.employee_id())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(OperationResponse::visible_to(receipt, |id| actor.may_access(id))),
    ))
}
