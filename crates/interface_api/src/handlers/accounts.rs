//! Account lookup and history handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use core_kernel::AccountRef;
use domain_ledger::{resolve_account, Account, EntryQuery, DEFAULT_RECENT_LIMIT};

use crate::auth::{Actor, Claims};
use crate::dto::accounts::{
    decode_cursor, AccountResponse, CustomerResponse, EntryPage, EntryResponse, PageParams,
    SearchParams,
};
use crate::handlers::QueryParams;
use crate::{error::ApiError, AppState};

/// Page size when the caller gives none
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// Largest page a caller may ask for
pub const MAX_PAGE_LIMIT: u32 = 200;

/// Builds an entry query from `?limit=&after=`
pub(crate) fn page_query(params: &PageParams) -> Result<(EntryQuery, u32), ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_LIMIT)
        .clamp(1, MAX_PAGE_LIMIT);
    let mut query = EntryQuery::latest(limit);
    if let Some(after) = params.after.as_deref() {
        query = query.after(decode_cursor(after)?);
    }
    Ok((query, limit))
}

/// Resolves `reference` and checks the actor may see it
async fn visible_account(
    state: &AppState,
    claims: &Claims,
    reference: &str,
) -> Result<Account, ApiError> {
    let actor = Actor::from_claims(claims)?;
    let account = resolve_account(state.port.as_ref(), &AccountRef::parse(reference)).await?;
    if !actor.may_access(account.id) {
        return Err(ApiError::forbidden("Customers may only view their own account"));
    }
    Ok(account)
}

/// Looks up one account
pub async fn get_account(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(reference): Path<String>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = visible_account(&state, &claims, &reference).await?;
    Ok(Json(account.into()))
}

/// Pages through an account's history, newest first
pub async fn list_entries(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(reference): Path<String>,
    QueryParams(params): QueryParams<PageParams>,
) -> Result<Json<EntryPage>, ApiError> {
    let (query, limit) = page_query(&params)?;
    let account = visible_account(&state, &claims, &reference).await?;

    let entries = state.port.entries_for(account.id, &query).await?;
    Ok(Json(EntryPage::new(&entries, limit)))
}

/// The dashboard's recent activity list
pub async fn recent_entries(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(reference): Path<String>,
) -> Result<Json<Vec<EntryResponse>>, ApiError> {
    let account = visible_account(&state, &claims, &reference).await?;

    let entries = state
        .queries
        .recent(&AccountRef::Id(account.id), DEFAULT_RECENT_LIMIT)
        .await?;
    Ok(Json(entries.iter().map(EntryResponse::from).collect()))
}

/// Finds a customer by id or username, with their full history
pub async fn search_customer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    QueryParams(params): QueryParams<SearchParams>,
) -> Result<Json<CustomerResponse>, ApiError> {
    Actor::from_claims(&claims)?.require_employee()?;

    let view = state.queries.find_customer(&params.q).await?;
    Ok(Json(CustomerResponse {
        entries: view.entries.iter().map(EntryResponse::from).collect(),
        account: view.account.into(),
    }))
}
