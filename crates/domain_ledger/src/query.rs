//! Read-side services
//!
//! Every method here is a plain consistent read through the `LedgerPort`; no
//! locks are taken and nothing is written.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use core_kernel::{AccountRef, TimeWindow};

use crate::account::{Account, Employee};
use crate::entry::{EntryQuery, LedgerEntry, ReportRow};
use crate::error::LedgerError;
use crate::ports::LedgerPort;
use crate::reconciliation::Reconciliation;

/// Default size of the dashboard's recent-activity list
pub const DEFAULT_RECENT_LIMIT: u32 = 10;

/// Page size used when a listing walks the whole ledger
const SCAN_PAGE_SIZE: u32 = 500;

/// Resolves an account reference
///
/// Digits that match no account fall back to a username match on the text
/// as typed, so customers named "1001" or "007" can still be found.
pub async fn resolve_account(
    port: &dyn LedgerPort,
    account: &AccountRef,
) -> Result<Account, LedgerError> {
    let by_id = match account.id() {
        Some(id) => port.get(id).await,
        None => Err(LedgerError::unresolved(account)),
    };

    let result = match (by_id, account.as_name()) {
        (Err(e), Some(name)) if e.is_not_found() => port.get_by_name(name).await,
        (result, _) => result,
    };
    result.map_err(|e| if e.is_not_found() { LedgerError::unresolved(account) } else { e })
}

/// An account together with its full history, newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerView {
    pub account: Account,
    pub entries: Vec<LedgerEntry>,
}

/// Read-only queries over accounts and the ledger
#[derive(Clone)]
pub struct LedgerQueries {
    port: Arc<dyn LedgerPort>,
}

impl LedgerQueries {
    pub fn new(port: Arc<dyn LedgerPort>) -> Self {
        Self { port }
    }

    /// The newest `limit` entries of an account
    #[instrument(skip(self), fields(account = %account))]
    pub async fn recent(&self, account: &AccountRef, limit: u32) -> Result<Vec<LedgerEntry>, LedgerError> {
        let resolved = resolve_account(self.port.as_ref(), account).await?;
        self.port.entries_for(resolved.id, &EntryQuery::latest(limit)).await
    }

    /// One page of an account's history
    ///
    /// Feed the cursor of the last returned entry back through
    /// `EntryQuery::after` to read the next page.
    #[instrument(skip(self, query), fields(account = %account))]
    pub async fn page(&self, account: &AccountRef, query: &EntryQuery) -> Result<Vec<LedgerEntry>, LedgerError> {
        let resolved = resolve_account(self.port.as_ref(), account).await?;
        self.port.entries_for(resolved.id, query).await
    }

    /// An account's full history, newest first
    pub async fn history(&self, account: &AccountRef) -> Result<Vec<LedgerEntry>, LedgerError> {
        let resolved = resolve_account(self.port.as_ref(), account).await?;
        self.port.entries_for(resolved.id, &EntryQuery::all()).await
    }

    /// Global history joined with account and employee names
    #[instrument(skip(self))]
    pub async fn report(&self, query: &EntryQuery) -> Result<Vec<ReportRow>, LedgerError> {
        self.port.report(query).await
    }

    /// Finds an account by search term
    ///
    /// Numeric terms try the identifier first and then the username;
    /// anything else matches the username.
    pub async fn lookup(&self, term: &str) -> Result<Account, LedgerError> {
        let reference = AccountRef::parse(term);
        if let AccountRef::Name(name) = &reference {
            if name.is_empty() {
                return Err(LedgerError::invalid_operation("Search term is required"));
            }
        }
        resolve_account(self.port.as_ref(), &reference).await
    }

    /// Lookup plus full history, for the customer search page
    #[instrument(skip(self))]
    pub async fn find_customer(&self, term: &str) -> Result<CustomerView, LedgerError> {
        let account = self.lookup(term).await?;
        let entries = self.port.entries_for(account.id, &EntryQuery::all()).await?;
        debug!(account_id = %account.id, entries = entries.len(), "Customer found");
        Ok(CustomerView { account, entries })
    }

    /// Every account ordered by identifier
    pub async fn accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.port.accounts().await
    }

    /// Every employee ordered by identifier
    pub async fn employees(&self) -> Result<Vec<Employee>, LedgerError> {
        self.port.employees().await
    }

    /// Checks the transfer legs of the whole ledger, or of `window` only
    ///
    /// The window is applied by the store, so only entries inside it are
    /// read.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, window: Option<TimeWindow>) -> Result<Reconciliation, LedgerError> {
        let mut entries = Vec::new();
        let mut query = EntryQuery {
            limit: Some(SCAN_PAGE_SIZE),
            window,
            ..EntryQuery::chronological()
        };

        loop {
            let page = self.port.all_entries(&query).await?;
            let Some(last) = page.last() else { break };
            query = query.after(last.cursor());
            let full = page.len() == SCAN_PAGE_SIZE as usize;
            entries.extend(page);
            if !full {
                break;
            }
        }

        Ok(Reconciliation::from_entries(&entries, window))
    }
}

impl std::fmt::Debug for LedgerQueries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerQueries").finish_non_exhaustive()
    }
}
