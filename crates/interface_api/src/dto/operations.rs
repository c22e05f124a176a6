//! Operation DTOs

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{AccountId, OperationId};
use domain_ledger::{OperationKind, OperationReceipt};

use super::accounts::EntryResponse;

/// Body of a deposit or withdrawal
///
/// `account` is an id or a username; `amount` is the text as typed.
#[derive(Debug, Deserialize)]
pub struct CashRequest {
    pub account: String,
    pub amount: String,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub from: String,
    pub to: String,
    pub amount: String,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub account_id: AccountId,
    pub balance: Decimal,
}

#[derive(Debug, Serialize)]
pub struct OperationResponse {
    pub operation_id: OperationId,
    pub kind: OperationKind,
    pub amount: Decimal,
    pub occurred_at: DateTime<FixedOffset>,
    pub entries: Vec<EntryResponse>,
    pub balances: Vec<BalanceResponse>,
}

impl OperationResponse {
    /// Keeps only what the caller may see
    ///
    /// Customers receive their own leg and balance, never the counterparty's.
    pub fn visible_to(receipt: OperationReceipt, visible: impl Fn(AccountId) -> bool) -> Self {
        Self {
            operation_id: receipt.operation_id,
            kind: receipt.kind,
            amount: receipt.amount.value(),
            occurred_at: receipt.occurred_at,
            entries: receipt
                .entries
                .iter()
                .filter(|e| visible(e.account_id))
                .map(EntryResponse::from)
                .collect(),
            balances: receipt
                .balances
                .iter()
                .filter(|b| visible(b.account_id))
                .map(|b| BalanceResponse {
                    account_id: b.account_id,
                    balance: b.balance,
                })
                .collect(),
        }
    }
}
