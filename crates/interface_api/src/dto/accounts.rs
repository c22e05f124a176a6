//! Account and entry DTOs

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{AccountId, EmployeeId, EntryId, OperationId};
use domain_ledger::{Account, EntryCursor, EntryKind, LedgerEntry};

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: AccountId,
    pub username: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub balance: Decimal,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            username: account.username,
            full_name: account.full_name,
            email: account.email,
            balance: account.balance,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub id: EntryId,
    pub account_id: AccountId,
    pub employee_id: Option<EmployeeId>,
    pub kind: EntryKind,
    pub label: &'static str,
    pub amount: Decimal,
    pub occurred_at: DateTime<FixedOffset>,
    pub operation_id: OperationId,
}

impl From<&LedgerEntry> for EntryResponse {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            id: entry.id,
            account_id: entry.account_id,
            employee_id: entry.employee_id,
            kind: entry.kind,
            label: entry.kind.label(),
            amount: entry.amount.value(),
            occurred_at: entry.occurred_at,
            operation_id: entry.operation_id,
        }
    }
}

/// One page of entries plus the cursor of the next page
#[derive(Debug, Serialize)]
pub struct EntryPage {
    pub entries: Vec<EntryResponse>,
    /// Absent on the last page
    pub next: Option<String>,
}

impl EntryPage {
    /// Builds a page; a full page advertises the cursor of its last entry
    pub fn new(entries: &[LedgerEntry], limit: u32) -> Self {
        let next = match entries.last() {
            Some(last) if entries.len() == limit as usize => Some(encode_cursor(&last.cursor())),
            _ => None,
        };
        Self {
            entries: entries.iter().map(EntryResponse::from).collect(),
            next,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CustomerResponse {
    pub account: AccountResponse,
    pub entries: Vec<EntryResponse>,
}

/// `?limit=&after=` on listings
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<u32>,
    pub after: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
}

/// Renders a cursor as URL-safe text: `<unix micros>.<entry id>`
pub fn encode_cursor(cursor: &EntryCursor) -> String {
    format!("{}.{}", cursor.occurred_at.timestamp_micros(), cursor.id.value())
}

/// Parses text produced by [`encode_cursor`]
pub fn decode_cursor(text: &str) -> Result<EntryCursor, ApiError> {
    let invalid = || ApiError::bad_request(format!("Invalid cursor '{}'", text));

    let (micros, id) = text.split_once('.').ok_or_else(invalid)?;
    let micros: i64 = micros.parse().map_err(|_| invalid())?;
    let id: i64 = id.parse().map_err(|_| invalid())?;
    let occurred_at = DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(invalid)?;

    Ok(EntryCursor {
        occurred_at: occurred_at.fixed_offset(),
        id: EntryId::new(id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn test_cursor_text_keeps_position() {
        let offset = FixedOffset::east_opt(7200).unwrap();
        let cursor = EntryCursor {
            occurred_at: offset.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
            id: EntryId::new(42),
        };

        let text = encode_cursor(&cursor);
        assert!(!text.contains('+'));
        assert_eq!(decode_cursor(&text).unwrap(), cursor);
    }

    #[test]
    fn test_malformed_cursor_is_bad_request() {
        for text in ["", "42", "abc.1", "1.x"] {
            assert!(matches!(decode_cursor(text), Err(ApiError::BadRequest(_))));
        }
    }

    proptest! {
        #[test]
        fn test_any_position_survives_the_query_string(
            micros in 0i64..4_102_444_800_000_000,
            id in 1i64..i64::MAX,
            offset_hours in -12i32..=14,
        ) {
            let offset = FixedOffset::east_opt(offset_hours * 3600).unwrap();
            let cursor = EntryCursor {
                occurred_at: DateTime::<Utc>::from_timestamp_micros(micros)
                    .unwrap()
                    .with_timezone(&offset),
                id: EntryId::new(id),
            };

            let text = encode_cursor(&cursor);
            prop_assert!(text.bytes().all(|b| b.is_ascii_digit() || b == b'.'));
            prop_assert_eq!(decode_cursor(&text).unwrap(), cursor);
        }

        #[test]
        fn test_text_without_separator_is_rejected(text in "[0-9a-z+:-]{0,24}") {
            prop_assert!(decode_cursor(&text).is_err());
        }
    }
}
