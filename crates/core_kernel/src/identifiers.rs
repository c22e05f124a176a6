//! Strongly-typed identifiers for domain entities
//!
//! Accounts, employees and ledger entries are keyed by database-assigned
//! integers; newtypes keep them from being mixed up. Operation identifiers are
//! time-ordered UUIDs generated by the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! define_serial_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates from a raw database key
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw database key
            pub fn value(&self) -> i64 {
                self.0
            }

            /// Returns the identifier prefix for display
            pub fn prefix() -> &'static str {
                $prefix
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                // Strip prefix if present
                let raw = s.strip_prefix(concat!($prefix, "-")).unwrap_or(s);
                Ok(Self(raw.parse()?))
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> i64 {
                id.0
            }
        }
    };
}

define_serial_id!(AccountId, "ACC");
define_serial_id!(EmployeeId, "EMP");
define_serial_id!(EntryId, "TXN");

/// Identifier shared by every ledger entry written in one operation unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(Uuid);

impl OperationId {
    /// Creates a new time-ordered identifier (v7)
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OP-{}", self.0)
    }
}

impl From<Uuid> for OperationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A reference to an account as supplied by a caller
///
/// All-digit text parses to `Numeric`, anything else to a username.
/// Resolution of a `Numeric` reference that matches no identifier falls back
/// to a name match on the text exactly as typed, leading zeros included.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountRef {
    /// An exact identifier, such as one taken from an authenticated session
    Id(AccountId),
    /// Digits typed by a caller: an identifier, or failing that a username
    Numeric { id: AccountId, text: String },
    Name(String),
}

impl AccountRef {
    /// Parses a search term or form field
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(value) = trimmed.parse::<i64>() {
                return AccountRef::Numeric {
                    id: AccountId::new(value),
                    text: trimmed.to_string(),
                };
            }
        }
        AccountRef::Name(trimmed.to_string())
    }

    /// The identifier to try first, if the reference has one
    pub fn id(&self) -> Option<AccountId> {
        match self {
            AccountRef::Id(id) | AccountRef::Numeric { id, .. } => Some(*id),
            AccountRef::Name(_) => None,
        }
    }

    /// The text to use for a name lookup
    ///
    /// `None` for an exact `Id`, which never falls back to a username.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            AccountRef::Id(_) => None,
            AccountRef::Numeric { text, .. } => Some(text),
            AccountRef::Name(name) => Some(name),
        }
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountRef::Id(id) => write!(f, "{}", id),
            AccountRef::Numeric { text, .. } => write!(f, "{}", text),
            AccountRef::Name(name) => write!(f, "{}", name),
        }
    }
}

impl From<AccountId> for AccountRef {
    fn from(id: AccountId) -> Self {
        AccountRef::Id(id)
    }
}

impl From<&str> for AccountRef {
    fn from(input: &str) -> Self {
        AccountRef::parse(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_display() {
        let id = AccountId::new(42);
        assert_eq!(id.to_string(), "ACC-42");
    }

    #[test]
    fn test_id_parsing() {
        let original = EmployeeId::new(7);
        let parsed: EmployeeId = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
        assert_eq!("7".parse::<EmployeeId>().unwrap(), original);
    }

    #[test]
    fn test_account_ref_parse() {
        assert_eq!(AccountRef::parse(" 12 ").id(), Some(AccountId::new(12)));
        assert_eq!(AccountRef::parse(" 012 ").as_name(), Some("012"));
        assert_eq!(AccountRef::parse("alice"), AccountRef::Name("alice".to_string()));
        assert_eq!(AccountRef::parse("12a"), AccountRef::Name("12a".to_string()));
        assert_eq!(AccountRef::parse("-3"), AccountRef::Name("-3".to_string()));
    }
}
