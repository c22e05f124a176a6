//! Property-Based Test Generators
//!
//! Proptest strategies for amounts, amount text, account references and
//! operation sequences.

use proptest::prelude::*;
use rust_decimal::Decimal;

use core_kernel::AccountRef;

/// Amounts in cents, within the default operation limits
pub fn cents_strategy() -> impl Strategy<Value = i64> {
    1i64..=100_000_000i64
}

/// Small amounts in cents, for long sequences that must not drain accounts
pub fn small_cents_strategy() -> impl Strategy<Value = i64> {
    1i64..=50_000i64
}

/// A valid amount with scale 2
pub fn amount_strategy() -> impl Strategy<Value = Decimal> {
    cents_strategy().prop_map(|cents| Decimal::new(cents, 2))
}

/// Valid amount text as a form would submit it
///
/// Mixes "12", "12.5" and "12.50" renderings of the same cent value.
pub fn amount_text_strategy() -> impl Strategy<Value = String> {
    (cents_strategy(), 0usize..3).prop_map(|(cents, style)| {
        let value = Decimal::new(cents, 2);
        match style {
            0 => format!("{:.2}", value),
            1 => value.normalize().to_string(),
            _ => format!(" {:.2} ", value),
        }
    })
}

/// Text with three to six fractional digits and a nonzero last digit
pub fn too_precise_text_strategy() -> impl Strategy<Value = String> {
    (1i64..1_000_000i64, 3u32..=6, 1i64..=9).prop_map(|(whole, scale, last)| {
        let fraction = 10i64.pow(scale - 1) + last;
        let fraction = format!("{:0width$}", fraction, width = scale as usize);
        format!("{whole}.{fraction}")
    })
}

/// Text that is not a number at all
pub fn malformed_text_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("   ".to_string()),
        "[a-zA-Z]{1,8}",
        "[0-9]{1,3}\\.[0-9]{1,2}\\.[0-9]{1,2}",
    ]
}

/// Text typed into a search box or form field, padded the way users do
pub fn account_ref_text_strategy() -> impl Strategy<Value = String> {
    let term = prop_oneof![
        (1i64..10_000).prop_map(|id| id.to_string()),
        "0{1,3}[1-9][0-9]{0,3}",
        "[a-z][a-z0-9_]{2,15}",
    ];
    (term, " {0,2}", " {0,2}").prop_map(|(term, lead, trail)| format!("{lead}{term}{trail}"))
}

/// Account references as a search box would produce them
pub fn account_ref_strategy() -> impl Strategy<Value = AccountRef> {
    account_ref_text_strategy().prop_map(|text| AccountRef::parse(&text))
}

/// One step of a randomized operation sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOperation {
    Deposit { account: i64, cents: i64 },
    Withdraw { account: i64, cents: i64 },
    Transfer { from: i64, to: i64, cents: i64 },
}

impl TestOperation {
    /// The amount as form text
    pub fn amount_text(&self) -> String {
        let cents = match self {
            TestOperation::Deposit { cents, .. }
            | TestOperation::Withdraw { cents, .. }
            | TestOperation::Transfer { cents, .. } => *cents,
        };
        format!("{:.2}", Decimal::new(cents, 2))
    }
}

/// Operations over accounts `1..=accounts`; transfers never target their source
pub fn operation_strategy(accounts: i64) -> impl Strategy<Value = TestOperation> {
    let account = 1i64..=accounts;
    prop_oneof![
        (account.clone(), small_cents_strategy())
            .prop_map(|(account, cents)| TestOperation::Deposit { account, cents }),
        (account.clone(), small_cents_strategy())
            .prop_map(|(account, cents)| TestOperation::Withdraw { account, cents }),
        (account.clone(), account, small_cents_strategy())
            .prop_filter("transfer needs two accounts", |(from, to, _)| from != to)
            .prop_map(|(from, to, cents)| TestOperation::Transfer { from, to, cents }),
    ]
}
