//! PostgreSQL adapter tests
//!
//! These run the transfer engine and queries against a real database in a
//! container. Run with: cargo test -p infra_db -- --ignored

use chrono::Duration as ChronoDuration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use core_kernel::{AccountId, AccountRef, FixedClock, HealthCheckable};
use domain_ledger::{
    EngineConfig, EntryKind, EntryQuery, LedgerPort, LedgerQueries, LockSet, TransferEngine,
};
use infra_db::PostgresLedgerAdapter;
use test_utils::{
    assert_ledger_error, assert_matched_transfer, assert_newest_first, assert_receipt_balance,
    BranchFixtures, SharedTestDatabase, TemporalFixtures, TestAccountBuilder,
};

struct PgBranch {
    db: SharedTestDatabase,
    adapter: Arc<PostgresLedgerAdapter>,
    clock: Arc<FixedClock>,
    engine: TransferEngine,
    queries: LedgerQueries,
}

async fn branch_with(config: EngineConfig) -> PgBranch {
    let db = SharedTestDatabase::acquire().await;
    let clock = TemporalFixtures::clock();
    let adapter = Arc::new(PostgresLedgerAdapter::with_clock(db.pool().clone(), clock.clone()));

    adapter.insert_account(&BranchFixtures::alice()).await.unwrap();
    adapter.insert_account(&BranchFixtures::bob()).await.unwrap();
    adapter.insert_employee(&BranchFixtures::teller()).await.unwrap();

    let engine = TransferEngine::with_config(adapter.clone(), clock.clone(), config);
    let queries = LedgerQueries::new(adapter.clone());
    PgBranch {
        db,
        adapter,
        clock,
        engine,
        queries,
    }
}

async fn branch() -> PgBranch {
    branch_with(EngineConfig::default()).await
}

fn alice() -> AccountRef {
    AccountRef::parse("alice")
}

fn bob() -> AccountRef {
    AccountRef::parse("bob")
}

async fn balance(branch: &PgBranch, id: AccountId) -> Decimal {
    branch.adapter.get(id).await.unwrap().balance
}

mod operations {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_deposit_withdraw_and_transfer_persist() {
        let branch = branch().await;
        let teller = BranchFixtures::teller_id();

        let receipt = branch.engine.deposit(&alice(), "50.00", teller).await.unwrap();
        assert_receipt_balance(&receipt, BranchFixtures::alice_id(), dec!(150.00));

        branch.engine.withdraw(&bob(), "2.50", teller).await.unwrap();

        let receipt = branch.engine.transfer(&alice(), &bob(), "30.00", None).await.unwrap();
        assert_matched_transfer(&receipt.entries, BranchFixtures::alice_id(), BranchFixtures::bob_id());

        assert_eq!(balance(&branch, BranchFixtures::alice_id()).await, dec!(120.00));
        assert_eq!(balance(&branch, BranchFixtures::bob_id()).await, dec!(32.50));

        // Timestamps come back in the branch offset, exactly as written
        let entries = branch.queries.history(&alice()).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.occurred_at == TemporalFixtures::business_day_open()));
        assert!(entries.iter().all(|e| e.occurred_at.offset().local_minus_utc() == 7200));
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_insufficient_funds_changes_nothing() {
        let branch = branch().await;

        let result = branch.engine.transfer(&bob(), &alice(), "5.01", None).await;
        assert_ledger_error(result, "insufficient_funds");

        assert_eq!(balance(&branch, BranchFixtures::bob_id()).await, dec!(5.00));
        assert_eq!(balance(&branch, BranchFixtures::alice_id()).await, dec!(100.00));
        assert!(branch.adapter.all_entries(&EntryQuery::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_balance_ceiling_matches_column_capacity() {
        let branch = branch().await;
        let ceiling = core_kernel::money::MAX_BALANCE;
        let rich = TestAccountBuilder::new(40)
            .with_username("vault")
            .with_balance(ceiling - dec!(1.00))
            .build();
        branch.adapter.insert_account(&rich).await.unwrap();
        let vault = AccountRef::parse("vault");

        let result = branch
            .engine
            .deposit(&vault, "5.00", BranchFixtures::teller_id())
            .await;
        assert_ledger_error(result, "balance_limit");

        let result = branch.engine.transfer(&alice(), &vault, "5.00", None).await;
        assert_ledger_error(result, "balance_limit");
        assert_eq!(balance(&branch, BranchFixtures::alice_id()).await, dec!(100.00));

        branch
            .engine
            .deposit(&vault, "1.00", BranchFixtures::teller_id())
            .await
            .unwrap();
        assert_eq!(balance(&branch, AccountId::new(40)).await, ceiling);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_unknown_account_is_not_found() {
        let branch = branch().await;

        let result = branch
            .engine
            .transfer(&alice(), &AccountRef::parse("999"), "1.00", None)
            .await;
        assert_ledger_error(result, "not_found");

        let result = branch
            .adapter
            .begin(&LockSet::new([AccountId::new(999)]), Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(e) if e.is_not_found()));
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_duplicate_username_is_rejected() {
        let branch = branch().await;

        let duplicate = TestAccountBuilder::new(50).with_username("alice").build();
        assert!(branch.adapter.insert_account(&duplicate).await.is_err());
        assert_eq!(branch.queries.accounts().await.unwrap().len(), 2);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_ledger_rows_cannot_be_rewritten() {
        let branch = branch().await;
        branch
            .engine
            .deposit(&alice(), "1.00", BranchFixtures::teller_id())
            .await
            .unwrap();

        let update = sqlx::query("UPDATE ledger_entries SET amount = 1000")
            .execute(branch.db.pool())
            .await;
        assert!(update.is_err());

        let delete = sqlx::query("DELETE FROM ledger_entries")
            .execute(branch.db.pool())
            .await;
        assert!(delete.is_err());
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_health_check_reports_serving() {
        let branch = branch().await;
        assert!(branch.adapter.health_check().await.is_serving());
    }
}

mod locking {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_held_lock_times_out_as_busy() {
        let branch = branch_with(EngineConfig {
            lock_timeout_ms: 200,
            ..EngineConfig::default()
        })
        .await;

        let held = branch
            .adapter
            .begin(&LockSet::new([BranchFixtures::bob_id()]), Duration::from_secs(1))
            .await
            .unwrap();

        let result = branch.engine.transfer(&alice(), &bob(), "1.00", None).await;
        assert_ledger_error(result, "busy");

        held.rollback().await.unwrap();
        branch.engine.transfer(&alice(), &bob(), "1.00", None).await.unwrap();
        assert_eq!(balance(&branch, BranchFixtures::bob_id()).await, dec!(6.00));
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_dropped_unit_rolls_back() {
        let branch = branch().await;
        let alice_id = BranchFixtures::alice_id();

        {
            let mut unit = branch
                .adapter
                .begin(&LockSet::new([alice_id]), Duration::from_secs(1))
                .await
                .unwrap();
            let amount = test_utils::MoneyFixtures::amount("40.00");
            unit.apply_delta(alice_id, amount.debit(), Decimal::ZERO).await.unwrap();
        }

        assert_eq!(balance(&branch, alice_id).await, dec!(100.00));
        branch.engine.deposit(&alice(), "1.00", BranchFixtures::teller_id()).await.unwrap();
        assert_eq!(balance(&branch, alice_id).await, dec!(101.00));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "requires Docker"]
    async fn test_opposing_transfers_conserve_money() {
        let branch = branch().await;
        let engine = Arc::new(branch.engine.clone());

        let mut handles = Vec::new();
        for i in 0..40 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                let (from, to) = if i % 2 == 0 { (alice(), bob()) } else { (bob(), alice()) };
                engine.transfer(&from, &to, "1.00", None).await
            }));
        }
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => {}
                Err(e) => assert!(
                    matches!(e.code(), "insufficient_funds" | "busy"),
                    "unexpected failure: {e}"
                ),
            }
        }

        let alice_balance = balance(&branch, BranchFixtures::alice_id()).await;
        let bob_balance = balance(&branch, BranchFixtures::bob_id()).await;
        assert_eq!(alice_balance + bob_balance, dec!(105.00));

        let reconciliation = branch.queries.reconcile(None).await.unwrap();
        assert!(reconciliation.is_balanced());
        assert!(reconciliation.unmatched.is_empty());
    }
}

mod queries {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_pages_resume_from_cursor() {
        let branch = branch().await;
        for _ in 0..25 {
            branch.clock.advance(ChronoDuration::seconds(1));
            branch
                .engine
                .deposit(&alice(), "1.00", BranchFixtures::teller_id())
                .await
                .unwrap();
        }

        let first = branch.queries.page(&alice(), &EntryQuery::latest(10)).await.unwrap();
        assert_eq!(first.len(), 10);
        assert_newest_first(&first);

        let cursor = first.last().unwrap().cursor();
        let second = branch
            .queries
            .page(&alice(), &EntryQuery::latest(10).after(cursor))
            .await
            .unwrap();
        assert_eq!(second.len(), 10);
        assert!(second[0].cursor() < cursor);

        let cursor = second.last().unwrap().cursor();
        let third = branch
            .queries
            .page(&alice(), &EntryQuery::latest(10).after(cursor))
            .await
            .unwrap();
        assert_eq!(third.len(), 5);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_same_instant_entries_order_by_id() {
        let branch = branch().await;
        branch.engine.transfer(&alice(), &bob(), "3.00", None).await.unwrap();

        let entries = branch.adapter.all_entries(&EntryQuery::latest(10)).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].occurred_at, entries[1].occurred_at);
        assert!(entries[0].id > entries[1].id);
        assert_eq!(entries[0].kind, EntryKind::TransferIn);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_report_joins_names() {
        let branch = branch().await;
        branch
            .engine
            .deposit(&alice(), "10.00", BranchFixtures::teller_id())
            .await
            .unwrap();
        branch.engine.transfer(&alice(), &bob(), "2.00", None).await.unwrap();

        let rows = branch.queries.report(&EntryQuery::latest(10)).await.unwrap();
        assert_eq!(rows.len(), 3);

        let deposit = rows.iter().find(|r| r.entry.kind == EntryKind::Deposit).unwrap();
        assert_eq!(deposit.account_username.as_deref(), Some("alice"));
        assert_eq!(deposit.employee_full_name.as_deref(), Some("Omar Fathy"));

        let incoming = rows.iter().find(|r| r.entry.kind == EntryKind::TransferIn).unwrap();
        assert_eq!(incoming.account_full_name.as_deref(), Some("Bob Nabil"));
        assert_eq!(incoming.employee_username, None);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_lookup_prefers_identifier_then_name() {
        let branch = branch().await;
        let numeric = TestAccountBuilder::new(3).with_username("1001").build();
        branch.adapter.insert_account(&numeric).await.unwrap();

        assert_eq!(branch.queries.lookup("2").await.unwrap().username, "bob");
        assert_eq!(branch.queries.lookup("1001").await.unwrap().id, AccountId::new(3));
        assert!(branch.queries.lookup("carol").await.unwrap_err().is_not_found());
    }
}
