//! One bad order or one bad config does not hold back the rest.

use osync_db::SyncStore;
use osync_ledger::LedgerError;
use osync_schemas::SyncStatus;
use osync_testkit::*;

#[tokio::test]
async fn one_unresolvable_order_does_not_block_others() -> anyhow::Result<()> {
    let h = Harness::new();
    h.add_config("shop", "cp-1").await?;
    h.target.set_catalog(vec![catalog_entry("A"), catalog_entry("B")]);

    for i in 0..4 {
        h.source.put_order(
            source_order(&format!("ok-{i}"), "cp-1", 100, READY_STATE),
            vec![position("A", 1.0, 100)],
        );
    }
    h.source.put_order(
        source_order("bad", "cp-1", 100, READY_STATE),
        vec![position("MISSING", 1.0, 100)],
    );

    let report = h.engine.run_full().await?;
    assert_eq!(report.materialize.synced, 4);
    assert_eq!(report.materialize.pending, 1);

    let synced = h.store.list_by_status(SyncStatus::Synced).await?;
    assert_eq!(synced.len(), 4);
    let bad = h.store.find_by_source_id("bad").await?.expect("tracked");
    assert_eq!(bad.sync_status, SyncStatus::Pending);
    h.assert_invariants();
    Ok(())
}

#[tokio::test]
async fn positions_fetch_failure_is_isolated_to_its_order() -> anyhow::Result<()> {
    let h = Harness::new();
    h.add_config("shop", "cp-1").await?;
    h.target.set_catalog(vec![catalog_entry("A")]);
    h.source.put_order(source_order("a", "cp-1", 100, READY_STATE), vec![position("A", 1.0, 100)]);
    h.source.put_order(source_order("b", "cp-1", 100, READY_STATE), vec![position("A", 1.0, 100)]);
    h.source.fail_positions_for("a", LedgerError::Transport("connection reset".into()));

    let report = h.engine.run_full().await?;
    assert_eq!(report.materialize.synced, 1);
    assert_eq!(report.materialize.pending, 1);

    let a = h.store.find_by_source_id("a").await?.expect("tracked");
    assert_eq!(a.sync_status, SyncStatus::Pending);
    assert!(a.error_msg.as_deref().unwrap_or("").contains("connection reset"));
    Ok(())
}

#[tokio::test]
async fn failing_config_does_not_stop_discovery_of_others() -> anyhow::Result<()> {
    let h = Harness::new();
    h.add_config("broken", "cp-broken").await?;
    h.add_config("shop", "cp-1").await?;
    h.source.fail_find_for(
        &counterparty_href("cp-broken"),
        LedgerError::Unavailable { status: 502, message: "bad gateway".into() },
    );
    h.source.put_order(source_order("o1", "cp-1", 100, READY_STATE), vec![]);

    let report = h.engine.run_discovery().await?;
    assert_eq!(report.configs_scanned, 2);
    assert_eq!(report.configs_failed, 1);
    assert_eq!(report.inserted, 1);
    assert!(report.errors[0].contains("bad gateway"));
    assert!(h.store.find_by_source_id("o1").await?.is_some());
    Ok(())
}

#[tokio::test]
async fn non_transient_outcomes_move_to_failed() -> anyhow::Result<()> {
    let h = Harness::new();
    let inactive = h.add_config("inactive", "cp-off").await?;
    h.add_config("shop", "cp-1").await?;
    h.target.set_catalog(vec![catalog_entry("A")]);

    h.source.put_order(source_order("off", "cp-off", 100, READY_STATE), vec![position("A", 1.0, 100)]);
    h.source.put_order(source_order("zero", "cp-1", 100, READY_STATE), vec![position("A", 0.0, 100)]);
    h.engine.run_discovery().await?;

    // Config switched off after the order was tracked.
    h.store.set_config_active(inactive.id, false);
    let report = h.engine.run_materialization().await?;
    assert_eq!(report.failed, 2);

    let off = h.store.find_by_source_id("off").await?.expect("tracked");
    assert_eq!(off.sync_status, SyncStatus::Failed);
    assert!(off.error_msg.as_deref().unwrap_or("").contains("inactive"));

    let zero = h.store.find_by_source_id("zero").await?.expect("tracked");
    assert_eq!(zero.sync_status, SyncStatus::Failed);
    assert!(zero.error_msg.as_deref().unwrap_or("").contains("quantity"));

    // FAILED rows leave the automatic loop.
    let again = h.engine.run_materialization().await?;
    assert_eq!(again.attempted, 0);
    assert_eq!(h.target.create_attempts(), 0);
    h.assert_invariants();
    Ok(())
}

#[tokio::test]
async fn rejected_create_is_failed() -> anyhow::Result<()> {
    let h = Harness::new();
    h.add_config("shop", "cp-1").await?;
    h.target.set_catalog(vec![catalog_entry("A")]);
    h.source.put_order(source_order("o1", "cp-1", 100, READY_STATE), vec![position("A", 1.0, 100)]);
    h.target.fail_creates(Some(LedgerError::Rejected {
        status: 412,
        message: "store archived".into(),
    }));

    let report = h.engine.run_full().await?;
    assert_eq!(report.materialize.failed, 1);
    let row = h.store.find_by_source_id("o1").await?.expect("tracked");
    assert_eq!(row.sync_status, SyncStatus::Failed);
    assert!(row.error_msg.as_deref().unwrap_or("").contains("store archived"));
    Ok(())
}

#[tokio::test]
async fn catalog_failure_fails_the_pass_without_touching_rows() -> anyhow::Result<()> {
    let h = Harness::new();
    h.add_config("shop", "cp-1").await?;
    h.source.put_order(source_order("o1", "cp-1", 100, READY_STATE), vec![position("A", 1.0, 100)]);
    h.engine.run_discovery().await?;

    h.target.fail_catalog(Some(LedgerError::Transport("timeout".into())));
    assert!(h.engine.run_materialization().await.is_err());

    let row = h.store.find_by_source_id("o1").await?.expect("tracked");
    assert_eq!(row.sync_status, SyncStatus::Pending);
    assert!(row.error_msg.is_none());
    Ok(())
}
