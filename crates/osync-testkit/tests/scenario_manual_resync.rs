use std::sync::atomic::Ordering;

use osync_db::SyncStore;
use osync_engine::SyncError;
use osync_ledger::LedgerError;
use osync_schemas::SyncStatus;
use osync_testkit::*;

#[tokio::test]
async fn resync_surfaces_error_after_persisting_it() -> anyhow::Result<()> {
    let h = Harness::new();
    h.add_config("shop", "cp-1").await?;
    h.source.put_order(source_order("o1", "cp-1", 100, READY_STATE), vec![position("NOPE", 1.0, 100)]);
    h.engine.run_discovery().await?;
    let row = h.store.find_by_source_id("o1").await?.expect("tracked");

    let err = h.engine.resync_order(row.id).await.unwrap_err();
    assert!(matches!(err, SyncError::Unresolvable(_)), "{err:?}");

    let row = h.store.find_by_source_id("o1").await?.expect("tracked");
    assert_eq!(row.sync_status, SyncStatus::Pending);
    assert!(row.error_msg.as_deref().unwrap_or("").contains("NOPE"));
    Ok(())
}

#[tokio::test]
async fn resync_brings_failed_order_back() -> anyhow::Result<()> {
    let h = Harness::new();
    h.add_config("shop", "cp-1").await?;
    h.target.set_catalog(vec![catalog_entry("A")]);
    h.source.put_order(source_order("o1", "cp-1", 100, READY_STATE), vec![position("A", 1.0, 100)]);
    h.source.fail_positions_for("o1", LedgerError::Decode("garbled".into()));

    h.engine.run_full().await?;
    let row = h.store.find_by_source_id("o1").await?.expect("tracked");
    assert_eq!(row.sync_status, SyncStatus::Failed);

    h.source.clear_positions_failure("o1");
    let synced = h.engine.resync_order(row.id).await?;
    assert_eq!(synced.sync_status, SyncStatus::Synced);
    assert!(synced.ms2_purchase_id.is_some());
    assert!(synced.error_msg.is_none());
    assert_eq!(h.target.create_count(), 1);
    h.assert_invariants();
    Ok(())
}

#[tokio::test]
async fn resync_of_unknown_or_busy_order() -> anyhow::Result<()> {
    let h = Harness::new();
    h.add_config("shop", "cp-1").await?;
    h.target.set_catalog(vec![catalog_entry("A")]);
    h.source.put_order(source_order("o1", "cp-1", 100, READY_STATE), vec![position("A", 1.0, 100)]);
    h.engine.run_discovery().await?;
    let row = h.store.find_by_source_id("o1").await?.expect("tracked");

    let err = h.engine.resync_order(9999).await.unwrap_err();
    assert!(matches!(err, SyncError::NotFound(_)));

    let claim = h.engine.in_flight().try_claim("o1").expect("claim");
    let err = h.engine.resync_order(row.id).await.unwrap_err();
    assert!(matches!(err, SyncError::Busy(_)));

    // The scheduled pass skips it too.
    let report = h.engine.run_materialization().await?;
    assert_eq!(report.skipped_busy, 1);
    assert_eq!(h.target.create_count(), 0);

    drop(claim);
    let report = h.engine.run_materialization().await?;
    assert_eq!(report.synced, 1);
    Ok(())
}

#[tokio::test]
async fn stop_flag_halts_pass_between_orders() -> anyhow::Result<()> {
    let h = Harness::new();
    h.add_config("shop", "cp-1").await?;
    h.target.set_catalog(vec![catalog_entry("A")]);
    for i in 0..3 {
        h.source.put_order(
            source_order(&format!("o{i}"), "cp-1", 100, READY_STATE),
            vec![position("A", 1.0, 100)],
        );
    }
    h.engine.run_discovery().await?;

    h.engine.stop_handle().store(true, Ordering::SeqCst);
    let report = h.engine.run_materialization().await?;
    assert!(report.stopped);
    assert_eq!(report.attempted, 0);
    assert_eq!(h.target.create_attempts(), 0);
    assert_eq!(h.store.list_by_status(SyncStatus::Pending).await?.len(), 3);
    Ok(())
}
