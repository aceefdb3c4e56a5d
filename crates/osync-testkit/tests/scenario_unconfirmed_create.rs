//! A create whose response is lost or garbled never leads to a second
//! target document: the next attempt finds the first one by external code.

use osync_db::SyncStore;
use osync_engine::SyncError;
use osync_ledger::LedgerError;
use osync_schemas::SyncStatus;
use osync_testkit::*;

fn garbled() -> LedgerError {
    LedgerError::Decode("entity/purchaseorder: expected value at line 1 column 1".into())
}

async fn harness_with_order() -> anyhow::Result<Harness> {
    let h = Harness::new();
    h.add_config("shop", "cp-1").await?;
    h.target.set_catalog(vec![catalog_entry("A")]);
    h.source.put_order(source_order("o1", "cp-1", 100, READY_STATE), vec![position("A", 1.0, 100)]);
    Ok(h)
}

#[tokio::test]
async fn garbled_create_response_keeps_order_pending() -> anyhow::Result<()> {
    let h = harness_with_order().await?;
    h.target.fail_creates_after_commit(Some(garbled()));

    let report = h.engine.run_full().await?;
    assert_eq!(report.materialize.pending, 1);
    assert_eq!(report.materialize.failed, 0);

    let row = h.store.find_by_source_id("o1").await?.expect("tracked");
    assert_eq!(row.sync_status, SyncStatus::Pending);
    assert!(row.ms2_purchase_id.is_none());
    let msg = row.error_msg.unwrap_or_default();
    assert!(msg.contains("unconfirmed"), "{msg}");
    assert!(!msg.contains("source document"), "{msg}");
    assert_eq!(h.target.create_count(), 1);

    h.target.fail_creates_after_commit(None);
    let report = h.engine.run_materialization().await?;
    assert_eq!(report.synced, 1);

    let row = h.store.find_by_source_id("o1").await?.expect("tracked");
    assert_eq!(row.sync_status, SyncStatus::Synced);
    assert_eq!(row.ms2_purchase_id.as_deref(), Some("po-1"));
    assert!(row.error_msg.is_none());
    assert_eq!(h.target.create_count(), 1);
    assert_eq!(h.target.create_attempts(), 1);
    h.assert_invariants();
    Ok(())
}

#[tokio::test]
async fn manual_resync_adopts_document_instead_of_creating() -> anyhow::Result<()> {
    let h = harness_with_order().await?;
    h.target.fail_creates_after_commit(Some(garbled()));
    h.engine.run_full().await?;
    h.target.fail_creates_after_commit(None);

    let row = h.store.find_by_source_id("o1").await?.expect("tracked");
    let synced = h.engine.resync_order(row.id).await?;

    assert_eq!(synced.sync_status, SyncStatus::Synced);
    assert_eq!(synced.ms2_purchase_id.as_deref(), Some("po-1"));
    assert_eq!(h.target.create_count(), 1);
    h.assert_invariants();
    Ok(())
}

#[tokio::test]
async fn lookup_outage_defers_create() -> anyhow::Result<()> {
    let h = harness_with_order().await?;
    h.target.fail_lookups(Some(LedgerError::Unavailable {
        status: 503,
        message: "maintenance".into(),
    }));

    h.engine.run_full().await?;
    let row = h.store.find_by_source_id("o1").await?.expect("tracked");
    assert_eq!(row.sync_status, SyncStatus::Pending);
    assert_eq!(h.target.create_attempts(), 0);

    let err = h.engine.resync_order(row.id).await.unwrap_err();
    assert!(matches!(err, SyncError::Transient(_)), "{err:?}");
    assert_eq!(h.target.create_attempts(), 0);

    h.target.fail_lookups(None);
    h.engine.run_materialization().await?;
    assert_eq!(h.target.create_count(), 1);
    assert!(h.target.lookup_calls() >= 3);
    h.assert_invariants();
    Ok(())
}
