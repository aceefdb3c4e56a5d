//! Scheduler ticks run passes; shutdown stops them between orders and waits
//! for the order in progress.

use std::sync::Arc;
use std::time::Duration;

use osync_config::SchedulerSettings;
use osync_daemon::{
    gate::BearerTokenGate,
    state::{drain_scheduler, spawn_scheduler, AppState, BusMsg},
};
use osync_db::SyncStore;
use osync_schemas::SyncStatus;
use osync_testkit::*;

fn settings() -> SchedulerSettings {
    SchedulerSettings {
        discovery_interval_secs: 1,
        materialize_interval_secs: 1,
        reconcile_interval_secs: 0,
    }
}

#[tokio::test]
async fn scheduler_discovers_and_materializes() {
    let h = Harness::new();
    h.add_config("shop", "cp-1").await.unwrap();
    h.target.set_catalog(vec![catalog_entry("A")]);
    h.source.put_order(source_order("o1", "cp-1", 100, READY_STATE), vec![position("A", 1.0, 100)]);

    let st = Arc::new(AppState::new(Arc::clone(&h.engine), Arc::new(BearerTokenGate::new("t"))));
    let mut rx = st.bus.subscribe();
    let handles = spawn_scheduler(Arc::clone(&st), &settings()).await;
    assert_eq!(handles.len(), 2);
    assert!(st.snapshot().await.scheduler_running);

    let mut synced = false;
    for _ in 0..50 {
        if h.store.list_by_status(SyncStatus::Synced).await.unwrap().len() == 1 {
            synced = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(synced, "scheduled passes should sync the order");
    assert_eq!(h.target.create_count(), 1);

    let mut saw_pass = false;
    while let Ok(msg) = rx.try_recv() {
        if matches!(msg, BusMsg::PassCompleted { .. }) {
            saw_pass = true;
        }
    }
    assert!(saw_pass, "pass results are published on the bus");

    st.begin_shutdown().await;
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(3), handle)
            .await
            .expect("scheduler loop did not stop")
            .unwrap();
    }
    assert!(st.snapshot().await.stopping);
}

#[tokio::test]
async fn shutdown_before_first_tick_runs_nothing() {
    let h = Harness::new();
    h.add_config("shop", "cp-1").await.unwrap();
    h.source.put_order(source_order("o1", "cp-1", 100, READY_STATE), vec![]);

    let st = Arc::new(AppState::new(Arc::clone(&h.engine), Arc::new(BearerTokenGate::new("t"))));
    st.begin_shutdown().await;

    let mut with_reconcile = settings();
    with_reconcile.reconcile_interval_secs = 1;
    let handles = spawn_scheduler(Arc::clone(&st), &with_reconcile).await;
    assert_eq!(handles.len(), 3);
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(3), handle)
            .await
            .expect("scheduler loop did not stop")
            .unwrap();
    }
    assert_eq!(h.source.find_calls(), 0);
    assert!(h.store.all_orders().is_empty());
}

fn harness_with_ready_order() -> Harness {
    let h = Harness::new();
    h.target.set_catalog(vec![catalog_entry("A")]);
    h.source.put_order(source_order("o1", "cp-1", 100, READY_STATE), vec![position("A", 1.0, 100)]);
    h
}

async fn wait_for_stored_document(h: &Harness) {
    for _ in 0..50 {
        if h.target.create_count() == 1 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("no purchase document was created");
}

#[tokio::test]
async fn shutdown_mid_create_still_records_the_document() {
    let h = harness_with_ready_order();
    h.add_config("shop", "cp-1").await.unwrap();
    h.target.delay_creates(Some(Duration::from_millis(1500)));

    let st = Arc::new(AppState::new(Arc::clone(&h.engine), Arc::new(BearerTokenGate::new("t"))));
    let handles = spawn_scheduler(Arc::clone(&st), &settings()).await;

    // Document stored remotely, response still in flight.
    wait_for_stored_document(&h).await;
    st.begin_shutdown().await;
    assert!(drain_scheduler(handles, Duration::from_secs(10)).await);

    let row = h.store.find_by_source_id("o1").await.unwrap().expect("tracked");
    assert_eq!(row.sync_status, SyncStatus::Synced);
    assert_eq!(row.ms2_purchase_id.as_deref(), Some("po-1"));
    assert_eq!(h.target.create_count(), 1);
    h.assert_invariants();
}

#[tokio::test]
async fn idle_loops_wake_on_shutdown() {
    let h = Harness::new();
    let st = Arc::new(AppState::new(Arc::clone(&h.engine), Arc::new(BearerTokenGate::new("t"))));
    let slow = SchedulerSettings {
        discovery_interval_secs: 3600,
        materialize_interval_secs: 3600,
        reconcile_interval_secs: 3600,
    };
    let handles = spawn_scheduler(Arc::clone(&st), &slow).await;

    // Let the immediate first ticks run, then the loops sit idle.
    tokio::time::sleep(Duration::from_millis(300)).await;
    st.begin_shutdown().await;
    assert!(drain_scheduler(handles, Duration::from_secs(3)).await);
}

#[tokio::test]
async fn drain_reports_an_overrun_grace_period() {
    let h = harness_with_ready_order();
    h.add_config("shop", "cp-1").await.unwrap();
    h.target.delay_creates(Some(Duration::from_secs(5)));

    let st = Arc::new(AppState::new(Arc::clone(&h.engine), Arc::new(BearerTokenGate::new("t"))));
    let handles = spawn_scheduler(Arc::clone(&st), &settings()).await;
    wait_for_stored_document(&h).await;

    st.begin_shutdown().await;
    assert!(!drain_scheduler(handles, Duration::from_millis(200)).await);
}
