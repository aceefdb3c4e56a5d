//! Test doubles and fixtures for the sync engine.
//!
//! `MemStore` and `FakeLedger` stand in for Postgres and the two remote
//! ledgers; `Harness` wires them into a `SyncEngine` the way the daemon does.

mod fake_ledger;
mod mem_store;

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use osync_db::SyncStore;
use osync_engine::SyncEngine;
use osync_schemas::{
    CatalogEntry, EntityKind, EntityRef, NewSyncConfig, SourceOrder, SourcePosition, SyncConfig,
};

pub use fake_ledger::FakeLedger;
pub use mem_store::MemStore;

pub const SOURCE_BASE: &str = "https://source.ledger.test/api/1.2";
pub const TARGET_BASE: &str = "https://target.ledger.test/api/1.2";
pub const READY_STATE: &str = "https://source.ledger.test/api/1.2/entity/customerorder/metadata/states/ready";
pub const READY_STATE_ALT: &str = "https://source.ledger.test/api/1.2/entity/customerorder/metadata/states/ready-2";
pub const NEW_STATE: &str = "https://source.ledger.test/api/1.2/entity/customerorder/metadata/states/new";

pub fn ready_states() -> Vec<String> {
    vec![READY_STATE.to_string(), READY_STATE_ALT.to_string()]
}

/// `y-m-d 00:00:00`.
pub fn day(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

pub fn counterparty_href(cp_id: &str) -> String {
    EntityRef::for_id(SOURCE_BASE, EntityKind::Counterparty, cp_id).href
}

pub fn source_order(id: &str, cp_id: &str, amount: i64, state: &str) -> SourceOrder {
    SourceOrder {
        id: id.to_string(),
        name: Some(format!("SO-{id}")),
        moment: day(2024, 2, 1),
        amount,
        state_href: state.to_string(),
        agent_href: Some(counterparty_href(cp_id)),
    }
}

pub fn position(article: &str, quantity: f64, price: i64) -> SourcePosition {
    SourcePosition {
        quantity,
        price,
        assortment: EntityRef::for_id(SOURCE_BASE, EntityKind::Product, &format!("src-{article}")),
        article: Some(article.to_string()),
    }
}

pub fn catalog_entry(article: &str) -> CatalogEntry {
    CatalogEntry {
        item: EntityRef::for_id(TARGET_BASE, EntityKind::Product, &format!("dst-{article}")),
        article: Some(article.to_string()),
        name: Some(format!("item {article}")),
    }
}

pub fn new_config(name: &str, cp_id: &str) -> NewSyncConfig {
    NewSyncConfig {
        name: name.to_string(),
        source_counterparty_id: cp_id.to_string(),
        target_organization_id: "org-1".to_string(),
        target_group_id: "grp-1".to_string(),
        target_store_id: "store-1".to_string(),
        start_sync_datetime: day(2024, 1, 1),
        description: None,
        is_active: true,
    }
}

/// Engine wired to in-memory collaborators.
pub struct Harness {
    pub store: Arc<MemStore>,
    pub source: Arc<FakeLedger>,
    pub target: Arc<FakeLedger>,
    pub engine: Arc<SyncEngine>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemStore::new());
        let source = Arc::new(FakeLedger::new("source", SOURCE_BASE));
        let target = Arc::new(FakeLedger::new("target", TARGET_BASE));
        let engine = Arc::new(SyncEngine::new(
            store.clone(),
            source.clone(),
            target.clone(),
            ready_states(),
        ));
        Self {
            store,
            source,
            target,
            engine,
        }
    }

    pub async fn add_config(&self, name: &str, cp_id: &str) -> anyhow::Result<SyncConfig> {
        self.store.insert_config(&new_config(name, cp_id)).await
    }

    /// Panics if any tracked order breaks the status invariant.
    pub fn assert_invariants(&self) {
        for o in self.store.all_orders() {
            if let Some(v) = o.invariant_violation() {
                panic!("order {} violates invariant: {v}", o.ms1_order_id);
            }
        }
    }
}
