//! In-memory [`SyncStore`] with the same semantics as the Postgres store:
//! unique source ids, invariant-checked saves, newest-first listing.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use osync_db::{ensure_order_invariant, SyncStore};
use osync_schemas::{
    NewSyncConfig, NewSyncOrder, Page, SyncConfig, SyncOrder, SyncOrderFilter, SyncStatus,
};

#[derive(Debug, Default)]
struct Inner {
    configs: Vec<SyncConfig>,
    orders: Vec<SyncOrder>,
    next_config_id: i64,
    next_order_id: i64,
    insert_batches: u32,
    fail_save_for: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Snapshot of every tracked order, by id.
    pub fn all_orders(&self) -> Vec<SyncOrder> {
        self.lock().orders.clone()
    }

    /// Number of non-empty `insert_orders` calls.
    pub fn insert_batches(&self) -> u32 {
        self.lock().insert_batches
    }

    /// Make every later `save_order` for this source id fail.
    pub fn fail_saves_for(&self, ms1_order_id: &str) {
        self.lock().fail_save_for.insert(ms1_order_id.to_string());
    }

    pub fn clear_save_failures(&self) {
        self.lock().fail_save_for.clear();
    }

    pub fn set_config_active(&self, id: i64, active: bool) {
        let mut g = self.lock();
        if let Some(c) = g.configs.iter_mut().find(|c| c.id == id) {
            c.is_active = active;
            c.updated_at = Utc::now();
        }
    }

    /// Put a row in an arbitrary state, bypassing the engine.
    pub fn overwrite_order(&self, order: SyncOrder) {
        let mut g = self.lock();
        if let Some(slot) = g.orders.iter_mut().find(|o| o.id == order.id) {
            *slot = order;
        }
    }
}

fn matches_filter(o: &SyncOrder, f: &SyncOrderFilter) -> bool {
    if f.sync_status.is_some_and(|s| s != o.sync_status) {
        return false;
    }
    if f.modification_status.is_some() && f.modification_status != o.modification_status {
        return false;
    }
    if f.config_id.is_some_and(|c| c != o.config_id) {
        return false;
    }
    if f.created_after.is_some_and(|t| o.created < t) {
        return false;
    }
    if f.created_before.is_some_and(|t| o.created > t) {
        return false;
    }
    if let Some(term) = f.search_term() {
        let needle = term.to_lowercase();
        let hit = [
            Some(o.ms1_order_id.as_str()),
            o.ms2_purchase_id.as_deref(),
            o.info_msg.as_deref(),
            o.error_msg.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|s| s.to_lowercase().contains(&needle));
        if !hit {
            return false;
        }
    }
    true
}

#[async_trait::async_trait]
impl SyncStore for MemStore {
    async fn list_active_configs(&self) -> Result<Vec<SyncConfig>> {
        Ok(self.lock().configs.iter().filter(|c| c.is_active).cloned().collect())
    }

    async fn list_configs(&self) -> Result<Vec<SyncConfig>> {
        Ok(self.lock().configs.clone())
    }

    async fn get_config(&self, id: i64) -> Result<Option<SyncConfig>> {
        Ok(self.lock().configs.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_config(&self, cfg: &NewSyncConfig) -> Result<SyncConfig> {
        let mut g = self.lock();
        g.next_config_id += 1;
        let now = Utc::now();
        let row = SyncConfig {
            id: g.next_config_id,
            name: cfg.name.clone(),
            source_counterparty_id: cfg.source_counterparty_id.clone(),
            target_organization_id: cfg.target_organization_id.clone(),
            target_group_id: cfg.target_group_id.clone(),
            target_store_id: cfg.target_store_id.clone(),
            start_sync_datetime: cfg.start_sync_datetime,
            description: cfg.description.clone(),
            is_active: cfg.is_active,
            created_at: now,
            updated_at: now,
        };
        g.configs.push(row.clone());
        Ok(row)
    }

    async fn get_order(&self, id: i64) -> Result<Option<SyncOrder>> {
        Ok(self.lock().orders.iter().find(|o| o.id == id).cloned())
    }

    async fn find_by_source_id(&self, ms1_order_id: &str) -> Result<Option<SyncOrder>> {
        Ok(self
            .lock()
            .orders
            .iter()
            .find(|o| o.ms1_order_id == ms1_order_id)
            .cloned())
    }

    async fn insert_orders(&self, rows: &[NewSyncOrder]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut g = self.lock();
        g.insert_batches += 1;
        let mut inserted = 0;
        for r in rows {
            if g.orders.iter().any(|o| o.ms1_order_id == r.ms1_order_id) {
                continue;
            }
            if !g.configs.iter().any(|c| c.id == r.config_id) {
                bail!("insert_orders: config {} does not exist", r.config_id);
            }
            g.next_order_id += 1;
            let now = Utc::now();
            let row = SyncOrder {
                id: g.next_order_id,
                ms1_order_id: r.ms1_order_id.clone(),
                ms2_purchase_id: None,
                ms1_state_href: r.ms1_state_href.clone(),
                order_amount: r.order_amount,
                sync_status: r.sync_status,
                modification_status: None,
                info_msg: None,
                error_msg: None,
                moment: r.moment,
                config_id: r.config_id,
                created: now,
                modified: now,
            };
            g.orders.push(row);
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn save_order(&self, order: &SyncOrder) -> Result<SyncOrder> {
        ensure_order_invariant(order)?;
        let mut g = self.lock();
        if g.fail_save_for.contains(&order.ms1_order_id) {
            bail!("injected save failure for {}", order.ms1_order_id);
        }
        let slot = g
            .orders
            .iter_mut()
            .find(|o| o.id == order.id)
            .ok_or_else(|| anyhow!("save_order: sync order id={} does not exist", order.id))?;
        let mut updated = order.clone();
        updated.created = slot.created;
        updated.modified = Utc::now();
        *slot = updated.clone();
        Ok(updated)
    }

    async fn list_by_status(&self, status: SyncStatus) -> Result<Vec<SyncOrder>> {
        Ok(self
            .lock()
            .orders
            .iter()
            .filter(|o| o.sync_status == status)
            .cloned()
            .collect())
    }

    async fn list_orders(&self, filter: &SyncOrderFilter) -> Result<Page<SyncOrder>> {
        let (skip, limit) = filter.window();
        let mut hits: Vec<SyncOrder> = self
            .lock()
            .orders
            .iter()
            .filter(|o| matches_filter(o, filter))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.created.cmp(&a.created).then(b.id.cmp(&a.id)));
        let total = hits.len() as i64;
        let items = hits
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect();
        Ok(Page {
            items,
            total,
            skip,
            limit,
        })
    }
}
