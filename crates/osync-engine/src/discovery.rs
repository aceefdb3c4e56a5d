use std::collections::HashSet;

use osync_reconcile::is_ready_state;
use osync_schemas::{EntityKind, NewSyncOrder, OrderQuery, SyncConfig, SyncStatus};
use tracing::{info, warn};

use crate::{DiscoveryReport, ReconcileOutcome, SyncEngine, SyncError};

impl SyncEngine {
    /// Query the source ledger for every active config and track new orders.
    ///
    /// Orders already tracked as SYNCED or WAITING_FOR_CONFIRM are reconciled
    /// inline with the fetched document. New rows are inserted per config in
    /// one batch. One config failing does not stop the others.
    pub async fn run_discovery(&self) -> Result<DiscoveryReport, SyncError> {
        let mut report = DiscoveryReport::default();

        let configs = self.store.list_active_configs().await.map_err(SyncError::store)?;
        for cfg in configs {
            if self.is_stopping() {
                report.stopped = true;
                break;
            }
            report.configs_scanned += 1;
            if let Err(e) = self.discover_for_config(&cfg, &mut report).await {
                report.configs_failed += 1;
                report.errors.push(format!("config {}: {e}", cfg.id));
                warn!(config_id = cfg.id, error = %e, "discovery failed for config");
            }
        }

        info!(
            configs = report.configs_scanned,
            failed = report.configs_failed,
            seen = report.orders_seen,
            inserted = report.inserted,
            drift_flagged = report.drift_flagged,
            promoted = report.promoted,
            "discovery pass finished"
        );
        Ok(report)
    }

    async fn discover_for_config(
        &self,
        cfg: &SyncConfig,
        report: &mut DiscoveryReport,
    ) -> Result<(), SyncError> {
        let query = OrderQuery {
            counterparty: self
                .source
                .entity_ref(EntityKind::Counterparty, &cfg.source_counterparty_id),
            states: self.ready_states.clone(),
            moment_after: cfg.start_sync_datetime,
        };
        let orders = self
            .source
            .find_orders(&query)
            .await
            .map_err(SyncError::from_ledger)?;

        let mut new_rows: Vec<NewSyncOrder> = Vec::new();
        let mut batch_ids: HashSet<String> = HashSet::new();

        for order in &orders {
            if self.is_stopping() {
                report.stopped = true;
                break;
            }
            report.orders_seen += 1;

            let existing = self
                .store
                .find_by_source_id(&order.id)
                .await
                .map_err(SyncError::store)?;

            match existing {
                None => {
                    if !batch_ids.insert(order.id.clone()) {
                        continue;
                    }
                    let status = if is_ready_state(&order.state_href, &self.ready_states) {
                        SyncStatus::Pending
                    } else {
                        SyncStatus::WaitingForConfirm
                    };
                    new_rows.push(NewSyncOrder {
                        ms1_order_id: order.id.clone(),
                        ms1_state_href: order.state_href.clone(),
                        order_amount: order.amount,
                        sync_status: status,
                        moment: order.moment,
                        config_id: cfg.id,
                    });
                }
                Some(row)
                    if matches!(
                        row.sync_status,
                        SyncStatus::Synced | SyncStatus::WaitingForConfirm
                    ) =>
                {
                    match self.reconcile_tracked(&row.ms1_order_id, order).await {
                        Ok(ReconcileOutcome::DriftFlagged) => report.drift_flagged += 1,
                        Ok(ReconcileOutcome::Promoted) => report.promoted += 1,
                        Ok(ReconcileOutcome::StateUpdated) => report.state_updated += 1,
                        Ok(ReconcileOutcome::Busy) => report.skipped_busy += 1,
                        Ok(ReconcileOutcome::Unchanged) => {}
                        Err(e) => report.errors.push(format!("{}: {e}", row.ms1_order_id)),
                    }
                }
                Some(_) => {}
            }
        }

        // Commit what was collected even if the pass is stopping.
        let inserted = self
            .store
            .insert_orders(&new_rows)
            .await
            .map_err(SyncError::store)?;
        report.inserted += inserted;

        info!(
            config_id = cfg.id,
            fetched = orders.len(),
            inserted,
            "config discovered"
        );
        Ok(())
    }
}
