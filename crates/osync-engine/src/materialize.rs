use osync_schemas::{DocumentRef, SyncOrder, SyncStatus};
use tracing::{error, info, warn};

use crate::document::build_purchase_document;
use crate::state_machine::{apply, SyncEvent};
use crate::{CatalogMapping, MaterializeReport, SyncEngine, SyncError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializeOutcome {
    Synced(DocumentRef),
    /// Row was no longer PENDING (or already had a purchase id) under the guard.
    Stale,
}

impl SyncEngine {
    /// Create target documents for every PENDING order.
    ///
    /// Per-order errors are persisted and counted, never raised. Failing to
    /// list the work or to read the catalog fails the pass.
    pub async fn run_materialization(&self) -> Result<MaterializeReport, SyncError> {
        let mut report = MaterializeReport::default();

        let pending = self
            .store
            .list_by_status(SyncStatus::Pending)
            .await
            .map_err(SyncError::store)?;
        if pending.is_empty() {
            return Ok(report);
        }

        let entries = self
            .target
            .get_catalog_snapshot()
            .await
            .map_err(SyncError::from_ledger)?;
        let catalog = CatalogMapping::from_entries(&entries);
        info!(pending = pending.len(), catalog_items = catalog.len(), "materialization pass started");

        for row in pending {
            if self.is_stopping() {
                report.stopped = true;
                break;
            }

            let Some(_guard) = self.in_flight.try_claim(&row.ms1_order_id) else {
                report.skipped_busy += 1;
                continue;
            };

            report.attempted += 1;
            match self.materialize_claimed(row.clone(), &catalog).await {
                Ok(MaterializeOutcome::Synced(_)) => report.synced += 1,
                Ok(MaterializeOutcome::Stale) => report.skipped_stale += 1,
                Err(SyncError::Store(msg)) => {
                    report.errors.push(format!("{}: {msg}", row.ms1_order_id));
                }
                Err(e) if e.is_retriable() => report.pending += 1,
                Err(_) => report.failed += 1,
            }
        }

        info!(
            attempted = report.attempted,
            synced = report.synced,
            pending = report.pending,
            failed = report.failed,
            skipped_busy = report.skipped_busy,
            "materialization pass finished"
        );
        Ok(report)
    }

    /// Materialize one order. The caller holds the in-flight claim for it.
    ///
    /// Every outcome is committed before returning.
    pub(crate) async fn materialize_claimed(
        &self,
        row: SyncOrder,
        catalog: &CatalogMapping,
    ) -> Result<MaterializeOutcome, SyncError> {
        let row = self
            .store
            .get_order(row.id)
            .await
            .map_err(SyncError::store)?
            .ok_or_else(|| SyncError::NotFound(format!("sync order id={}", row.id)))?;
        if !row.is_materializable() {
            return Ok(MaterializeOutcome::Stale);
        }

        let config = match self.store.get_config(row.config_id).await.map_err(SyncError::store)? {
            Some(c) if c.is_active => c,
            Some(_) => {
                let err = SyncError::Configuration(format!("sync config {} is inactive", row.config_id));
                self.record_failure(row, &err).await?;
                return Err(err);
            }
            None => {
                let err = SyncError::Configuration(format!("sync config {} not found", row.config_id));
                self.record_failure(row, &err).await?;
                return Err(err);
            }
        };

        let positions = match self.source.get_positions(&row.ms1_order_id).await {
            Ok(p) => p,
            Err(e) => {
                let err = SyncError::from_ledger(e);
                self.record_failure(row, &err).await?;
                return Err(err);
            }
        };

        let lines = match catalog.resolve(&positions) {
            Ok(lines) => lines,
            Err(err) => {
                self.record_failure(row, &err).await?;
                return Err(err);
            }
        };

        let doc = build_purchase_document(&row, &config, lines, self.target.as_ref());

        // A document from an earlier attempt whose result never reached the
        // tracker is adopted instead of created twice.
        let existing = match self.target.find_purchase_document(&doc.external_code).await {
            Ok(found) => found,
            Err(e) => {
                let err = SyncError::from_ledger(e);
                self.record_failure(row, &err).await?;
                return Err(err);
            }
        };

        let created = match existing {
            Some(found) => {
                warn!(
                    sync_order_id = row.id,
                    ms1_order_id = %row.ms1_order_id,
                    ms2_purchase_id = %found.id,
                    external_code = %doc.external_code,
                    "adopting existing purchase document"
                );
                found
            }
            None => match self.target.create_purchase_document(&doc).await {
                Ok(r) => r,
                Err(e) => {
                    let err = SyncError::from_create(e);
                    self.record_failure(row, &err).await?;
                    return Err(err);
                }
            },
        };

        let mut row = row;
        apply(&mut row, &SyncEvent::Created { purchase_id: created.id.clone() })?;
        if let Err(e) = self.store.save_order(&row).await {
            let cause = format!("{e:#}");
            // Remote document exists but the tracker does not know it.
            error!(
                sync_order_id = row.id,
                ms1_order_id = %row.ms1_order_id,
                ms2_purchase_id = %created.id,
                external_code = %doc.external_code,
                error = %cause,
                "purchase document created but local commit failed"
            );
            return Err(SyncError::store(e));
        }

        if doc.total() != row.order_amount {
            warn!(
                sync_order_id = row.id,
                document_total = doc.total(),
                order_amount = row.order_amount,
                "purchase total differs from source order amount"
            );
        }
        info!(
            sync_order_id = row.id,
            ms1_order_id = %row.ms1_order_id,
            ms2_purchase_id = %created.id,
            positions = doc.positions.len(),
            "order synced"
        );
        Ok(MaterializeOutcome::Synced(created))
    }
}
