use osync_ledger::LedgerError;
use osync_reconcile::{describe_diffs, drift_check_enabled, reconcile_order, ReconcileAction};
use osync_schemas::{SourceOrder, SyncOrder, SyncStatus};
use tracing::{info, warn};

use crate::state_machine::{apply, SyncEvent};
use crate::{ReconcileOutcome, ReconcilePassReport, SyncEngine, SyncError};

impl SyncEngine {
    /// Re-fetch every SYNCED (drift-checkable) and WAITING_FOR_CONFIRM order
    /// from the source ledger and reconcile it.
    pub async fn run_reconciliation(&self) -> Result<ReconcilePassReport, SyncError> {
        let mut report = ReconcilePassReport::default();

        let mut rows: Vec<SyncOrder> = self
            .store
            .list_by_status(SyncStatus::Synced)
            .await
            .map_err(SyncError::store)?
            .into_iter()
            .filter(drift_check_enabled)
            .collect();
        rows.extend(
            self.store
                .list_by_status(SyncStatus::WaitingForConfirm)
                .await
                .map_err(SyncError::store)?,
        );

        for row in rows {
            if self.is_stopping() {
                report.stopped = true;
                break;
            }
            report.checked += 1;

            let observed = match self.source.get_order(&row.ms1_order_id).await {
                Ok(o) => o,
                Err(LedgerError::NotFound(what)) => {
                    report.not_found += 1;
                    if let Err(e) = self.record_lookup_failure(&row, &what).await {
                        report.errors.push(format!("{}: {e}", row.ms1_order_id));
                    }
                    continue;
                }
                Err(e) => {
                    warn!(sync_order_id = row.id, ms1_order_id = %row.ms1_order_id, error = %e, "source order fetch failed");
                    report.errors.push(format!("{}: {e}", row.ms1_order_id));
                    continue;
                }
            };

            match self.reconcile_tracked(&row.ms1_order_id, &observed).await {
                Ok(ReconcileOutcome::DriftFlagged) => report.drift_flagged += 1,
                Ok(ReconcileOutcome::Promoted) => report.promoted += 1,
                Ok(ReconcileOutcome::StateUpdated) => report.state_updated += 1,
                Ok(ReconcileOutcome::Busy) => report.skipped_busy += 1,
                Ok(ReconcileOutcome::Unchanged) => {}
                Err(e) => report.errors.push(format!("{}: {e}", row.ms1_order_id)),
            }
        }

        info!(
            checked = report.checked,
            drift_flagged = report.drift_flagged,
            promoted = report.promoted,
            not_found = report.not_found,
            "reconciliation pass finished"
        );
        Ok(report)
    }

    /// Reconcile one tracked order against an already-fetched source order.
    ///
    /// Takes the in-flight claim and re-reads the row under it.
    pub async fn reconcile_tracked(
        &self,
        ms1_order_id: &str,
        observed: &SourceOrder,
    ) -> Result<ReconcileOutcome, SyncError> {
        let Some(_guard) = self.in_flight.try_claim(ms1_order_id) else {
            return Ok(ReconcileOutcome::Busy);
        };

        let Some(mut row) = self
            .store
            .find_by_source_id(ms1_order_id)
            .await
            .map_err(SyncError::store)?
        else {
            return Ok(ReconcileOutcome::Unchanged);
        };

        let (event, outcome) = match reconcile_order(&row, observed, &self.ready_states) {
            ReconcileAction::NoChange => return Ok(ReconcileOutcome::Unchanged),
            ReconcileAction::FlagDrift { diffs } => (
                SyncEvent::DriftDetected { summary: describe_diffs(&diffs) },
                ReconcileOutcome::DriftFlagged,
            ),
            ReconcileAction::Promote { snapshot } => (
                SyncEvent::ConfirmedReady {
                    state_href: snapshot.state_href,
                    amount: snapshot.amount,
                },
                ReconcileOutcome::Promoted,
            ),
            ReconcileAction::RecordState { state_href } => (
                SyncEvent::StateObserved { state_href },
                ReconcileOutcome::StateUpdated,
            ),
        };

        apply(&mut row, &event)?;
        let saved = self.store.save_order(&row).await.map_err(SyncError::store)?;

        match outcome {
            ReconcileOutcome::DriftFlagged => warn!(
                sync_order_id = saved.id,
                ms1_order_id = %saved.ms1_order_id,
                info = saved.info_msg.as_deref().unwrap_or(""),
                "source order drifted after sync; waiting for approval"
            ),
            _ => info!(
                sync_order_id = saved.id,
                ms1_order_id = %saved.ms1_order_id,
                status = saved.sync_status.as_str(),
                "tracked order reconciled"
            ),
        }
        Ok(outcome)
    }

    async fn record_lookup_failure(&self, row: &SyncOrder, what: &str) -> Result<(), SyncError> {
        let Some(_guard) = self.in_flight.try_claim(&row.ms1_order_id) else {
            return Ok(());
        };
        let Some(mut fresh) = self.store.get_order(row.id).await.map_err(SyncError::store)? else {
            return Ok(());
        };
        apply(
            &mut fresh,
            &SyncEvent::LookupFailed {
                message: format!("source order not found: {what}"),
            },
        )?;
        self.store.save_order(&fresh).await.map_err(SyncError::store)?;
        warn!(sync_order_id = row.id, ms1_order_id = %row.ms1_order_id, "source order no longer exists");
        Ok(())
    }
}
