use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use osync_db::SyncStore;
use osync_ledger::{LedgerError, RemoteLedger};
use osync_schemas::{SyncOrder, SyncStatus};
use tracing::{info, warn};

use crate::state_machine::{apply, SyncEvent};
use crate::{CatalogMapping, FullSyncReport, InFlight, SyncError};

/// The order synchronization engine.
///
/// Holds injected collaborators only; one instance is shared by the
/// scheduler and the operator surface so they see the same in-flight set.
pub struct SyncEngine {
    pub(crate) store: Arc<dyn SyncStore>,
    pub(crate) source: Arc<dyn RemoteLedger>,
    pub(crate) target: Arc<dyn RemoteLedger>,
    pub(crate) ready_states: Vec<String>,
    pub(crate) in_flight: InFlight,
    stop: Arc<AtomicBool>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn SyncStore>,
        source: Arc<dyn RemoteLedger>,
        target: Arc<dyn RemoteLedger>,
        ready_states: Vec<String>,
    ) -> Self {
        Self {
            store,
            source,
            target,
            ready_states,
            in_flight: InFlight::new(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn store(&self) -> &Arc<dyn SyncStore> {
        &self.store
    }

    pub fn ready_states(&self) -> &[String] {
        &self.ready_states
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// Shared flag; passes stop before the next order once it is set.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Discovery (with inline reconciliation) followed by materialization.
    pub async fn run_full(&self) -> Result<FullSyncReport, SyncError> {
        let discovery = self.run_discovery().await?;
        let materialize = self.run_materialization().await?;
        Ok(FullSyncReport {
            discovery,
            materialize,
        })
    }

    // -----------------------------------------------------------------------
    // Operator commands
    // -----------------------------------------------------------------------

    /// Materialize one order now, whatever the scheduler is doing.
    ///
    /// PENDING, FAILED and WAITING_FOR_CONFIRM orders are accepted. The
    /// outcome is persisted before any error is returned.
    pub async fn resync_order(&self, id: i64) -> Result<SyncOrder, SyncError> {
        let row = self
            .store
            .get_order(id)
            .await
            .map_err(SyncError::store)?
            .ok_or_else(|| SyncError::NotFound(format!("sync order id={id}")))?;

        if row.sync_status == SyncStatus::Synced {
            return Err(SyncError::AlreadySynced(format!(
                "sync order id={id} already has purchase {}",
                row.ms2_purchase_id.as_deref().unwrap_or("?")
            )));
        }

        let _guard = self
            .in_flight
            .try_claim(&row.ms1_order_id)
            .ok_or_else(|| SyncError::Busy(format!("sync order id={id} is being processed")))?;

        // Re-read under the guard.
        let mut row = self
            .store
            .get_order(id)
            .await
            .map_err(SyncError::store)?
            .ok_or_else(|| SyncError::NotFound(format!("sync order id={id}")))?;

        match row.sync_status {
            SyncStatus::Synced => {
                return Err(SyncError::AlreadySynced(format!("sync order id={id}")));
            }
            SyncStatus::Failed | SyncStatus::WaitingForConfirm => {
                apply(&mut row, &SyncEvent::Requeued)?;
                row = self.store.save_order(&row).await.map_err(SyncError::store)?;
            }
            SyncStatus::Pending => {}
        }

        info!(sync_order_id = row.id, ms1_order_id = %row.ms1_order_id, "manual resync");

        let catalog = match self.target.get_catalog_snapshot().await {
            Ok(entries) => CatalogMapping::from_entries(&entries),
            Err(e) => {
                let err = SyncError::from_ledger(e);
                self.record_failure(row, &err).await?;
                return Err(err);
            }
        };

        self.materialize_claimed(row, &catalog).await?;

        self.store
            .get_order(id)
            .await
            .map_err(SyncError::store)?
            .ok_or_else(|| SyncError::NotFound(format!("sync order id={id}")))
    }

    /// WAITING_FOR_APPROVE -> APPROVED. No automatic action follows.
    pub async fn approve_modification(&self, id: i64) -> Result<SyncOrder, SyncError> {
        let row = self
            .store
            .get_order(id)
            .await
            .map_err(SyncError::store)?
            .ok_or_else(|| SyncError::NotFound(format!("sync order id={id}")))?;

        let _guard = self
            .in_flight
            .try_claim(&row.ms1_order_id)
            .ok_or_else(|| SyncError::Busy(format!("sync order id={id} is being processed")))?;

        let mut row = self
            .store
            .get_order(id)
            .await
            .map_err(SyncError::store)?
            .ok_or_else(|| SyncError::NotFound(format!("sync order id={id}")))?;

        apply(&mut row, &SyncEvent::Approved)?;
        let saved = self.store.save_order(&row).await.map_err(SyncError::store)?;
        info!(sync_order_id = saved.id, ms1_order_id = %saved.ms1_order_id, "modification approved");
        Ok(saved)
    }

    /// APPROVED -> RESYNCED once the operator has brought the target document
    /// in line by hand. The current source amount and state become the drift
    /// baseline; nothing is created.
    pub async fn mark_resynced(&self, id: i64) -> Result<SyncOrder, SyncError> {
        let row = self
            .store
            .get_order(id)
            .await
            .map_err(SyncError::store)?
            .ok_or_else(|| SyncError::NotFound(format!("sync order id={id}")))?;

        let _guard = self
            .in_flight
            .try_claim(&row.ms1_order_id)
            .ok_or_else(|| SyncError::Busy(format!("sync order id={id} is being processed")))?;

        let mut row = self
            .store
            .get_order(id)
            .await
            .map_err(SyncError::store)?
            .ok_or_else(|| SyncError::NotFound(format!("sync order id={id}")))?;

        let source = self.source.get_order(&row.ms1_order_id).await.map_err(|e| match e {
            LedgerError::NotFound(_) => {
                SyncError::NotFound(format!("source order {} no longer exists", row.ms1_order_id))
            }
            other => SyncError::from_ledger(other),
        })?;

        apply(
            &mut row,
            &SyncEvent::Rebaselined {
                state_href: source.state_href,
                amount: source.amount,
            },
        )?;
        let saved = self.store.save_order(&row).await.map_err(SyncError::store)?;
        info!(
            sync_order_id = saved.id,
            ms1_order_id = %saved.ms1_order_id,
            amount = saved.order_amount,
            "modification resynced"
        );
        Ok(saved)
    }

    // -----------------------------------------------------------------------
    // Shared helpers
    // -----------------------------------------------------------------------

    /// Persist a materialization failure: retriable stays PENDING, anything
    /// else goes to FAILED.
    pub(crate) async fn record_failure(
        &self,
        mut row: SyncOrder,
        err: &SyncError,
    ) -> Result<SyncOrder, SyncError> {
        let event = if err.is_retriable() {
            SyncEvent::RetryableFailure { message: err.message() }
        } else {
            SyncEvent::PermanentFailure { message: err.message() }
        };
        apply(&mut row, &event)?;

        if err.is_retriable() {
            warn!(sync_order_id = row.id, ms1_order_id = %row.ms1_order_id, error = %err, "order left pending");
        } else {
            warn!(sync_order_id = row.id, ms1_order_id = %row.ms1_order_id, error = %err, "order failed");
        }

        self.store.save_order(&row).await.map_err(SyncError::store)
    }
}
