use osync_schemas::{ModificationStatus, SourceOrder, SyncOrder, SyncStatus};

use crate::{OrderSnapshot, ReconcileAction, ReconcileDiff};

/// Field-by-field comparison. Output order is stable.
pub fn compare_snapshots(stored: &OrderSnapshot, observed: &OrderSnapshot) -> Vec<ReconcileDiff> {
    let mut diffs = Vec::new();

    if stored.amount != observed.amount {
        diffs.push(ReconcileDiff::AmountChanged {
            stored: stored.amount,
            observed: observed.amount,
        });
    }

    if stored.state_href != observed.state_href {
        diffs.push(ReconcileDiff::StateChanged {
            stored: stored.state_href.clone(),
            observed: observed.state_href.clone(),
        });
    }

    diffs.sort();
    diffs
}

/// Whether `state_href` belongs to the READY set.
pub fn is_ready_state(state_href: &str, ready_states: &[String]) -> bool {
    ready_states.iter().any(|s| s == state_href)
}

/// Drift is only checked while no operator decision is outstanding.
pub fn drift_check_enabled(order: &SyncOrder) -> bool {
    order.sync_status == SyncStatus::Synced
        && matches!(
            order.modification_status,
            None | Some(ModificationStatus::Resynced)
        )
}

/// Deterministic decision for one tracked order given its current source state:
/// - SYNCED with drift checking enabled: mismatch => FlagDrift
/// - WAITING_FOR_CONFIRM: ready => Promote, other new state => RecordState
/// - anything else => NoChange
pub fn reconcile_order(
    order: &SyncOrder,
    observed: &SourceOrder,
    ready_states: &[String],
) -> ReconcileAction {
    let stored = OrderSnapshot::new(order.order_amount, order.ms1_state_href.clone());
    let seen = OrderSnapshot::new(observed.amount, observed.state_href.clone());

    match order.sync_status {
        SyncStatus::Synced => {
            if !drift_check_enabled(order) {
                return ReconcileAction::NoChange;
            }
            let diffs = compare_snapshots(&stored, &seen);
            if diffs.is_empty() {
                ReconcileAction::NoChange
            } else {
                ReconcileAction::FlagDrift { diffs }
            }
        }
        SyncStatus::WaitingForConfirm => {
            if is_ready_state(&seen.state_href, ready_states) {
                ReconcileAction::Promote { snapshot: seen }
            } else if seen.state_href != stored.state_href {
                ReconcileAction::RecordState {
                    state_href: seen.state_href,
                }
            } else {
                ReconcileAction::NoChange
            }
        }
        SyncStatus::Pending | SyncStatus::Failed => ReconcileAction::NoChange,
    }
}
