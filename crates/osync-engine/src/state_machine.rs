//! Sync status state machine.
//!
//! Every change to a tracked order's status goes through [`apply`], which
//! rejects illegal moves and keeps two invariants:
//!
//! 1. `ms2_purchase_id` is set iff the order is SYNCED.
//! 2. `modification_status` is set only while SYNCED.
//!
//! ```text
//!   discovery ─► WAITING_FOR_CONFIRM ──ConfirmedReady──► PENDING ──Created──► SYNCED
//!                     │  ▲ StateObserved                 │  ▲                  │
//!                     │  └───────────────┘               │  └ RetryableFailure  │ DriftDetected
//!                     │                                  ▼                      ▼
//!                     └────────────Requeued◄──────────  FAILED        WAITING_FOR_APPROVE
//!                                                    (PermanentFailure)         │ Approved
//!                                                                               ▼
//!                                                                           APPROVED
//!                                                                               │ Rebaselined
//!                                                                               ▼
//!                                                                           RESYNCED
//! ```

use osync_schemas::{ModificationStatus, SyncOrder, SyncStatus};

// ---------------------------------------------------------------------------
// SyncEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Source order reached a ready state; snapshot refreshed.
    ConfirmedReady { state_href: String, amount: i64 },
    /// Source order moved to another non-ready state.
    StateObserved { state_href: String },
    /// Materialization failed in a way the next pass may fix.
    RetryableFailure { message: String },
    /// Materialization failed for good.
    PermanentFailure { message: String },
    /// Target document created.
    Created { purchase_id: String },
    /// SYNCED order changed at the source after creation.
    DriftDetected { summary: String },
    /// Operator acknowledged the drift.
    Approved,
    /// Operator reconciled the target by hand; snapshot becomes the new
    /// drift baseline.
    Rebaselined { state_href: String, amount: i64 },
    /// Operator asked for another materialization attempt.
    Requeued,
    /// Source order could not be looked up; status unchanged.
    LookupFailed { message: String },
}

// ---------------------------------------------------------------------------
// TransitionError
// ---------------------------------------------------------------------------

/// An event that is not legal in the order's current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: SyncStatus,
    pub modification: Option<ModificationStatus>,
    pub event: String,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.modification {
            Some(m) => write!(
                f,
                "illegal sync transition: {}/{} + {}",
                self.from.as_str(),
                m.as_str(),
                self.event
            ),
            None => write!(f, "illegal sync transition: {} + {}", self.from.as_str(), self.event),
        }
    }
}

impl std::error::Error for TransitionError {}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

/// Apply `event` to `order` in place. On error the order is untouched.
pub fn apply(order: &mut SyncOrder, event: &SyncEvent) -> Result<(), TransitionError> {
    use ModificationStatus as M;
    use SyncEvent::*;
    use SyncStatus::*;

    match (order.sync_status, order.modification_status, event) {
        (WaitingForConfirm, None, ConfirmedReady { state_href, amount }) => {
            order.sync_status = Pending;
            order.ms1_state_href = state_href.clone();
            order.order_amount = *amount;
        }

        (WaitingForConfirm, None, StateObserved { state_href }) => {
            order.ms1_state_href = state_href.clone();
        }

        (Pending, None, RetryableFailure { message }) => {
            order.error_msg = Some(message.clone());
        }

        (Pending, None, PermanentFailure { message }) => {
            order.sync_status = Failed;
            order.error_msg = Some(message.clone());
        }

        (Pending, None, Created { purchase_id }) => {
            order.sync_status = Synced;
            order.ms2_purchase_id = Some(purchase_id.clone());
            order.error_msg = None;
        }

        // Drift is recorded once; further drift waits for the operator.
        (Synced, None | Some(M::Resynced), DriftDetected { summary }) => {
            order.modification_status = Some(M::WaitingForApprove);
            order.info_msg = Some(summary.clone());
        }

        (Synced, Some(M::WaitingForApprove), Approved) => {
            order.modification_status = Some(M::Approved);
        }

        (Synced, Some(M::Approved), Rebaselined { state_href, amount }) => {
            order.modification_status = Some(M::Resynced);
            order.ms1_state_href = state_href.clone();
            order.order_amount = *amount;
            order.error_msg = None;
        }

        (Failed | WaitingForConfirm, None, Requeued) => {
            order.sync_status = Pending;
        }

        (_, _, LookupFailed { message }) => {
            order.error_msg = Some(message.clone());
        }

        (from, modification, ev) => {
            return Err(TransitionError {
                from,
                modification,
                event: format!("{ev:?}"),
            });
        }
    }

    debug_assert!(order.invariant_violation().is_none());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn order(status: SyncStatus) -> SyncOrder {
        let now = Utc::now();
        SyncOrder {
            id: 1,
            ms1_order_id: "o-1".into(),
            ms2_purchase_id: (status == SyncStatus::Synced).then(|| "po-1".to_string()),
            ms1_state_href: "new".into(),
            order_amount: 100,
            sync_status: status,
            modification_status: None,
            info_msg: None,
            error_msg: None,
            moment: now.naive_utc(),
            config_id: 1,
            created: now,
            modified: now,
        }
    }

    #[test]
    fn created_sets_purchase_id_and_clears_error() {
        let mut o = order(SyncStatus::Pending);
        o.error_msg = Some("earlier failure".into());
        apply(&mut o, &SyncEvent::Created { purchase_id: "po-9".into() }).unwrap();
        assert_eq!(o.sync_status, SyncStatus::Synced);
        assert_eq!(o.ms2_purchase_id.as_deref(), Some("po-9"));
        assert!(o.error_msg.is_none());
    }

    #[test]
    fn synced_order_cannot_be_created_again() {
        let mut o = order(SyncStatus::Synced);
        let err = apply(&mut o, &SyncEvent::Created { purchase_id: "po-2".into() }).unwrap_err();
        assert_eq!(err.from, SyncStatus::Synced);
        assert_eq!(o.ms2_purchase_id.as_deref(), Some("po-1"));
    }

    #[test]
    fn drift_then_approve() {
        let mut o = order(SyncStatus::Synced);
        apply(&mut o, &SyncEvent::DriftDetected { summary: "amount".into() }).unwrap();
        assert_eq!(o.modification_status, Some(ModificationStatus::WaitingForApprove));

        assert!(apply(&mut o, &SyncEvent::DriftDetected { summary: "again".into() }).is_err());
        assert_eq!(o.info_msg.as_deref(), Some("amount"));

        apply(&mut o, &SyncEvent::Approved).unwrap();
        assert_eq!(o.modification_status, Some(ModificationStatus::Approved));
        assert!(apply(&mut o, &SyncEvent::Approved).is_err());
    }

    #[test]
    fn rebaseline_after_approval_resumes_drift_checks() {
        let mut o = order(SyncStatus::Synced);
        let rebase = SyncEvent::Rebaselined { state_href: "shipped".into(), amount: 180 };
        assert!(apply(&mut o, &rebase).is_err());

        apply(&mut o, &SyncEvent::DriftDetected { summary: "amount".into() }).unwrap();
        assert!(apply(&mut o, &rebase).is_err());
        apply(&mut o, &SyncEvent::Approved).unwrap();
        apply(&mut o, &rebase).unwrap();
        assert_eq!(o.modification_status, Some(ModificationStatus::Resynced));
        assert_eq!(o.order_amount, 180);
        assert_eq!(o.ms1_state_href, "shipped");
        assert_eq!(o.ms2_purchase_id.as_deref(), Some("po-1"));

        apply(&mut o, &SyncEvent::DriftDetected { summary: "again".into() }).unwrap();
        assert_eq!(o.modification_status, Some(ModificationStatus::WaitingForApprove));
    }

    #[test]
    fn approve_requires_pending_drift() {
        let mut o = order(SyncStatus::Synced);
        assert!(apply(&mut o, &SyncEvent::Approved).is_err());
        let mut p = order(SyncStatus::Pending);
        assert!(apply(&mut p, &SyncEvent::Approved).is_err());
    }

    #[test]
    fn failed_and_waiting_requeue_to_pending() {
        for st in [SyncStatus::Failed, SyncStatus::WaitingForConfirm] {
            let mut o = order(st);
            apply(&mut o, &SyncEvent::Requeued).unwrap();
            assert_eq!(o.sync_status, SyncStatus::Pending);
        }
        let mut s = order(SyncStatus::Synced);
        assert!(apply(&mut s, &SyncEvent::Requeued).is_err());
    }

    #[test]
    fn permanent_failure_only_from_pending() {
        let mut o = order(SyncStatus::Pending);
        apply(&mut o, &SyncEvent::PermanentFailure { message: "no config".into() }).unwrap();
        assert_eq!(o.sync_status, SyncStatus::Failed);

        let mut s = order(SyncStatus::Synced);
        assert!(apply(&mut s, &SyncEvent::PermanentFailure { message: "x".into() }).is_err());
    }

    #[test]
    fn confirmed_ready_refreshes_snapshot() {
        let mut o = order(SyncStatus::WaitingForConfirm);
        apply(
            &mut o,
            &SyncEvent::ConfirmedReady { state_href: "ready".into(), amount: 250 },
        )
        .unwrap();
        assert_eq!(o.sync_status, SyncStatus::Pending);
        assert_eq!(o.ms1_state_href, "ready");
        assert_eq!(o.order_amount, 250);
    }

    #[test]
    fn lookup_failure_keeps_status() {
        let mut o = order(SyncStatus::Synced);
        apply(&mut o, &SyncEvent::LookupFailed { message: "gone".into() }).unwrap();
        assert_eq!(o.sync_status, SyncStatus::Synced);
        assert_eq!(o.error_msg.as_deref(), Some("gone"));
    }
}
