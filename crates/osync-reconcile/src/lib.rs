//! osync-reconcile
//!
//! Post-creation reconciliation of tracked orders against the source ledger.
//!
//! - SYNCED order whose total or state changed => flag for operator approval
//! - WAITING_FOR_CONFIRM order now in a ready state => promote to PENDING
//! - Never decides to create a document
//!
//! Deterministic, pure logic. No IO. No ledger calls.

mod engine;
mod types;

pub use engine::{compare_snapshots, drift_check_enabled, is_ready_state, reconcile_order};
pub use types::*;
