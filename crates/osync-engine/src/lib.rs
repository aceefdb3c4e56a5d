//! osync-engine
//!
//! The order synchronization engine: discovery, materialization and
//! reconciliation stages over injected store and ledger adapters.
//!
//! - `state_machine` is the only place a tracked order's status changes
//! - `catalog` maps source articles to target catalog items
//! - one in-flight claim per source order id; busy orders are skipped
//! - passes commit per order and stop between orders when asked

mod catalog;
mod discovery;
mod document;
mod engine;
mod error;
mod locks;
mod materialize;
mod reconcile;
mod report;
pub mod state_machine;

pub use catalog::CatalogMapping;
pub use document::{build_purchase_document, purchase_description, purchase_external_code};
pub use engine::SyncEngine;
pub use error::SyncError;
pub use locks::{InFlight, InFlightGuard};
pub use materialize::MaterializeOutcome;
pub use report::{
    DiscoveryReport, FullSyncReport, MaterializeReport, ReconcileOutcome, ReconcilePassReport,
};
pub use state_machine::{SyncEvent, TransitionError};
