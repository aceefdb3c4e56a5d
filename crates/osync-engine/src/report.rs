use serde::{Deserialize, Serialize};

/// Result of one discovery pass over all active configs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub configs_scanned: u32,
    pub configs_failed: u32,
    pub orders_seen: u32,
    pub inserted: u64,
    pub drift_flagged: u32,
    pub promoted: u32,
    pub state_updated: u32,
    pub skipped_busy: u32,
    pub errors: Vec<String>,
    pub stopped: bool,
}

/// Result of one materialization pass over PENDING orders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializeReport {
    pub attempted: u32,
    pub synced: u32,
    /// Left PENDING with an error message (transient or unresolvable).
    pub pending: u32,
    pub failed: u32,
    pub skipped_busy: u32,
    /// No longer materializable when re-read under the guard.
    pub skipped_stale: u32,
    pub errors: Vec<String>,
    pub stopped: bool,
}

/// Result of one standalone reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilePassReport {
    pub checked: u32,
    pub drift_flagged: u32,
    pub promoted: u32,
    pub state_updated: u32,
    pub not_found: u32,
    pub skipped_busy: u32,
    pub errors: Vec<String>,
    pub stopped: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullSyncReport {
    pub discovery: DiscoveryReport,
    pub materialize: MaterializeReport,
}

/// What happened to one order during inline or standalone reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Unchanged,
    DriftFlagged,
    Promoted,
    StateUpdated,
    Busy,
}
