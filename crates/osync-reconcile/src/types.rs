use serde::{Deserialize, Serialize};

/// The part of a source order the tracker snapshots and later compares.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub amount: i64,
    pub state_href: String,
}

impl OrderSnapshot {
    pub fn new(amount: i64, state_href: impl Into<String>) -> Self {
        Self {
            amount,
            state_href: state_href.into(),
        }
    }
}

/// Evidence of one mismatched field between stored and observed snapshots.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReconcileDiff {
    AmountChanged { stored: i64, observed: i64 },
    StateChanged { stored: String, observed: String },
}

impl std::fmt::Display for ReconcileDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileDiff::AmountChanged { stored, observed } => {
                write!(f, "amount changed: {stored} -> {observed}")
            }
            ReconcileDiff::StateChanged { stored, observed } => {
                write!(f, "state changed: {stored} -> {observed}")
            }
        }
    }
}

/// What the engine should do with one tracked order after comparison.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Nothing changed, or the row is not eligible for this check.
    NoChange,
    /// SYNCED row drifted; gate behind operator approval.
    FlagDrift { diffs: Vec<ReconcileDiff> },
    /// WAITING_FOR_CONFIRM row reached a ready state; queue it.
    Promote { snapshot: OrderSnapshot },
    /// WAITING_FOR_CONFIRM row moved to another non-ready state.
    RecordState { state_href: String },
}

impl ReconcileAction {
    pub fn is_no_change(&self) -> bool {
        matches!(self, ReconcileAction::NoChange)
    }
}

/// Human-readable diff summary stored in `info_msg`.
pub fn describe_diffs(diffs: &[ReconcileDiff]) -> String {
    let lines: Vec<String> = diffs.iter().map(|d| d.to_string()).collect();
    format!("source order modified after sync: {}", lines.join("; "))
}
