//! Tracked sync state: configs, per-order records, status enums, listing filters.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

/// Sync state of one tracked order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Seen in the source ledger but not yet in a fulfillable state.
    WaitingForConfirm,
    /// Queued for materialization; also the retry state.
    Pending,
    /// Target document exists.
    Synced,
    /// Non-retriable error; leaves the automatic loop.
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::WaitingForConfirm => "waiting_for_confirm",
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "waiting_for_confirm" => Some(SyncStatus::WaitingForConfirm),
            "pending" => Some(SyncStatus::Pending),
            "synced" => Some(SyncStatus::Synced),
            "failed" => Some(SyncStatus::Failed),
            _ => None,
        }
    }
}

/// Drift sub-state, only meaningful while [`SyncStatus::Synced`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModificationStatus {
    /// Source changed after the target document was created.
    WaitingForApprove,
    /// Operator acknowledged the drift; drift checks are paused.
    Approved,
    /// Operator brought the target in line and refreshed the baseline;
    /// drift checks resume against it.
    Resynced,
}

impl ModificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModificationStatus::WaitingForApprove => "waiting_for_approve",
            ModificationStatus::Approved => "approved",
            ModificationStatus::Resynced => "resynced",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "waiting_for_approve" => Some(ModificationStatus::WaitingForApprove),
            "approved" => Some(ModificationStatus::Approved),
            "resynced" => Some(ModificationStatus::Resynced),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// SyncConfig
// ---------------------------------------------------------------------------

/// Binding of one source counterparty to a target (organization, group, store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub id: i64,
    pub name: String,
    pub source_counterparty_id: String,
    pub target_organization_id: String,
    pub target_group_id: String,
    pub target_store_id: String,
    /// Orders with a business moment after this cutoff are discovered.
    pub start_sync_datetime: NaiveDateTime,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSyncConfig {
    pub name: String,
    pub source_counterparty_id: String,
    pub target_organization_id: String,
    pub target_group_id: String,
    pub target_store_id: String,
    pub start_sync_datetime: NaiveDateTime,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// SyncOrder
// ---------------------------------------------------------------------------

/// The tracked reconciliation unit: one row per source-ledger order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOrder {
    pub id: i64,
    pub ms1_order_id: String,
    pub ms2_purchase_id: Option<String>,
    pub ms1_state_href: String,
    /// Source order total at the last snapshot, in minor units.
    pub order_amount: i64,
    pub sync_status: SyncStatus,
    pub modification_status: Option<ModificationStatus>,
    pub info_msg: Option<String>,
    pub error_msg: Option<String>,
    pub moment: NaiveDateTime,
    pub config_id: i64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl SyncOrder {
    /// Returns the first violated status invariant, if any.
    ///
    /// - `ms2_purchase_id` is set iff the order is SYNCED.
    /// - `modification_status` is set only while SYNCED.
    pub fn invariant_violation(&self) -> Option<&'static str> {
        let synced = self.sync_status == SyncStatus::Synced;
        if self.ms2_purchase_id.is_some() != synced {
            return Some("ms2_purchase_id must be set iff sync_status is synced");
        }
        if self.modification_status.is_some() && !synced {
            return Some("modification_status requires sync_status synced");
        }
        None
    }

    /// True when the automatic materialization loop may pick this row up.
    pub fn is_materializable(&self) -> bool {
        self.sync_status == SyncStatus::Pending && self.ms2_purchase_id.is_none()
    }
}

/// Insert shape produced by discovery on first sighting of a source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSyncOrder {
    pub ms1_order_id: String,
    pub ms1_state_href: String,
    pub order_amount: i64,
    pub sync_status: SyncStatus,
    pub moment: NaiveDateTime,
    pub config_id: i64,
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

pub const DEFAULT_PAGE_LIMIT: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Filters for the operator order listing. All predicates are ANDed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncOrderFilter {
    #[serde(default)]
    pub sync_status: Option<SyncStatus>,
    #[serde(default)]
    pub modification_status: Option<ModificationStatus>,
    #[serde(default)]
    pub config_id: Option<i64>,
    #[serde(default)]
    pub created_after: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_before: Option<DateTime<Utc>>,
    /// Case-insensitive substring over order/purchase ids and messages.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub skip: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl SyncOrderFilter {
    /// Effective `(skip, limit)`: skip >= 0, limit in 1..=100, default 10.
    pub fn window(&self) -> (i64, i64) {
        let skip = self.skip.unwrap_or(0).max(0);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT);
        (skip, limit)
    }

    /// Normalized search term (trimmed, non-empty).
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// One page of a listing plus the unpaged total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}
