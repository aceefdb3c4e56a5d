//! Request and response types for the osync-daemon HTTP endpoints.
//!
//! Engine reports, `SyncOrder`, `SyncConfig` and `Page` are serialized as-is;
//! only envelope types live here.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// Gate refusal (403)
// ---------------------------------------------------------------------------

/// Body returned when the operator gate refuses a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateRefusedResponse {
    pub error: String,
    /// Permission that was required: "order_sync:read" | "order_sync:run"
    pub permission: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body for every non-2xx response other than gate refusals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// `SyncError::kind()` or "invalid_request".
    pub kind: String,
    pub error: String,
}

// ---------------------------------------------------------------------------
// POST /v1/sync/*
// ---------------------------------------------------------------------------

/// Wrapper for a manually triggered pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassResponse<T> {
    pub pass: String,
    pub report: T,
}
