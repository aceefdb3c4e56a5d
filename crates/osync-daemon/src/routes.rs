//! Axum router and all HTTP handlers for osync-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Every handler except `health` asks the operator gate
//! first.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use osync_db::SyncStore;
use osync_engine::SyncError;
use osync_schemas::{NewSyncConfig, SyncOrderFilter};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{error, info};

use crate::{
    api_types::{ErrorResponse, GateRefusedResponse, HealthResponse, PassResponse},
    gate::{PERM_READ, PERM_RUN},
    state::{AppState, BusMsg, PassKind},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/v1/sync/all", post(sync_all))
        .route("/v1/sync/pending", post(sync_pending))
        .route("/v1/sync/statuses", post(sync_statuses))
        .route("/v1/sync/reconcile", post(sync_reconcile))
        .route("/v1/orders", get(list_orders))
        .route("/v1/orders/:id", get(get_order))
        .route("/v1/orders/:id/resync", post(resync_order))
        .route("/v1/orders/:id/approve", post(approve_order))
        .route("/v1/orders/:id/mark-resynced", post(mark_resynced_order))
        .route("/v1/configs", get(list_configs).post(create_config))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Shared responses
// ---------------------------------------------------------------------------

fn authorize(st: &AppState, headers: &HeaderMap, permission: &str) -> Result<(), Response> {
    st.gate.authorize(headers, permission).map_err(|refusal| {
        info!(permission, reason = %refusal.reason, "operator gate refused request");
        (
            StatusCode::FORBIDDEN,
            Json(GateRefusedResponse {
                error: format!("GATE_REFUSED: {}", refusal.reason),
                permission: permission.to_string(),
            }),
        )
            .into_response()
    })
}

pub(crate) fn sync_error_status(e: &SyncError) -> StatusCode {
    match e {
        SyncError::NotFound(_) => StatusCode::NOT_FOUND,
        SyncError::AlreadySynced(_) | SyncError::Busy(_) | SyncError::InvalidTransition(_) => {
            StatusCode::CONFLICT
        }
        SyncError::Transient(_) | SyncError::Unconfirmed(_) => StatusCode::BAD_GATEWAY,
        SyncError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        SyncError::Unresolvable(_)
        | SyncError::Configuration(_)
        | SyncError::Malformed(_)
        | SyncError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn sync_error_response(e: SyncError) -> Response {
    let status = sync_error_status(&e);
    (
        status,
        Json(ErrorResponse {
            kind: e.kind().to_string(),
            error: e.message(),
        }),
    )
        .into_response()
}

fn store_error_response(e: anyhow::Error) -> Response {
    let cause = format!("{e:#}");
    error!(error = %cause, "record store failure");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            kind: "store".to_string(),
            error: cause,
        }),
    )
        .into_response()
}

fn invalid_request(status: StatusCode, msg: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            kind: "invalid_request".to_string(),
            error: msg.into(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.clone(),
            version: st.build.version.clone(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if let Err(r) = authorize(&st, &headers, PERM_READ) {
        return r;
    }
    let snap = st.snapshot().await;
    let _ = st.bus.send(BusMsg::Status(snap.clone()));
    (StatusCode::OK, Json(snap)).into_response()
}

// ---------------------------------------------------------------------------
// POST /v1/sync/*
// ---------------------------------------------------------------------------

async fn trigger(st: Arc<AppState>, headers: HeaderMap, kind: PassKind) -> Response {
    if let Err(r) = authorize(&st, &headers, PERM_RUN) {
        return r;
    }
    info!(pass = kind.as_str(), "manual pass requested");
    match st.run_pass(kind).await {
        Ok(report) => (
            StatusCode::OK,
            Json(PassResponse {
                pass: kind.as_str().to_string(),
                report,
            }),
        )
            .into_response(),
        Err(e) => sync_error_response(e),
    }
}

pub(crate) async fn sync_all(State(st): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    trigger(st, headers, PassKind::Full).await
}

pub(crate) async fn sync_pending(State(st): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    trigger(st, headers, PassKind::Materialize).await
}

pub(crate) async fn sync_statuses(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    trigger(st, headers, PassKind::Discovery).await
}

pub(crate) async fn sync_reconcile(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    trigger(st, headers, PassKind::Reconcile).await
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// GET /v1/orders: newest first, `skip` >= 0, `limit` clamped to 1..=100.
pub(crate) async fn list_orders(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    filter: Result<Query<SyncOrderFilter>, QueryRejection>,
) -> Response {
    if let Err(r) = authorize(&st, &headers, PERM_READ) {
        return r;
    }
    let Query(filter) = match filter {
        Ok(f) => f,
        Err(e) => return invalid_request(StatusCode::BAD_REQUEST, e.body_text()),
    };
    match st.engine.store().list_orders(&filter).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => store_error_response(e),
    }
}

pub(crate) async fn get_order(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if let Err(r) = authorize(&st, &headers, PERM_READ) {
        return r;
    }
    match st.engine.store().get_order(id).await {
        Ok(Some(order)) => (StatusCode::OK, Json(order)).into_response(),
        Ok(None) => sync_error_response(SyncError::NotFound(format!("sync order id={id}"))),
        Err(e) => store_error_response(e),
    }
}

/// Materialize one order now. The per-order outcome is persisted even when
/// an error is returned.
pub(crate) async fn resync_order(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if let Err(r) = authorize(&st, &headers, PERM_RUN) {
        return r;
    }
    info!(sync_order_id = id, "orders/resync");
    match st.engine.resync_order(id).await {
        Ok(order) => {
            let _ = st.bus.send(BusMsg::LogLine {
                level: "INFO".to_string(),
                msg: format!("order {} resynced: {}", order.ms1_order_id, order.sync_status.as_str()),
            });
            (StatusCode::OK, Json(order)).into_response()
        }
        Err(e) => sync_error_response(e),
    }
}

pub(crate) async fn approve_order(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if let Err(r) = authorize(&st, &headers, PERM_RUN) {
        return r;
    }
    info!(sync_order_id = id, "orders/approve");
    match st.engine.approve_modification(id).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(e) => sync_error_response(e),
    }
}

pub(crate) async fn mark_resynced_order(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if let Err(r) = authorize(&st, &headers, PERM_RUN) {
        return r;
    }
    info!(sync_order_id = id, "orders/mark-resynced");
    match st.engine.mark_resynced(id).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(e) => sync_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// Configs
// ---------------------------------------------------------------------------

pub(crate) async fn list_configs(State(st): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(r) = authorize(&st, &headers, PERM_READ) {
        return r;
    }
    match st.engine.store().list_configs().await {
        Ok(configs) => (StatusCode::OK, Json(configs)).into_response(),
        Err(e) => store_error_response(e),
    }
}

pub(crate) async fn create_config(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<NewSyncConfig>, JsonRejection>,
) -> Response {
    if let Err(r) = authorize(&st, &headers, PERM_RUN) {
        return r;
    }
    let Json(new_cfg) = match body {
        Ok(b) => b,
        Err(e) => return invalid_request(StatusCode::BAD_REQUEST, e.body_text()),
    };

    let blank = [
        ("name", &new_cfg.name),
        ("source_counterparty_id", &new_cfg.source_counterparty_id),
        ("target_organization_id", &new_cfg.target_organization_id),
        ("target_group_id", &new_cfg.target_group_id),
        ("target_store_id", &new_cfg.target_store_id),
    ]
    .into_iter()
    .find(|(_, v)| v.trim().is_empty());
    if let Some((field, _)) = blank {
        return invalid_request(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("{field} must not be empty"),
        );
    }

    match st.engine.store().insert_config(&new_cfg).await {
        Ok(cfg) => {
            info!(config_id = cfg.id, name = %cfg.name, "sync config created");
            (StatusCode::CREATED, Json(cfg)).into_response()
        }
        Err(e) => store_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(r) = authorize(&st, &headers, PERM_READ) {
        return r;
    }

    let mut out = HeaderMap::new();
    out.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    out.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (out, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Status(_) => "status",
                    BusMsg::PassCompleted { .. } => "pass",
                    BusMsg::LogLine { .. } => "log",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_errors_map_to_client_statuses() {
        assert_eq!(sync_error_status(&SyncError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(sync_error_status(&SyncError::Busy("x".into())), StatusCode::CONFLICT);
        assert_eq!(
            sync_error_status(&SyncError::Transient("x".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            sync_error_status(&SyncError::Unconfirmed("x".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            sync_error_status(&SyncError::Unresolvable(vec!["a".into()])),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
