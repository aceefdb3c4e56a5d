//! Shared runtime state for osync-daemon.
//!
//! Handlers receive `State<Arc<AppState>>`. The scheduler tasks spawned here
//! and the manual `/v1/sync/*` routes go through the same [`AppState::run_pass`]
//! so both report on the bus the same way.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use osync_config::SchedulerSettings;
use osync_engine::{
    DiscoveryReport, FullSyncReport, MaterializeReport, ReconcilePassReport, SyncEngine, SyncError,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::gate::OperatorGate;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Status(StatusSnapshot),
    PassCompleted { pass: String, report: PassReport },
    LogLine { level: String, msg: String },
}

// ---------------------------------------------------------------------------
// Passes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Discovery then materialization.
    Full,
    /// Discovery with inline reconciliation ("statuses").
    Discovery,
    /// Materialization of PENDING orders.
    Materialize,
    /// Standalone reconciliation of SYNCED / WAITING_FOR_CONFIRM orders.
    Reconcile,
}

impl PassKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassKind::Full => "full",
            PassKind::Discovery => "discovery",
            PassKind::Materialize => "materialize",
            PassKind::Reconcile => "reconcile",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PassReport {
    Full(FullSyncReport),
    Discovery(DiscoveryReport),
    Materialize(MaterializeReport),
    Reconcile(ReconcilePassReport),
}

/// Outcome of the most recent pass of any kind.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PassSummary {
    pub pass: String,
    pub finished_at: DateTime<Utc>,
    pub ok: bool,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// BuildInfo / StatusSnapshot
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: String,
    pub version: String,
}

/// Returned by GET /v1/status and carried inside SSE `status` events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    pub scheduler_running: bool,
    pub stopping: bool,
    /// Orders currently claimed by a pass or an operator command.
    pub in_flight: usize,
    pub last_pass: Option<PassSummary>,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub engine: Arc<SyncEngine>,
    pub gate: Arc<dyn OperatorGate>,
    pub status: Arc<RwLock<StatusSnapshot>>,
    /// Flipped once by `begin_shutdown`; wakes idle scheduler loops.
    shutdown: watch::Sender<bool>,
}

impl AppState {
    pub fn new(engine: Arc<SyncEngine>, gate: Arc<dyn OperatorGate>) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);

        let initial_status = StatusSnapshot {
            daemon_uptime_secs: uptime_secs(),
            scheduler_running: false,
            stopping: false,
            in_flight: 0,
            last_pass: None,
        };

        Self {
            bus,
            build: BuildInfo {
                service: "osync-daemon".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            engine,
            gate,
            status: Arc::new(RwLock::new(initial_status)),
            shutdown: watch::channel(false).0,
        }
    }

    /// Current status with live counters filled in.
    pub async fn snapshot(&self) -> StatusSnapshot {
        let mut snap = self.status.read().await.clone();
        snap.daemon_uptime_secs = uptime_secs();
        snap.in_flight = self.engine.in_flight().len();
        snap.stopping = self.engine.is_stopping();
        snap
    }

    /// Run one pass, record its outcome in the status and publish it on the bus.
    pub async fn run_pass(&self, kind: PassKind) -> Result<PassReport, SyncError> {
        let result = match kind {
            PassKind::Full => self.engine.run_full().await.map(PassReport::Full),
            PassKind::Discovery => self.engine.run_discovery().await.map(PassReport::Discovery),
            PassKind::Materialize => self
                .engine
                .run_materialization()
                .await
                .map(PassReport::Materialize),
            PassKind::Reconcile => self
                .engine
                .run_reconciliation()
                .await
                .map(PassReport::Reconcile),
        };

        let summary = PassSummary {
            pass: kind.as_str().to_string(),
            finished_at: Utc::now(),
            ok: result.is_ok(),
            error: result.as_ref().err().map(|e| e.to_string()),
        };
        self.status.write().await.last_pass = Some(summary);

        match &result {
            Ok(report) => {
                let _ = self.bus.send(BusMsg::PassCompleted {
                    pass: kind.as_str().to_string(),
                    report: report.clone(),
                });
            }
            Err(e) => {
                warn!(pass = kind.as_str(), error = %e, "pass failed");
                let _ = self.bus.send(BusMsg::LogLine {
                    level: "ERROR".to_string(),
                    msg: format!("{} pass failed: {e}", kind.as_str()),
                });
            }
        }
        result
    }

    /// Ask running passes to stop before their next order. Idempotent.
    pub async fn begin_shutdown(&self) {
        if self.engine.is_stopping() {
            return;
        }
        self.engine.request_stop();
        self.shutdown.send_replace(true);
        {
            let mut s = self.status.write().await;
            s.stopping = true;
            s.scheduler_running = false;
        }
        let _ = self.bus.send(BusMsg::LogLine {
            level: "WARN".to_string(),
            msg: "shutdown requested; passes stop before the next order".to_string(),
        });
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

/// Process uptime in seconds.
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// Spawn the periodic passes.
///
/// Discovery and materialization each get their own interval; the standalone
/// reconciliation tick only runs when `reconcile_interval_secs > 0`. A tick
/// that fires while its previous pass is still running is skipped.
pub async fn spawn_scheduler(state: Arc<AppState>, settings: &SchedulerSettings) -> Vec<JoinHandle<()>> {
    let mut plan = vec![
        (PassKind::Discovery, settings.discovery_interval_secs),
        (PassKind::Materialize, settings.materialize_interval_secs),
    ];
    if settings.reconcile_interval_secs > 0 {
        plan.push((PassKind::Reconcile, settings.reconcile_interval_secs));
    }

    state.status.write().await.scheduler_running = true;

    plan.into_iter()
        .map(|(kind, secs)| {
            info!(pass = kind.as_str(), every_secs = secs, "scheduling pass");
            spawn_pass_loop(Arc::clone(&state), kind, Duration::from_secs(secs))
        })
        .collect()
}

fn spawn_pass_loop(state: Arc<AppState>, kind: PassKind, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut shutdown = state.shutdown.subscribe();
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {}
            }
            if state.engine.is_stopping() {
                info!(pass = kind.as_str(), "scheduler stopping");
                break;
            }
            // Errors are already logged and published by run_pass.
            let _ = state.run_pass(kind).await;
        }
    })
}

/// Wait for the scheduler loops to finish the order they are on.
///
/// Call after [`AppState::begin_shutdown`]. Returns `false` if `grace`
/// elapsed first; a pass cut off then may leave a created document
/// untracked until the next start adopts it.
pub async fn drain_scheduler(handles: Vec<JoinHandle<()>>, grace: Duration) -> bool {
    let tasks = handles.len();
    match tokio::time::timeout(grace, futures_util::future::join_all(handles)).await {
        Ok(results) => {
            for r in results {
                if let Err(e) = r {
                    warn!(error = %e, "scheduler task ended abnormally");
                }
            }
            info!(tasks, "scheduler drained");
            true
        }
        Err(_) => {
            error!(tasks, grace_secs = grace.as_secs(), "scheduler still busy at shutdown deadline");
            false
        }
    }
}
