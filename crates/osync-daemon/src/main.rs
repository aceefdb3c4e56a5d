//! osync-daemon entry point.
//!
//! Loads configuration, resolves secrets, connects the record store and both
//! ledgers, starts the scheduler and serves the operator API. Ctrl-C sets the
//! engine stop flag; the process exits once the server and the scheduler
//! loops have drained.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use osync_config::{
    config_paths_from_env, load_layered_yaml, report_unused_keys, resolve_secrets, ConfigMode,
    UnusedKeyPolicy,
};
use osync_daemon::{gate::BearerTokenGate, routes, state};
use osync_db::PgSyncStore;
use osync_engine::SyncEngine;
use osync_ledger::HttpLedger;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

const ENV_DAEMON_ADDR: &str = "OSYNC_DAEMON_ADDR";
const SCHEDULER_DRAIN_GRACE: Duration = Duration::from_secs(120);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let paths = config_paths_from_env();
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&path_refs).context("load config")?;
    let unused = report_unused_keys(ConfigMode::Daemon, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !unused.is_clean() {
        warn!(keys = ?unused.unused_leaf_pointers, "config keys not read by the daemon");
    }
    let settings = loaded.settings()?;
    let secrets = resolve_secrets(&settings, ConfigMode::Daemon)?;
    info!(config_hash = %loaded.config_hash, paths = ?paths, "config loaded");

    let pool = osync_db::connect_from_env().await?;
    osync_db::migrate(&pool).await?;
    let store = Arc::new(PgSyncStore::new(pool));

    let source = Arc::new(HttpLedger::from_settings(
        "source",
        &settings.source,
        secrets.source_token.clone().unwrap_or_default(),
    )?);
    let target = Arc::new(HttpLedger::from_settings(
        "target",
        &settings.target,
        secrets.target_token.clone().unwrap_or_default(),
    )?);

    let engine = Arc::new(SyncEngine::new(
        store,
        source,
        target,
        settings.ready_states.clone(),
    ));
    let gate = Arc::new(BearerTokenGate::new(
        secrets.operator_token.clone().unwrap_or_default(),
    ));
    let shared = Arc::new(state::AppState::new(engine, gate));

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));
    let scheduler = state::spawn_scheduler(Arc::clone(&shared), &settings.scheduler).await;

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8898)));
    info!("osync-daemon listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&shared)))
        .await;

    // Scheduled passes finish their current order before the runtime is dropped.
    shared.begin_shutdown().await;
    state::drain_scheduler(scheduler, SCHEDULER_DRAIN_GRACE).await;
    served.context("server crashed")?;

    info!("osync-daemon stopped");
    Ok(())
}

async fn shutdown_signal(shared: Arc<state::AppState>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler failed; shutting down");
    }
    shared.begin_shutdown().await;
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var(ENV_DAEMON_ADDR).ok()?.parse().ok()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
