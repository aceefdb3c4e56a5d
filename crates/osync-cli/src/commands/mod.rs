//! Command handler modules for osync-cli.
//!
//! Shared wiring (config, store, ledgers, engine) lives here; command-specific
//! logic lives in the submodules.

pub mod orders;
pub mod sync;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use osync_config::{config_paths_from_env, load_layered_yaml, resolve_secrets, ConfigMode, LoadedConfig};
use osync_db::PgSyncStore;
use osync_engine::SyncEngine;
use osync_ledger::HttpLedger;
use osync_schemas::{parse_moment, ModificationStatus, SyncStatus};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Explicit `--config` paths win over `OSYNC_CONFIG` / the default path.
pub fn load_config(paths: &[String]) -> Result<LoadedConfig> {
    let paths = if paths.is_empty() {
        config_paths_from_env()
    } else {
        paths.to_vec()
    };
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    load_layered_yaml(&refs).with_context(|| format!("load config from {paths:?}"))
}

/// Store only; for commands that never reach a ledger.
pub async fn open_store() -> Result<Arc<PgSyncStore>> {
    let pool = osync_db::connect_from_env().await?;
    Ok(Arc::new(PgSyncStore::new(pool)))
}

/// Full engine over Postgres and both HTTP ledgers.
pub async fn build_engine(config_paths: &[String]) -> Result<SyncEngine> {
    let loaded = load_config(config_paths)?;
    let settings = loaded.settings()?;
    let secrets = resolve_secrets(&settings, ConfigMode::Cli)?;
    tracing::info!(config_hash = %loaded.config_hash, "config loaded");

    let store = open_store().await?;
    let source = HttpLedger::from_settings(
        "source",
        &settings.source,
        secrets.source_token.unwrap_or_default(),
    )?;
    let target = HttpLedger::from_settings(
        "target",
        &settings.target,
        secrets.target_token.unwrap_or_default(),
    )?;

    Ok(SyncEngine::new(
        store,
        Arc::new(source),
        Arc::new(target),
        settings.ready_states,
    ))
}

// ---------------------------------------------------------------------------
// Argument parsers (clap value_parser)
// ---------------------------------------------------------------------------

pub fn parse_sync_status(s: &str) -> Result<SyncStatus, String> {
    SyncStatus::parse(&s.trim().to_lowercase()).ok_or_else(|| {
        format!("invalid status '{s}'. expected one of: waiting_for_confirm | pending | synced | failed")
    })
}

pub fn parse_modification_status(s: &str) -> Result<ModificationStatus, String> {
    ModificationStatus::parse(&s.trim().to_lowercase()).ok_or_else(|| {
        format!("invalid modification status '{s}'. expected one of: waiting_for_approve | approved | resynced")
    })
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS[.mmm]`.
pub fn parse_start_moment(s: &str) -> Result<NaiveDateTime, String> {
    let raw = s.trim();
    if let Some(m) = parse_moment(raw) {
        return Ok(m);
    }
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| format!("invalid moment '{s}'. expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS"))
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("serialize output")?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_moment_accepts_date_only() {
        let m = parse_start_moment("2024-01-01").unwrap();
        assert_eq!(m.to_string(), "2024-01-01 00:00:00");
        assert!(parse_start_moment("2024-01-01 10:30:00").is_ok());
        assert!(parse_start_moment("01/01/2024").is_err());
    }

    #[test]
    fn status_parsers_are_case_insensitive() {
        assert_eq!(parse_sync_status("PENDING").unwrap(), SyncStatus::Pending);
        assert!(parse_sync_status("modified").is_err());
        assert_eq!(
            parse_modification_status("Waiting_For_Approve").unwrap(),
            ModificationStatus::WaitingForApprove
        );
    }
}
