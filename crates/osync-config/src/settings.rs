//! Typed view over the merged config tree.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

/// Connection settings for one remote ledger instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LedgerSettings {
    pub base_url: String,
    /// NAME of the env var holding the bearer token.
    pub token_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Rows requested per list call.
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default = "default_interval_secs")]
    pub discovery_interval_secs: u64,
    #[serde(default = "default_interval_secs")]
    pub materialize_interval_secs: u64,
    /// Standalone reconciliation over SYNCED rows; 0 disables it.
    #[serde(default)]
    pub reconcile_interval_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            discovery_interval_secs: default_interval_secs(),
            materialize_interval_secs: default_interval_secs(),
            reconcile_interval_secs: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct SyncSection {
    /// Source-ledger state hrefs that mean "ready to fulfill".
    ready_states: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct DaemonSection {
    #[serde(default = "default_operator_token_env")]
    operator_token_env: String,
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            operator_token_env: default_operator_token_env(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawSettings {
    source_ledger: LedgerSettings,
    target_ledger: LedgerSettings,
    sync: SyncSection,
    #[serde(default)]
    scheduler: SchedulerSettings,
    #[serde(default)]
    daemon: DaemonSection,
}

/// Everything the engine and its hosts read from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub source: LedgerSettings,
    pub target: LedgerSettings,
    pub ready_states: Vec<String>,
    pub scheduler: SchedulerSettings,
    pub operator_token_env: String,
}

impl SyncSettings {
    pub fn from_config_json(config_json: &Value) -> Result<Self> {
        let raw: RawSettings =
            serde_json::from_value(config_json.clone()).context("invalid sync settings")?;

        for (name, ledger) in [("source_ledger", &raw.source_ledger), ("target_ledger", &raw.target_ledger)] {
            let url = ledger.base_url.trim();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                bail!("{name}.base_url must include http:// or https://");
            }
            if ledger.token_env.trim().is_empty() {
                bail!("{name}.token_env must not be empty");
            }
            if ledger.page_limit == 0 {
                bail!("{name}.page_limit must be > 0");
            }
        }

        let ready_states: Vec<String> = raw
            .sync
            .ready_states
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if ready_states.is_empty() {
            bail!("sync.ready_states must list at least one state href");
        }

        if raw.scheduler.discovery_interval_secs == 0 || raw.scheduler.materialize_interval_secs == 0 {
            bail!("scheduler intervals must be > 0");
        }

        Ok(Self {
            source: raw.source_ledger,
            target: raw.target_ledger,
            ready_states,
            scheduler: raw.scheduler,
            operator_token_env: raw.daemon.operator_token_env,
        })
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_page_limit() -> u32 {
    1000
}

fn default_interval_secs() -> u64 {
    300
}

fn default_operator_token_env() -> String {
    "OSYNC_OPERATOR_TOKEN".to_string()
}
