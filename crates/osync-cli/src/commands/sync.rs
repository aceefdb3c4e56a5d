//! One-shot passes from the command line.
//!
//! Exit status is non-zero only when the pass itself fails; per-order
//! failures are persisted and show up in the printed report.

use anyhow::Result;

use super::{build_engine, print_json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    All,
    Pending,
    Statuses,
    Reconcile,
}

pub async fn run(pass: Pass, config_paths: &[String]) -> Result<()> {
    let engine = build_engine(config_paths).await?;

    match pass {
        Pass::All => print_json(&engine.run_full().await?),
        Pass::Pending => print_json(&engine.run_materialization().await?),
        Pass::Statuses => print_json(&engine.run_discovery().await?),
        Pass::Reconcile => print_json(&engine.run_reconciliation().await?),
    }
}
