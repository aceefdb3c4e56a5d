use std::io::Write;

use assert_cmd::prelude::*;
use predicates::prelude::*;

fn yaml_file(body: &str) -> anyhow::Result<tempfile::NamedTempFile> {
    let mut f = tempfile::NamedTempFile::new()?;
    f.write_all(body.as_bytes())?;
    Ok(f)
}

#[test]
fn config_hash_is_stable_across_key_order() -> anyhow::Result<()> {
    let a = yaml_file("sync:\n  ready_states: [x]\nscheduler:\n  discovery_interval_secs: 60\n")?;
    let b = yaml_file("scheduler:\n  discovery_interval_secs: 60\nsync:\n  ready_states: [x]\n")?;

    let out_a = std::process::Command::cargo_bin("osync")?
        .args(["config-hash", &a.path().to_string_lossy()])
        .output()?;
    let out_b = std::process::Command::cargo_bin("osync")?
        .args(["config-hash", &b.path().to_string_lossy()])
        .output()?;

    assert!(out_a.status.success());
    let first_line = |o: &std::process::Output| {
        String::from_utf8_lossy(&o.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string()
    };
    assert!(first_line(&out_a).starts_with("config_hash="));
    assert_eq!(first_line(&out_a), first_line(&out_b));
    Ok(())
}

#[test]
fn config_hash_refuses_literal_secrets() -> anyhow::Result<()> {
    let f = yaml_file("source_ledger:\n  token_env: \"sk-live-abcdef\"\n")?;

    assert_cmd::Command::cargo_bin("osync")?
        .args(["config-hash", &f.path().to_string_lossy()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_SECRET_DETECTED"));
    Ok(())
}

#[test]
fn orders_list_rejects_unknown_status_before_connecting() -> anyhow::Result<()> {
    assert_cmd::Command::cargo_bin("osync")?
        .env_remove(osync_db::ENV_DB_URL)
        .args(["orders", "list", "--status", "modified"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid status"));
    Ok(())
}
