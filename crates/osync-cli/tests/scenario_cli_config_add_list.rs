use assert_cmd::prelude::*;
use predicates::prelude::*;

/// DB-backed; skipped if OSYNC_DATABASE_URL is not set.
#[tokio::test]
async fn config_add_then_list() -> anyhow::Result<()> {
    let url = match std::env::var(osync_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: OSYNC_DATABASE_URL not set");
            return Ok(());
        }
    };
    let pool = osync_db::connect(&url).await?;
    osync_db::migrate(&pool).await?;

    let name = format!("cli-{}", chrono::Utc::now().timestamp_micros());

    let mut add = std::process::Command::cargo_bin("osync")?;
    add.env(osync_db::ENV_DB_URL, &url).args([
        "config",
        "add",
        "--name",
        &name,
        "--counterparty",
        "cp-cli",
        "--organization",
        "org-1",
        "--group",
        "grp-1",
        "--store",
        "store-1",
        "--start",
        "2024-01-01",
    ]);
    add.assert()
        .success()
        .stdout(predicate::str::contains("config_id="))
        .stdout(predicate::str::contains("active=true"));

    let mut list = std::process::Command::cargo_bin("osync")?;
    list.env(osync_db::ENV_DB_URL, &url).args(["config", "list"]);
    list.assert()
        .success()
        .stdout(predicate::str::contains(name.as_str()))
        .stdout(predicate::str::contains("2024-01-01T00:00:00"));
    Ok(())
}
