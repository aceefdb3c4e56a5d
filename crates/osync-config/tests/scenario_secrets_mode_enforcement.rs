//! Mode-aware secret enforcement.
//!
//! All failure cases use sentinel env var names that are never set anywhere,
//! so no test mutates the process environment.

use osync_config::{
    load_layered_yaml_from_strings, report_unused_keys, resolve_secrets, ConfigMode,
    UnusedKeyPolicy,
};

fn settings(source_env: &str, target_env: &str, operator_env: &str) -> osync_config::SyncSettings {
    let yaml = format!(
        r#"
source_ledger:
  base_url: "https://source.example/api"
  token_env: "{source_env}"
target_ledger:
  base_url: "https://target.example/api"
  token_env: "{target_env}"
sync:
  ready_states:
    - "https://source.example/api/entity/customerorder/metadata/states/shipped"
daemon:
  operator_token_env: "{operator_env}"
"#
    );
    load_layered_yaml_from_strings(&[yaml.as_str()])
        .unwrap()
        .settings()
        .unwrap()
}

#[test]
fn daemon_mode_fails_when_source_token_missing() {
    let s = settings(
        "OSYNC_SENTINEL_SRC_MISSING_D1",
        "OSYNC_SENTINEL_DST_MISSING_D1",
        "OSYNC_SENTINEL_OP_MISSING_D1",
    );
    let msg = resolve_secrets(&s, ConfigMode::Daemon)
        .unwrap_err()
        .to_string();
    assert!(msg.contains("SECRETS_MISSING"), "{msg}");
    assert!(msg.contains("mode=DAEMON"), "{msg}");
    assert!(msg.contains("OSYNC_SENTINEL_SRC_MISSING_D1"), "error must name the env var: {msg}");
}

#[test]
fn cli_mode_fails_when_tokens_missing() {
    let s = settings(
        "OSYNC_SENTINEL_SRC_MISSING_C1",
        "OSYNC_SENTINEL_DST_MISSING_C1",
        "OSYNC_SENTINEL_OP_MISSING_C1",
    );
    let msg = resolve_secrets(&s, ConfigMode::Cli).unwrap_err().to_string();
    assert!(msg.contains("mode=CLI"), "{msg}");
}

#[test]
fn offline_mode_requires_nothing() {
    let s = settings(
        "OSYNC_SENTINEL_SRC_MISSING_O1",
        "OSYNC_SENTINEL_DST_MISSING_O1",
        "OSYNC_SENTINEL_OP_MISSING_O1",
    );
    let resolved = resolve_secrets(&s, ConfigMode::Offline).unwrap();
    assert!(resolved.source_token.is_none());
    assert!(resolved.operator_token.is_none());
}

#[test]
fn literal_token_in_yaml_is_refused() {
    let yaml = r#"
source_ledger:
  base_url: "https://source.example/api"
  token_env: "Bearer abcdef0123456789"
"#;
    let msg = load_layered_yaml_from_strings(&[yaml])
        .unwrap_err()
        .to_string();
    assert!(msg.contains("CONFIG_SECRET_DETECTED"), "{msg}");
    assert!(!msg.contains("abcdef0123456789"), "value must be redacted: {msg}");
}

#[test]
fn unknown_section_is_reported_unused() {
    let yaml = r#"
sync:
  ready_states: ["s1"]
reports:
  pdf: true
"#;
    let cfg = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(ConfigMode::Daemon, &cfg.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert_eq!(report.unused_leaf_pointers, vec!["/reports/pdf".to_string()]);
    assert!(report_unused_keys(ConfigMode::Daemon, &cfg.config_json, UnusedKeyPolicy::Fail).is_err());
}
