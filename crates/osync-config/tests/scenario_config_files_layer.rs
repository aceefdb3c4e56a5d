//! Loading from files on disk, in merge order.

use std::io::Write;

use osync_config::load_layered_yaml;

#[test]
fn files_merge_in_the_given_order() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.yaml");
    let site = dir.path().join("site.yaml");

    let mut f = std::fs::File::create(&base).unwrap();
    writeln!(
        f,
        "source_ledger:\n  base_url: https://source.example/api\n  token_env: SRC\n\
         target_ledger:\n  base_url: https://target.example/api\n  token_env: DST\n\
         sync:\n  ready_states: [\"s-ready\"]\n"
    )
    .unwrap();
    let mut f = std::fs::File::create(&site).unwrap();
    writeln!(f, "scheduler:\n  materialize_interval_secs: 120\n").unwrap();

    let loaded = load_layered_yaml(&[base.to_str().unwrap(), site.to_str().unwrap()]).unwrap();
    let settings = loaded.settings().unwrap();
    assert_eq!(settings.scheduler.materialize_interval_secs, 120);
    assert_eq!(settings.scheduler.discovery_interval_secs, 300);
    assert_eq!(settings.ready_states, vec!["s-ready".to_string()]);
}

#[test]
fn missing_file_names_the_path() {
    let err = load_layered_yaml(&["/definitely/not/here.yaml"])
        .unwrap_err()
        .to_string();
    assert!(err.contains("/definitely/not/here.yaml"), "{err}");
}

#[test]
fn shipped_base_config_is_complete_for_the_daemon() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/base.yaml");
    let loaded = load_layered_yaml(&[path.to_str().unwrap()]).unwrap();
    let settings = loaded.settings().unwrap();
    assert_eq!(settings.operator_token_env, "OSYNC_OPERATOR_TOKEN");
    assert!(!settings.ready_states.is_empty());

    let report = osync_config::report_unused_keys(
        osync_config::ConfigMode::Daemon,
        &loaded.config_json,
        osync_config::UnusedKeyPolicy::Fail,
    )
    .unwrap();
    assert!(report.is_clean());
}
