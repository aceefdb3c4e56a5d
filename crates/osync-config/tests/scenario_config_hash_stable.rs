//! Config hash stability.
//!
//! GREEN when:
//! - the same YAML loaded twice yields the same config_hash;
//! - reordering keys does not change the hash;
//! - different values change the hash;
//! - an overlay layer overrides the base and still hashes stably.

use osync_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
source_ledger:
  base_url: "https://source.example/api/remap/1.2"
  token_env: "OSYNC_SOURCE_TOKEN"
target_ledger:
  base_url: "https://target.example/api/remap/1.2"
  token_env: "OSYNC_TARGET_TOKEN"
scheduler:
  discovery_interval_secs: 300
  materialize_interval_secs: 300
"#;

const BASE_YAML_REORDERED: &str = r#"
scheduler:
  materialize_interval_secs: 300
  discovery_interval_secs: 300
target_ledger:
  token_env: "OSYNC_TARGET_TOKEN"
  base_url: "https://target.example/api/remap/1.2"
source_ledger:
  token_env: "OSYNC_SOURCE_TOKEN"
  base_url: "https://source.example/api/remap/1.2"
"#;

const OVERLAY_YAML: &str = r#"
scheduler:
  discovery_interval_secs: 60
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();

    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let original = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let reordered = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();

    assert_eq!(
        original.config_hash, reordered.config_hash,
        "key order in the source YAML must not change the hash"
    );
}

#[test]
fn different_values_produce_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();

    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_overrides_and_hashes_stably() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);

    let discovery = a
        .config_json
        .pointer("/scheduler/discovery_interval_secs")
        .and_then(|v| v.as_u64())
        .unwrap();
    assert_eq!(discovery, 60);

    let materialize = a
        .config_json
        .pointer("/scheduler/materialize_interval_secs")
        .and_then(|v| v.as_u64())
        .unwrap();
    assert_eq!(materialize, 300, "keys absent from the overlay keep base values");
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}
