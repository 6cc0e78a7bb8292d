// SPDX-FileCopyrightText: 2026 Credpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the credpool configuration system.

use credpool_config::diagnostic::ConfigError;
use credpool_config::model::CredpoolConfig;
use credpool_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_credpool_config() {
    let toml = r#"
[log]
level = "debug"

[storage]
credentials_path = "/tmp/credpool/credentials.json"
salt_path = "/tmp/credpool/.salt"
session_dir = "/tmp/credpool/sessions"

[vault]
kdf_memory_cost = 65536
kdf_iterations = 4
kdf_parallelism = 2
min_passphrase_len = 10

[rotation]
cooldown_minutes = 30
failure_threshold = 5
use_weight = 5.0
failure_weight = 25.0
cooldown_weight = 2.0
health_penalty = 80.0
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.log.level, "debug");
    assert_eq!(config.storage.credentials_path, "/tmp/credpool/credentials.json");
    assert_eq!(config.storage.salt_path, "/tmp/credpool/.salt");
    assert_eq!(config.storage.session_dir, "/tmp/credpool/sessions");
    assert_eq!(config.vault.kdf_iterations, 4);
    assert_eq!(config.vault.kdf_parallelism, 2);
    assert_eq!(config.vault.min_passphrase_len, 10);
    assert_eq!(config.rotation.cooldown_minutes, 30);
    assert_eq!(config.rotation.failure_threshold, 5);
    assert_eq!(config.rotation.use_weight, 5.0);
    assert_eq!(config.rotation.failure_weight, 25.0);
    assert_eq!(config.rotation.cooldown_weight, 2.0);
    assert_eq!(config.rotation.health_penalty, 80.0);
}

/// Empty config yields the documented rotation defaults.
#[test]
fn empty_toml_uses_defaults() {
    let config = load_and_validate_str("").expect("defaults should validate");
    let defaults = CredpoolConfig::default();

    assert_eq!(config.rotation.cooldown_minutes, 60);
    assert_eq!(config.rotation.failure_threshold, 3);
    assert_eq!(config.rotation.use_weight, 10.0);
    assert_eq!(config.rotation.failure_weight, 50.0);
    assert_eq!(config.rotation.cooldown_weight, 1.0);
    assert_eq!(config.rotation.health_penalty, 100.0);
    assert_eq!(config.vault.min_passphrase_len, 6);
    assert_eq!(config.storage.credentials_path, defaults.storage.credentials_path);
    assert_eq!(config.rotation.cooldown(), chrono::Duration::minutes(60));
}

#[test]
fn unknown_field_in_rotation_produces_error() {
    let toml = r#"
[rotation]
cooldown = 5
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("cooldown"),
        "error should mention unknown field or the bad key, got: {err_str}"
    );
}

#[test]
fn unknown_section_produces_error() {
    let toml = r#"
[accounts]
file = "x.yaml"
"#;

    assert!(load_config_from_str(toml).is_err());
}

#[test]
fn wrong_type_is_reported_as_invalid_type() {
    let toml = r#"
[rotation]
failure_threshold = "three"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject string threshold");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("failure_threshold"))),
        "expected InvalidType for failure_threshold, got: {errors:?}"
    );
}

#[test]
fn weak_kdf_fails_validation() {
    let toml = r#"
[vault]
kdf_memory_cost = 1024
"#;

    let errors = load_and_validate_str(toml).expect_err("weak KDF should be rejected");
    assert!(errors.iter().any(|e| e.to_string().contains("kdf_memory_cost")));
}

#[test]
fn negative_weight_fails_validation() {
    let toml = r#"
[rotation]
failure_weight = -50.0
"#;

    let errors = load_and_validate_str(toml).expect_err("negative weight should be rejected");
    assert!(matches!(errors[0], ConfigError::Validation { .. }));
}

#[test]
fn health_policy_follows_threshold() {
    let config = load_and_validate_str("[rotation]\nfailure_threshold = 7\n").unwrap();
    assert_eq!(config.rotation.health_policy().failure_threshold, 7);
}
