// SPDX-FileCopyrightText: 2026 Credpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-empty paths, KDF cost floors, and non-negative weights.

use crate::diagnostic::ConfigError;
use crate::model::{CredpoolConfig, MAX_COOLDOWN_MINUTES};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &CredpoolConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.log.level.to_ascii_lowercase().as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "log.level `{}` is not one of {}",
                config.log.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    for (key, value) in [
        ("storage.credentials_path", &config.storage.credentials_path),
        ("storage.salt_path", &config.storage.salt_path),
        ("storage.session_dir", &config.storage.session_dir),
    ] {
        if value.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("{key} must not be empty"),
            });
        }
    }

    if config.storage.credentials_path == config.storage.salt_path {
        errors.push(ConfigError::Validation {
            message: "storage.salt_path must differ from storage.credentials_path".to_string(),
        });
    }

    // Validate vault KDF parameters
    if config.vault.kdf_memory_cost < 32768 {
        errors.push(ConfigError::Validation {
            message: format!(
                "vault.kdf_memory_cost must be at least 32768 (32 MiB), got {}",
                config.vault.kdf_memory_cost
            ),
        });
    }

    if config.vault.kdf_iterations < 2 {
        errors.push(ConfigError::Validation {
            message: format!(
                "vault.kdf_iterations must be at least 2, got {}",
                config.vault.kdf_iterations
            ),
        });
    }

    if config.vault.kdf_parallelism < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "vault.kdf_parallelism must be at least 1, got {}",
                config.vault.kdf_parallelism
            ),
        });
    }

    // Validate rotation policy
    if config.rotation.failure_threshold < 1 {
        errors.push(ConfigError::Validation {
            message: "rotation.failure_threshold must be at least 1".to_string(),
        });
    }

    if config.rotation.cooldown_minutes > MAX_COOLDOWN_MINUTES as u64 {
        errors.push(ConfigError::Validation {
            message: format!(
                "rotation.cooldown_minutes must be at most {MAX_COOLDOWN_MINUTES}, got {}",
                config.rotation.cooldown_minutes
            ),
        });
    }

    for (key, weight) in [
        ("rotation.use_weight", config.rotation.use_weight),
        ("rotation.failure_weight", config.rotation.failure_weight),
        ("rotation.cooldown_weight", config.rotation.cooldown_weight),
        ("rotation.health_penalty", config.rotation.health_penalty),
    ] {
        if !weight.is_finite() || weight < 0.0 {
            errors.push(ConfigError::Validation {
                message: format!("{key} must be a finite non-negative number, got {weight}"),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
