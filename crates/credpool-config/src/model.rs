// SPDX-FileCopyrightText: 2026 Credpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for credpool.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::path::PathBuf;

use credpool_core::HealthPolicy;
use serde::{Deserialize, Serialize};

/// Top-level credpool configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CredpoolConfig {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,

    /// Where the credential collection, salt, and session artifacts live.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Key derivation and passphrase settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Scheduler weights, cooldown, and failure threshold.
    #[serde(default)]
    pub rotation: RotationConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Persistence locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path of the credential collection record (JSON).
    #[serde(default = "default_credentials_path")]
    pub credentials_path: String,

    /// Path of the salt record. Kept separate from the collection.
    #[serde(default = "default_salt_path")]
    pub salt_path: String,

    /// Directory holding per-credential session artifacts of the automation layer.
    #[serde(default = "default_session_dir")]
    pub session_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            salt_path: default_salt_path(),
            session_dir: default_session_dir(),
        }
    }
}

fn data_path(name: &str) -> String {
    dirs::data_dir()
        .map(|p| p.join("credpool").join(name))
        .unwrap_or_else(|| PathBuf::from(name))
        .to_string_lossy()
        .into_owned()
}

fn default_credentials_path() -> String {
    data_path("credentials.json")
}

fn default_salt_path() -> String {
    data_path(".salt")
}

fn default_session_dir() -> String {
    data_path("sessions")
}

/// Credential vault configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB).
    #[serde(default = "default_kdf_memory_cost")]
    pub kdf_memory_cost: u32,

    /// Argon2id iteration count (default: 3).
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    /// Argon2id parallelism lanes (default: 4).
    #[serde(default = "default_kdf_parallelism")]
    pub kdf_parallelism: u32,

    /// Shortest master passphrase accepted when creating a vault.
    #[serde(default = "default_min_passphrase_len")]
    pub min_passphrase_len: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            kdf_memory_cost: default_kdf_memory_cost(),
            kdf_iterations: default_kdf_iterations(),
            kdf_parallelism: default_kdf_parallelism(),
            min_passphrase_len: default_min_passphrase_len(),
        }
    }
}

fn default_kdf_memory_cost() -> u32 {
    65536 // 64 MiB per OWASP recommendation
}

fn default_kdf_iterations() -> u32 {
    3
}

fn default_kdf_parallelism() -> u32 {
    4
}

fn default_min_passphrase_len() -> usize {
    6
}

/// Rotation scheduler policy.
///
/// Lower scores are preferred:
/// `uses * use_weight + failures * failure_weight + cooldown_minutes_left * cooldown_weight + penalty`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RotationConfig {
    /// Minimum minutes between two uses of the same credential.
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u64,

    /// Consecutive failures that demote a credential to `limited`.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_use_weight")]
    pub use_weight: f64,

    #[serde(default = "default_failure_weight")]
    pub failure_weight: f64,

    #[serde(default = "default_cooldown_weight")]
    pub cooldown_weight: f64,

    /// Added to the score of any credential that is not `active`.
    #[serde(default = "default_health_penalty")]
    pub health_penalty: f64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            cooldown_minutes: default_cooldown_minutes(),
            failure_threshold: default_failure_threshold(),
            use_weight: default_use_weight(),
            failure_weight: default_failure_weight(),
            cooldown_weight: default_cooldown_weight(),
            health_penalty: default_health_penalty(),
        }
    }
}

impl RotationConfig {
    /// The configured cooldown window.
    pub fn cooldown(&self) -> chrono::Duration {
        let minutes = i64::try_from(self.cooldown_minutes)
            .unwrap_or(i64::MAX)
            .min(MAX_COOLDOWN_MINUTES);
        chrono::Duration::minutes(minutes)
    }

    /// Health thresholds derived from this policy.
    pub fn health_policy(&self) -> HealthPolicy {
        HealthPolicy {
            failure_threshold: self.failure_threshold,
        }
    }
}

/// Upper bound on the cooldown window (one year); larger values are rejected by validation.
pub const MAX_COOLDOWN_MINUTES: i64 = 525_600;

fn default_cooldown_minutes() -> u64 {
    60
}

fn default_failure_threshold() -> u32 {
    credpool_core::health::DEFAULT_FAILURE_THRESHOLD
}

fn default_use_weight() -> f64 {
    10.0
}

fn default_failure_weight() -> f64 {
    50.0
}

fn default_cooldown_weight() -> f64 {
    1.0
}

fn default_health_penalty() -> f64 {
    100.0
}
