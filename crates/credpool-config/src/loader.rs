// SPDX-FileCopyrightText: 2026 Credpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./credpool.toml` > `~/.config/credpool/credpool.toml` >
//! `/etc/credpool/credpool.toml` with environment variable overrides via `CREDPOOL_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::CredpoolConfig;

/// Config files in merge order (earlier is overridden by later).
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/credpool/credpool.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("credpool/credpool.toml"));
    }
    paths.push(PathBuf::from("credpool.toml"));
    paths
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/credpool/credpool.toml` (system-wide)
/// 3. `~/.config/credpool/credpool.toml` (user XDG config)
/// 4. `./credpool.toml` (local directory)
/// 5. `CREDPOOL_*` environment variables
pub fn load_config() -> Result<CredpoolConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<CredpoolConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CredpoolConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CredpoolConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CredpoolConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    config_search_paths()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(CredpoolConfig::default())),
            |figment, path| figment.merge(Toml::file(path)),
        )
        .merge(env_provider())
}

/// Create the environment variable provider.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `CREDPOOL_ROTATION_COOLDOWN_MINUTES` must map to
/// `rotation.cooldown_minutes`, not `rotation.cooldown.minutes`.
/// `CREDPOOL_VAULT_KEY` is the passphrase and is never treated as config.
pub(crate) fn env_provider() -> Env {
    Env::prefixed("CREDPOOL_")
        .ignore(&["vault_key"])
        .map(|key| {
            let mapped = key
                .as_str()
                .replacen("log_", "log.", 1)
                .replacen("storage_", "storage.", 1)
                .replacen("vault_", "vault.", 1)
                .replacen("rotation_", "rotation.", 1);
            mapped.into()
        })
}
