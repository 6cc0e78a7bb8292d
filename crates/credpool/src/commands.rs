// SPDX-FileCopyrightText: 2026 Credpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vault lifecycle and rotation subcommands.

use chrono::Duration;
use credpool_config::CredpoolConfig;
use credpool_config::model::MAX_COOLDOWN_MINUTES;
use credpool_core::{CredentialId, CredpoolError, Health, Outcome, Transition};
use credpool_rotation::{Vault, VaultHandle};
use credpool_vault::prompt::read_account_secret;
use credpool_vault::{NewCredential, get_vault_passphrase, get_vault_passphrase_with_confirm};

/// Unlock the configured vault, prompting for the passphrase.
pub async fn open_vault(config: &CredpoolConfig) -> Result<VaultHandle, CredpoolError> {
    let vault = Vault::new(config);
    if !vault.is_initialized() {
        return Err(CredpoolError::Config(
            "no vault found; run `credpool init` first".to_string(),
        ));
    }
    let passphrase = get_vault_passphrase()?;
    Ok(vault.unlock(&passphrase).await?)
}

/// `credpool init`
pub async fn run_init(config: &CredpoolConfig) -> Result<(), CredpoolError> {
    let vault = Vault::new(config);
    if vault.is_initialized() {
        return Err(credpool_core::VaultError::AlreadyInitialized(
            vault.store().credentials_path().to_path_buf(),
        )
        .into());
    }

    let passphrase = get_vault_passphrase_with_confirm(config.vault.min_passphrase_len)?;
    vault.initialize(&passphrase).await?;

    eprintln!(
        "credpool: vault created at {}",
        vault.store().credentials_path().display()
    );
    Ok(())
}

/// `credpool add <identifier>`
pub async fn run_add(
    config: &CredpoolConfig,
    identifier: String,
    phone: Option<String>,
    notes: Option<String>,
) -> Result<(), CredpoolError> {
    let handle = open_vault(config).await?;
    let secret = read_account_secret(&identifier)?;

    let mut new = NewCredential::new(identifier, secret);
    if let Some(phone) = phone {
        new = new.with_phone(phone);
    }
    if let Some(notes) = notes {
        new = new.with_notes(notes);
    }

    let id = handle.add_credential(new).await?;
    println!("{id}");
    Ok(())
}

/// `credpool remove <id>`
pub async fn run_remove(config: &CredpoolConfig, id: &CredentialId) -> Result<(), CredpoolError> {
    let handle = open_vault(config).await?;
    handle.remove_credential(id).await?;
    eprintln!("credpool: removed {id}");
    Ok(())
}

/// `credpool next`: reserve a credential and print its id and session path.
pub async fn run_next(
    config: &CredpoolConfig,
    ignore_cooldown: bool,
    cooldown_minutes: Option<u64>,
) -> Result<(), CredpoolError> {
    let handle = open_vault(config).await?;
    let cooldown = cooldown_minutes
        .map(cooldown_from_minutes)
        .unwrap_or_else(|| handle.cooldown());

    let id = handle.select_next(cooldown, ignore_cooldown).await?;
    println!("{id}");
    eprintln!(
        "credpool: session artifact at {}",
        handle.session_artifact_path(&id).display()
    );
    Ok(())
}

/// `credpool report <id> <outcome>`
pub async fn run_report(
    config: &CredpoolConfig,
    id: &CredentialId,
    outcome: Outcome,
) -> Result<(), CredpoolError> {
    let handle = open_vault(config).await?;
    let transition = handle.report_outcome(id, outcome).await?;
    print_transition(id, &transition);
    Ok(())
}

/// `credpool mark <id> <health>`
pub async fn run_mark(
    config: &CredpoolConfig,
    id: &CredentialId,
    health: Health,
) -> Result<(), CredpoolError> {
    let handle = open_vault(config).await?;
    let transition = handle.override_health(id, health).await?;
    print_transition(id, &transition);
    Ok(())
}

fn print_transition(id: &CredentialId, transition: &Transition) {
    if transition.changed() {
        println!("{id}: {} -> {}", transition.from, transition.to);
    } else {
        println!("{id}: {}", transition.to);
    }
}

fn cooldown_from_minutes(minutes: u64) -> Duration {
    let minutes = i64::try_from(minutes)
        .unwrap_or(i64::MAX)
        .min(MAX_COOLDOWN_MINUTES);
    Duration::minutes(minutes)
}
