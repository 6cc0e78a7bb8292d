// SPDX-FileCopyrightText: 2026 Credpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Passphrase and secret acquisition via TTY prompt or `CREDPOOL_VAULT_KEY`.

use std::io::IsTerminal;

use credpool_core::CredpoolError;
use secrecy::{ExposeSecret, SecretString};

/// The environment variable name for providing the vault passphrase.
pub const VAULT_KEY_ENV_VAR: &str = "CREDPOOL_VAULT_KEY";

fn from_env() -> Option<SecretString> {
    std::env::var(VAULT_KEY_ENV_VAR)
        .ok()
        .filter(|key| !key.is_empty())
        .map(SecretString::from)
}

fn read_hidden(prompt: &str) -> Result<SecretString, CredpoolError> {
    eprint!("{prompt}");
    rpassword::read_password()
        .map(SecretString::from)
        .map_err(|e| CredpoolError::Internal(format!("failed to read from terminal: {e}")))
}

fn no_passphrase() -> CredpoolError {
    CredpoolError::Config(format!(
        "no passphrase provided; set {VAULT_KEY_ENV_VAR} or run interactively"
    ))
}

/// Get the vault passphrase to unlock an existing vault.
///
/// Priority:
/// 1. `CREDPOOL_VAULT_KEY` environment variable (headless use)
/// 2. Interactive TTY prompt via `rpassword`
pub fn get_vault_passphrase() -> Result<SecretString, CredpoolError> {
    if let Some(key) = from_env() {
        return Ok(key);
    }

    if !std::io::stdin().is_terminal() {
        return Err(no_passphrase());
    }

    let passphrase = read_hidden("Vault passphrase: ")?;
    if passphrase.expose_secret().is_empty() {
        return Err(CredpoolError::Config("empty passphrase not allowed".to_string()));
    }
    Ok(passphrase)
}

/// Get a new vault passphrase, prompting twice when interactive.
///
/// Enforces `min_len` on both sources: a weak passphrase cannot be undone
/// once secrets are sealed under it.
pub fn get_vault_passphrase_with_confirm(min_len: usize) -> Result<SecretString, CredpoolError> {
    let passphrase = match from_env() {
        Some(key) => key,
        None if std::io::stdin().is_terminal() => {
            let first = read_hidden("New vault passphrase: ")?;
            let second = read_hidden("Confirm vault passphrase: ")?;
            if first.expose_secret() != second.expose_secret() {
                return Err(CredpoolError::Config("passphrases do not match".to_string()));
            }
            first
        }
        None => return Err(no_passphrase()),
    };

    check_passphrase_strength(&passphrase, min_len)?;
    Ok(passphrase)
}

/// Reject passphrases shorter than `min_len` characters.
pub fn check_passphrase_strength(passphrase: &SecretString, min_len: usize) -> Result<(), CredpoolError> {
    let len = passphrase.expose_secret().chars().count();
    if len < min_len {
        return Err(CredpoolError::Config(format!(
            "passphrase must be at least {min_len} characters"
        )));
    }
    Ok(())
}

/// Read an account secret from the terminal without echo.
pub fn read_account_secret(identifier: &str) -> Result<SecretString, CredpoolError> {
    if !std::io::stdin().is_terminal() {
        return Err(CredpoolError::Config(
            "account secrets can only be entered interactively".to_string(),
        ));
    }
    let secret = read_hidden(&format!("Secret for {identifier}: "))?;
    if secret.expose_secret().is_empty() {
        return Err(CredpoolError::Config("empty secret not allowed".to_string()));
    }
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn get_passphrase_from_env_var() {
        // SAFETY: test-only env mutation; env tests are serialized.
        unsafe { std::env::set_var(VAULT_KEY_ENV_VAR, "Tr0ub4dor&3") };
        let result = get_vault_passphrase();
        unsafe { std::env::remove_var(VAULT_KEY_ENV_VAR) };

        assert_eq!(result.unwrap().expose_secret(), "Tr0ub4dor&3");
    }

    #[test]
    #[serial]
    fn short_env_passphrase_is_rejected_on_create() {
        unsafe { std::env::set_var(VAULT_KEY_ENV_VAR, "abc") };
        let result = get_vault_passphrase_with_confirm(6);
        unsafe { std::env::remove_var(VAULT_KEY_ENV_VAR) };

        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn empty_env_var_is_rejected() {
        unsafe { std::env::set_var(VAULT_KEY_ENV_VAR, "") };
        // In CI/test, stdin is not a terminal, so this will fail.
        let result = get_vault_passphrase();
        unsafe { std::env::remove_var(VAULT_KEY_ENV_VAR) };

        assert!(result.is_err());
    }

    #[test]
    fn strength_counts_characters_not_bytes() {
        let pass = SecretString::from("密码密码密码".to_string());
        assert!(check_passphrase_strength(&pass, 6).is_ok());
        assert!(check_passphrase_strength(&pass, 7).is_err());
    }
}
