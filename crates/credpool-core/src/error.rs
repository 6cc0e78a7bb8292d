// SPDX-FileCopyrightText: 2026 Credpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for credpool.
//!
//! None of these errors ever carry plaintext secrets or key material.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{CredentialId, Health};

/// Errors raised by the secret cipher and the credential store.
#[derive(Debug, Error)]
pub enum VaultError {
    /// An operation needed the vault key but the vault is locked.
    #[error("vault is locked")]
    VaultLocked,

    /// `initialize` was called but a salt already exists.
    #[error("vault already initialized (salt exists at {0})")]
    AlreadyInitialized(PathBuf),

    /// The passphrase did not decrypt the known-format check record.
    #[error("invalid passphrase or corrupted vault -- decryption failed")]
    InvalidPassphrase,

    /// A ciphertext failed its integrity check (wrong key, corruption, tampering).
    #[error("decryption failed -- wrong key or corrupted data")]
    DecryptionFailed,

    /// The requested item (credential, store, or salt) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The persisted structure could not be parsed.
    #[error("corrupt store at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Filesystem errors while loading or saving.
    #[error("vault I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Cryptographic primitive failures other than integrity checks
    /// (RNG failure, invalid KDF parameters).
    #[error("crypto error: {0}")]
    Crypto(String),
}

impl VaultError {
    /// Shorthand for wrapping an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised by the rotation scheduler and usage recorder.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// No eligible credential exists. A normal, recoverable condition.
    #[error("no eligible credential available")]
    NoneAvailable,

    /// A caller referenced a credential id that is not in the collection.
    #[error("unknown credential id `{0}`")]
    UnknownCredential(CredentialId),

    /// Internal bookkeeping invariant was violated.
    #[error("scheduler invariant violated: {0}")]
    Invariant(String),
}

/// Rejected health transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// `Banned` is terminal; the credential must be removed and re-added.
    #[error("no transition permitted out of terminal state {from}")]
    Terminal { from: Health },
}

/// The umbrella error type used at crate boundaries.
#[derive(Debug, Error)]
pub enum CredpoolError {
    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Configuration errors (invalid TOML, failed validation).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CredpoolError {
    /// Whether this is the recoverable "nothing to hand out right now" case.
    pub fn is_none_available(&self) -> bool {
        matches!(self, Self::Scheduler(SchedulerError::NoneAvailable))
    }

    /// Whether this error was caused by a caller bug rather than by data.
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            Self::Scheduler(SchedulerError::UnknownCredential(_))
                | Self::Scheduler(SchedulerError::Invariant(_))
                | Self::Internal(_)
        )
    }
}
