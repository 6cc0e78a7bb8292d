// SPDX-FileCopyrightText: 2026 Credpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encrypted credential vault for credpool.
//!
//! Secrets are sealed with AES-256-GCM under a key derived from the master
//! passphrase and a persisted random salt via Argon2id. The key lives only
//! in memory. Structural fields (identifier, health, counters) stay in
//! cleartext so the scheduler never needs the key.

pub mod cipher;
pub mod kdf;
pub mod model;
pub mod prompt;
pub mod store;

pub use cipher::{SealedSecret, VaultKey};
pub use kdf::{KdfParams, Salt};
pub use model::{Credential, CredentialCollection, CredentialSummary, NewCredential};
pub use prompt::{get_vault_passphrase, get_vault_passphrase_with_confirm};
pub use store::CredentialStore;
