// SPDX-FileCopyrightText: 2026 Credpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential records and the in-memory credential collection.
//!
//! A credential's `health` is private: the only way to change it is
//! [`Credential::apply_health`], which goes through the health state machine.

use chrono::{DateTime, Duration, Utc};
use credpool_core::{
    CredentialId, Health, HealthEvent, HealthPolicy, Transition, TransitionError, VaultError,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cipher::{self, SealedSecret, VaultKey, KEY_CHECK_PLAINTEXT};
use crate::kdf::KdfParams;

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

/// One managed account.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    id: CredentialId,
    identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
    secret: SealedSecret,
    #[serde(default)]
    health: Health,
    #[serde(default)]
    total_uses: u64,
    #[serde(default)]
    consecutive_failures: u32,
    created_at: DateTime<Utc>,
    #[serde(default)]
    last_used_at: Option<DateTime<Utc>>,
    #[serde(default)]
    last_error: Option<String>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("identifier", &self.identifier)
            .field("secret", &"[REDACTED]")
            .field("health", &self.health)
            .field("total_uses", &self.total_uses)
            .field("consecutive_failures", &self.consecutive_failures)
            .field("last_used_at", &self.last_used_at)
            .finish()
    }
}

impl Credential {
    pub fn id(&self) -> &CredentialId {
        &self.id
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn health(&self) -> Health {
        self.health
    }

    pub fn total_uses(&self) -> u64 {
        self.total_uses
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn sealed_secret(&self) -> &SealedSecret {
        &self.secret
    }

    /// When this credential leaves its cooldown window. `None` if never used.
    ///
    /// A window reaching past the representable range saturates to
    /// [`DateTime::<Utc>::MAX_UTC`], i.e. cooling indefinitely.
    pub fn cooldown_expires_at(&self, cooldown: Duration) -> Option<DateTime<Utc>> {
        self.last_used_at.map(|at| {
            at.checked_add_signed(cooldown)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        })
    }

    /// Never used, or at least `cooldown` has elapsed since the last use.
    pub fn is_cooled_down(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        self.cooldown_expires_at(cooldown)
            .is_none_or(|expires| now >= expires)
    }

    /// Record a selection: bump `total_uses` and stamp `last_used_at`.
    pub fn mark_used(&mut self, now: DateTime<Utc>) {
        self.total_uses = self.total_uses.saturating_add(1);
        self.last_used_at = Some(now);
    }

    /// Reset the failure streak and clear the last error.
    pub fn clear_failures(&mut self) {
        self.consecutive_failures = 0;
        self.last_error = None;
    }

    /// Extend the failure streak, returning the new count.
    pub fn record_failure(&mut self, error: Option<String>) -> u32 {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if error.is_some() {
            self.last_error = error;
        }
        self.consecutive_failures
    }

    /// Drive the health state machine. The only path that changes `health`.
    pub fn apply_health(
        &mut self,
        policy: &HealthPolicy,
        event: HealthEvent,
    ) -> Result<Transition, TransitionError> {
        let transition = policy.next(self.health, event)?;
        self.health = transition.to;
        Ok(transition)
    }

    /// Everything about this credential except the secret.
    pub fn summary(&self) -> CredentialSummary {
        CredentialSummary {
            id: self.id.clone(),
            identifier: self.identifier.clone(),
            phone: self.phone.clone(),
            notes: self.notes.clone(),
            health: self.health,
            total_uses: self.total_uses,
            consecutive_failures: self.consecutive_failures,
            created_at: self.created_at,
            last_used_at: self.last_used_at,
            last_error: self.last_error.clone(),
        }
    }
}

/// Secret-free view of a credential for listing and display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CredentialSummary {
    pub id: CredentialId,
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub health: Health,
    pub total_uses: u64,
    pub consecutive_failures: u32,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Input for [`CredentialCollection::add`].
#[derive(Debug)]
pub struct NewCredential {
    pub identifier: String,
    pub secret: SecretString,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

impl NewCredential {
    pub fn new(identifier: impl Into<String>, secret: SecretString) -> Self {
        Self {
            identifier: identifier.into(),
            secret,
            phone: None,
            notes: None,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// The full persisted collection: header plus credentials in creation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialCollection {
    version: u32,
    /// KDF parameters the vault key was derived with.
    kdf: KdfParams,
    /// Known plaintext sealed under the vault key, for passphrase verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key_check: Option<SealedSecret>,
    /// Sequence number of the next credential id; never decreases.
    next_sequence: u64,
    #[serde(default)]
    credentials: Vec<Credential>,
}

impl CredentialCollection {
    /// An empty collection for a freshly initialized vault.
    pub fn new(key: &VaultKey, kdf: KdfParams) -> Result<Self, VaultError> {
        Ok(Self {
            version: FORMAT_VERSION,
            kdf,
            key_check: Some(cipher::encrypt(key, KEY_CHECK_PLAINTEXT)?),
            next_sequence: 1,
            credentials: Vec::new(),
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn kdf(&self) -> &KdfParams {
        &self.kdf
    }

    /// The known-format record used to verify a passphrase: the key-check
    /// blob, or the first stored secret for collections that predate it.
    pub fn probe(&self) -> Option<&SealedSecret> {
        self.key_check
            .as_ref()
            .or_else(|| self.credentials.first().map(|c| &c.secret))
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Credentials in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Credential> {
        self.credentials.iter()
    }

    pub fn get(&self, id: &CredentialId) -> Option<&Credential> {
        self.credentials.iter().find(|c| &c.id == id)
    }

    pub fn get_mut(&mut self, id: &CredentialId) -> Option<&mut Credential> {
        self.credentials.iter_mut().find(|c| &c.id == id)
    }

    pub fn summaries(&self) -> Vec<CredentialSummary> {
        self.credentials.iter().map(Credential::summary).collect()
    }

    /// Encrypt and insert a new credential, returning its id.
    ///
    /// Fails with `VaultLocked` when no key is available.
    pub fn add(
        &mut self,
        new: NewCredential,
        key: Option<&VaultKey>,
        now: DateTime<Utc>,
    ) -> Result<CredentialId, VaultError> {
        let key = key.ok_or(VaultError::VaultLocked)?;
        let secret = cipher::encrypt_secret(key, &new.secret)?;

        if self.iter().any(|c| c.identifier == new.identifier) {
            warn!(identifier = %new.identifier, "adding a credential whose identifier is already present");
        }

        let id = CredentialId::from_sequence(self.next_sequence);
        if self.get(&id).is_some() {
            return Err(VaultError::Corrupt {
                path: Default::default(),
                reason: format!("id sequence collides with existing credential {id}"),
            });
        }
        self.next_sequence += 1;

        self.credentials.push(Credential {
            id: id.clone(),
            identifier: new.identifier,
            phone: new.phone.filter(|p| !p.is_empty()),
            notes: new.notes.filter(|n| !n.is_empty()),
            secret,
            health: Health::Unknown,
            total_uses: 0,
            consecutive_failures: 0,
            created_at: now,
            last_used_at: None,
            last_error: None,
        });

        debug!(id = %id, "credential added");
        Ok(id)
    }

    /// Remove a credential. Fails with `NotFound` if the id is absent, so a
    /// retried removal reports the same error without side effects.
    pub fn remove(&mut self, id: &CredentialId) -> Result<Credential, VaultError> {
        let index = self
            .credentials
            .iter()
            .position(|c| &c.id == id)
            .ok_or_else(|| VaultError::NotFound(format!("credential {id}")))?;
        Ok(self.credentials.remove(index))
    }

    /// Decrypt one credential's secret on demand. Nothing is cached.
    pub fn get_secret(
        &self,
        id: &CredentialId,
        key: Option<&VaultKey>,
    ) -> Result<SecretString, VaultError> {
        let key = key.ok_or(VaultError::VaultLocked)?;
        let credential = self
            .get(id)
            .ok_or_else(|| VaultError::NotFound(format!("credential {id}")))?;
        cipher::decrypt_secret(key, &credential.secret)
    }

    /// Check structural invariants after loading from disk.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.version != FORMAT_VERSION {
            return Err(format!("unsupported format version {}", self.version));
        }
        let mut seen = std::collections::HashSet::new();
        for credential in &self.credentials {
            if !seen.insert(&credential.id) {
                return Err(format!("duplicate credential id {}", credential.id));
            }
        }
        Ok(())
    }
}
