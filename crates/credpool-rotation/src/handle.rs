// SPDX-FileCopyrightText: 2026 Credpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The vault facade used by the automation layer and the CLI.
//!
//! [`Vault`] is built eagerly at startup from configuration and yields a
//! [`VaultHandle`] on `initialize` or `unlock`. The handle owns the vault key
//! and the collection behind one async mutex; every operation, including
//! the persist it triggers, runs inside that critical section. Selecting a
//! credential and recording its use happen under the same lock, so two
//! concurrent callers never reserve the same credential.
//!
//! Mutations are staged on a copy of the collection and only become visible
//! after the store write succeeded.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Duration;
use credpool_config::CredpoolConfig;
use credpool_config::model::RotationConfig;
use credpool_core::{
    Clock, CredentialId, CredpoolError, Health, HealthPolicy, Outcome, SchedulerError,
    SystemClock, Transition, VaultError,
};
use credpool_vault::{
    CredentialCollection, CredentialStore, CredentialSummary, KdfParams, NewCredential, VaultKey,
    cipher,
};
use secrecy::SecretString;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::recorder::UsageRecorder;
use crate::scheduler::{Scheduler, SelectionKind};

/// Unopened vault: storage locations and policy, no key.
pub struct Vault {
    store: CredentialStore,
    kdf: KdfParams,
    rotation: RotationConfig,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("store", &self.store)
            .field("kdf", &self.kdf)
            .finish_non_exhaustive()
    }
}

impl Vault {
    pub fn new(config: &CredpoolConfig) -> Self {
        Self::with_clock(
            CredentialStore::from_config(&config.storage),
            KdfParams::from(&config.vault),
            config.rotation.clone(),
            Arc::new(SystemClock),
        )
    }

    /// Full control over every collaborator; used by tests with a manual clock.
    pub fn with_clock(
        store: CredentialStore,
        kdf: KdfParams,
        rotation: RotationConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            kdf,
            rotation,
            clock,
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Whether either persisted artifact already exists.
    pub fn is_initialized(&self) -> bool {
        self.store.is_initialized() || self.store.credentials_path().exists()
    }

    /// Create a new vault protected by `passphrase` and return it unlocked.
    ///
    /// Refuses with `AlreadyInitialized` if a salt or a collection exists.
    pub async fn initialize(&self, passphrase: &SecretString) -> Result<VaultHandle, VaultError> {
        if self.store.credentials_path().exists() {
            return Err(VaultError::AlreadyInitialized(
                self.store.credentials_path().to_path_buf(),
            ));
        }

        let (salt, key) = cipher::initialize(passphrase, &self.kdf)?;
        self.store.write_salt(&salt)?;

        let collection = CredentialCollection::new(&key, self.kdf)?;
        self.store.persist(&collection).await?;

        info!(path = %self.store.credentials_path().display(), "vault initialized");
        Ok(self.handle(key, collection))
    }

    /// Re-derive the key from `passphrase` and load the collection.
    ///
    /// `NotFound` if the vault was never initialized, `InvalidPassphrase` if
    /// the key does not open the collection's key-check record.
    pub async fn unlock(&self, passphrase: &SecretString) -> Result<VaultHandle, VaultError> {
        let salt = self.store.read_salt()?;

        let (key, collection) = match self.store.load() {
            Ok(collection) => {
                let key = cipher::unlock(passphrase, &salt, collection.kdf(), collection.probe())?;
                (key, collection)
            }
            Err(VaultError::NotFound(_)) => {
                // Initialization stopped between the salt and the first save.
                warn!(
                    path = %self.store.credentials_path().display(),
                    "salt present without a credential store; starting an empty collection"
                );
                let key = cipher::unlock(passphrase, &salt, &self.kdf, None)?;
                let collection = CredentialCollection::new(&key, self.kdf)?;
                self.store.persist(&collection).await?;
                (key, collection)
            }
            Err(e) => return Err(e),
        };

        info!(credentials = collection.len(), "vault unlocked");
        Ok(self.handle(key, collection))
    }

    fn handle(&self, key: VaultKey, collection: CredentialCollection) -> VaultHandle {
        VaultHandle {
            inner: Arc::new(Inner {
                store: self.store.clone(),
                scheduler: Scheduler::from_config(&self.rotation),
                policy: self.rotation.health_policy(),
                cooldown: self.rotation.cooldown(),
                clock: Arc::clone(&self.clock),
                session: Mutex::new(Some(Session { key, collection })),
            }),
        }
    }
}

/// Counts over the whole pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStatistics {
    pub total: usize,
    pub by_health: BTreeMap<Health, usize>,
    /// Sum of `total_uses` across credentials.
    pub total_uses: u64,
    /// Eligible credentials inside their cooldown window.
    pub cooling: usize,
    /// Eligible and cooled down: what `select_next` could hand out right now.
    pub available: usize,
}

struct Session {
    key: VaultKey,
    collection: CredentialCollection,
}

struct Inner {
    store: CredentialStore,
    scheduler: Scheduler,
    policy: HealthPolicy,
    cooldown: Duration,
    clock: Arc<dyn Clock>,
    /// `None` once locked.
    session: Mutex<Option<Session>>,
}

/// An unlocked vault. Cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct VaultHandle {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for VaultHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultHandle")
            .field("store", &self.inner.store)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl VaultHandle {
    fn recorder(&self) -> UsageRecorder<'_> {
        UsageRecorder::new(&self.inner.store, self.inner.policy)
    }

    /// The configured cooldown window.
    pub fn cooldown(&self) -> Duration {
        self.inner.cooldown
    }

    /// Where the automation layer keeps session state for `id`.
    pub fn session_artifact_path(&self, id: &CredentialId) -> PathBuf {
        self.inner.store.session_artifact_path(id)
    }

    pub async fn is_unlocked(&self) -> bool {
        self.inner.session.lock().await.is_some()
    }

    /// Drop the key and the collection. Every clone is locked afterwards.
    pub async fn lock(&self) {
        if self.inner.session.lock().await.take().is_some() {
            info!("vault locked");
        }
    }

    pub async fn add_credential(&self, new: NewCredential) -> Result<CredentialId, VaultError> {
        let mut guard = self.inner.session.lock().await;
        let session = guard.as_mut().ok_or(VaultError::VaultLocked)?;

        let mut staged = session.collection.clone();
        let id = staged.add(new, Some(&session.key), self.inner.clock.now())?;
        self.inner.store.persist(&staged).await?;
        session.collection = staged;

        info!(id = %id, "credential added");
        Ok(id)
    }

    /// Secret-free summaries in creation order.
    pub async fn list_credentials(&self) -> Result<Vec<CredentialSummary>, VaultError> {
        let guard = self.inner.session.lock().await;
        let session = guard.as_ref().ok_or(VaultError::VaultLocked)?;
        Ok(session.collection.summaries())
    }

    /// Select the next credential and reserve it by recording its use.
    ///
    /// `NoneAvailable` is the normal "try again later" answer.
    pub async fn select_next(
        &self,
        cooldown: Duration,
        ignore_cooldown: bool,
    ) -> Result<CredentialId, CredpoolError> {
        let mut guard = self.inner.session.lock().await;
        let session = guard.as_mut().ok_or(VaultError::VaultLocked)?;
        let now = self.inner.clock.now();

        let selection =
            match self
                .inner
                .scheduler
                .select(&session.collection, now, cooldown, ignore_cooldown)
            {
                Ok(selection) => selection,
                Err(SchedulerError::NoneAvailable) => {
                    debug!(credentials = session.collection.len(), "no eligible credential");
                    return Err(SchedulerError::NoneAvailable.into());
                }
                Err(e) => return Err(e.into()),
            };
        let id = selection.credential.id().clone();

        match selection.kind {
            SelectionKind::CoolingFallback { available_at } => {
                warn!(id = %id, %available_at, "every eligible credential is cooling; using the soonest to expire");
            }
            SelectionKind::CooldownIgnored { score } => {
                warn!(id = %id, score, "cooldown ignored for selection");
            }
            SelectionKind::CooledDown { score } => {
                debug!(id = %id, score, "credential selected");
            }
        }

        let mut staged = session.collection.clone();
        self.recorder().record_use(&mut staged, &id, now).await?;
        session.collection = staged;
        Ok(id)
    }

    /// Decrypt the secret for `id`. Never log or persist the result.
    pub async fn reveal_secret(&self, id: &CredentialId) -> Result<SecretString, VaultError> {
        let guard = self.inner.session.lock().await;
        let session = guard.as_ref().ok_or(VaultError::VaultLocked)?;
        session.collection.get_secret(id, Some(&session.key))
    }

    /// Feed a session outcome back into the credential's health.
    pub async fn report_outcome(
        &self,
        id: &CredentialId,
        outcome: Outcome,
    ) -> Result<Transition, CredpoolError> {
        let mut guard = self.inner.session.lock().await;
        let session = guard.as_mut().ok_or(VaultError::VaultLocked)?;

        let mut staged = session.collection.clone();
        let transition = self.recorder().record_outcome(&mut staged, id, outcome).await?;
        session.collection = staged;
        Ok(transition)
    }

    /// Operator-set health. `Banned` credentials cannot be moved.
    pub async fn override_health(
        &self,
        id: &CredentialId,
        target: Health,
    ) -> Result<Transition, CredpoolError> {
        let mut guard = self.inner.session.lock().await;
        let session = guard.as_mut().ok_or(VaultError::VaultLocked)?;

        let mut staged = session.collection.clone();
        let transition = self.recorder().override_health(&mut staged, id, target).await?;
        session.collection = staged;
        Ok(transition)
    }

    /// Remove a credential and its session artifact.
    ///
    /// Once the removal is persisted it is final; a session artifact that
    /// cannot be deleted is only logged.
    pub async fn remove_credential(&self, id: &CredentialId) -> Result<(), VaultError> {
        let mut guard = self.inner.session.lock().await;
        let session = guard.as_mut().ok_or(VaultError::VaultLocked)?;

        let mut staged = session.collection.clone();
        let removed = staged.remove(id)?;
        self.inner.store.persist(&staged).await?;
        session.collection = staged;

        if let Err(e) = self.inner.store.remove_session_artifact(id) {
            warn!(id = %id, error = %e, "failed to delete session artifact");
        }
        info!(id = %id, identifier = removed.identifier(), "credential removed");
        Ok(())
    }

    pub async fn statistics(&self, cooldown: Duration) -> Result<PoolStatistics, VaultError> {
        let guard = self.inner.session.lock().await;
        let session = guard.as_ref().ok_or(VaultError::VaultLocked)?;
        let now = self.inner.clock.now();

        let mut stats = PoolStatistics {
            total: session.collection.len(),
            by_health: BTreeMap::new(),
            total_uses: 0,
            cooling: 0,
            available: 0,
        };
        for credential in session.collection.iter() {
            *stats.by_health.entry(credential.health()).or_default() += 1;
            stats.total_uses = stats.total_uses.saturating_add(credential.total_uses());
            if !self.inner.scheduler.is_eligible(credential) {
                continue;
            }
            if credential.is_cooled_down(now, cooldown) {
                stats.available += 1;
            } else {
                stats.cooling += 1;
            }
        }
        Ok(stats)
    }
}
