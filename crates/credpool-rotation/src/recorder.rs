// SPDX-FileCopyrightText: 2026 Credpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Usage recorder: applies selections and session outcomes to a collection
//! and persists the result.
//!
//! Callers own the mutual exclusion. Every method mutates the collection it
//! is given and then writes it through the [`CredentialStore`]; on a persist
//! failure the in-memory collection is already changed, so callers stage a
//! copy and only keep it once the write succeeded.

use chrono::{DateTime, Utc};
use credpool_core::{
    CredentialId, CredpoolError, Health, HealthEvent, HealthPolicy, Outcome, SchedulerError,
    Transition,
};
use credpool_vault::{Credential, CredentialCollection, CredentialStore};
use tracing::{debug, info};

/// Records uses and outcomes against one store.
#[derive(Debug, Clone, Copy)]
pub struct UsageRecorder<'a> {
    store: &'a CredentialStore,
    policy: HealthPolicy,
}

impl<'a> UsageRecorder<'a> {
    pub fn new(store: &'a CredentialStore, policy: HealthPolicy) -> Self {
        Self { store, policy }
    }

    /// Reserve `id`: stamp `last_used_at` and bump `total_uses`, then persist.
    ///
    /// Happens at selection time, before the session outcome is known.
    pub async fn record_use(
        &self,
        collection: &mut CredentialCollection,
        id: &CredentialId,
        now: DateTime<Utc>,
    ) -> Result<(), CredpoolError> {
        let credential = lookup(collection, id)?;
        credential.mark_used(now);
        debug!(id = %id, total_uses = credential.total_uses(), "credential use recorded");

        self.store.persist(collection).await?;
        Ok(())
    }

    /// Apply a session outcome: counters, `last_error`, and the health
    /// transition, then persist.
    ///
    /// Outcomes for a `Banned` credential are accepted and ignored.
    pub async fn record_outcome(
        &self,
        collection: &mut CredentialCollection,
        id: &CredentialId,
        outcome: Outcome,
    ) -> Result<Transition, CredpoolError> {
        let credential = lookup(collection, id)?;

        if credential.health().is_terminal() {
            debug!(id = %id, outcome = outcome.kind(), "outcome ignored for banned credential");
            return Ok(Transition {
                from: Health::Banned,
                to: Health::Banned,
            });
        }

        let failures = match &outcome {
            Outcome::Success => {
                credential.clear_failures();
                0
            }
            Outcome::Unknown => credential.consecutive_failures(),
            Outcome::Failure(_) | Outcome::ServiceRestricted | Outcome::ServiceBanned => {
                credential.record_failure(outcome.error_text())
            }
        };

        let transition =
            credential.apply_health(&self.policy, HealthEvent::from_outcome(&outcome, failures))?;
        log_transition(credential, &transition, outcome.kind());

        self.store.persist(collection).await?;
        Ok(transition)
    }

    /// Operator correction of a credential's health.
    ///
    /// Moving a credential back to `Active` also clears its failure streak.
    /// `Banned` cannot be left; that fails with a transition error.
    pub async fn override_health(
        &self,
        collection: &mut CredentialCollection,
        id: &CredentialId,
        target: Health,
    ) -> Result<Transition, CredpoolError> {
        let credential = lookup(collection, id)?;
        let transition = credential.apply_health(&self.policy, HealthEvent::Override(target))?;
        if target == Health::Active {
            credential.clear_failures();
        }
        log_transition(credential, &transition, "override");

        self.store.persist(collection).await?;
        Ok(transition)
    }
}

fn lookup<'c>(
    collection: &'c mut CredentialCollection,
    id: &CredentialId,
) -> Result<&'c mut Credential, SchedulerError> {
    collection
        .get_mut(id)
        .ok_or_else(|| SchedulerError::UnknownCredential(id.clone()))
}

fn log_transition(credential: &Credential, transition: &Transition, cause: &str) {
    if transition.changed() {
        info!(
            id = %credential.id(),
            from = %transition.from,
            to = %transition.to,
            failures = credential.consecutive_failures(),
            cause,
            "credential health changed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credpool_vault::{KdfParams, NewCredential, VaultKey, cipher};
    use secrecy::SecretString;
    use tempfile::{TempDir, tempdir};
    use tracing_test::traced_test;

    fn params() -> KdfParams {
        KdfParams {
            memory_cost: 32768,
            iterations: 2,
            parallelism: 1,
        }
    }

    struct Fixture {
        _dir: TempDir,
        store: CredentialStore,
        collection: CredentialCollection,
        id: CredentialId,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(
            dir.path().join("credentials.json"),
            dir.path().join(".salt"),
            dir.path().join("sessions"),
        );
        let pass = SecretString::from("Tr0ub4dor&3".to_string());
        let key: VaultKey = cipher::initialize(&pass, &params()).unwrap().1;
        let mut collection = CredentialCollection::new(&key, params()).unwrap();
        let id = collection
            .add(
                NewCredential::new("13800000001", SecretString::from("pw".to_string())),
                Some(&key),
                Utc::now(),
            )
            .unwrap();
        Fixture {
            _dir: dir,
            store,
            collection,
            id,
        }
    }

    fn failure(reason: &str) -> Outcome {
        Outcome::Failure(reason.to_string())
    }

    #[tokio::test]
    async fn record_use_stamps_and_persists() {
        let mut f = fixture();
        let recorder = UsageRecorder::new(&f.store, HealthPolicy::default());
        let now = Utc::now();

        recorder.record_use(&mut f.collection, &f.id, now).await.unwrap();

        let loaded = f.store.load().unwrap();
        let c = loaded.get(&f.id).unwrap();
        assert_eq!(c.total_uses(), 1);
        assert_eq!(c.last_used_at(), Some(now));
    }

    #[tokio::test]
    async fn three_failures_limit_the_credential() {
        let mut f = fixture();
        let recorder = UsageRecorder::new(&f.store, HealthPolicy::default());

        let mut states = Vec::new();
        for n in 1..=3 {
            let t = recorder
                .record_outcome(&mut f.collection, &f.id, failure(&format!("timeout {n}")))
                .await
                .unwrap();
            states.push(t.to);
        }

        assert_eq!(
            states,
            vec![Health::Suspicious, Health::Suspicious, Health::Limited]
        );
        let c = f.store.load().unwrap();
        let c = c.get(&f.id).unwrap();
        assert_eq!(c.consecutive_failures(), 3);
        assert_eq!(c.last_error(), Some("timeout 3"));
    }

    #[tokio::test]
    async fn success_resets_failures_and_activates() {
        let mut f = fixture();
        let recorder = UsageRecorder::new(&f.store, HealthPolicy::default());

        recorder
            .record_outcome(&mut f.collection, &f.id, failure("captcha"))
            .await
            .unwrap();
        let t = recorder
            .record_outcome(&mut f.collection, &f.id, Outcome::Success)
            .await
            .unwrap();

        assert_eq!(t.from, Health::Suspicious);
        assert_eq!(t.to, Health::Active);
        let c = f.collection.get(&f.id).unwrap();
        assert_eq!(c.consecutive_failures(), 0);
        assert_eq!(c.last_error(), None);
    }

    #[tokio::test]
    async fn restriction_limits_immediately() {
        let mut f = fixture();
        let recorder = UsageRecorder::new(&f.store, HealthPolicy::default());

        let t = recorder
            .record_outcome(&mut f.collection, &f.id, Outcome::ServiceRestricted)
            .await
            .unwrap();
        assert_eq!(t.to, Health::Limited);
        assert_eq!(
            f.collection.get(&f.id).unwrap().last_error(),
            Some("service signaled restriction")
        );
    }

    #[tokio::test]
    async fn unknown_outcome_is_suspicious_without_counting() {
        let mut f = fixture();
        let recorder = UsageRecorder::new(&f.store, HealthPolicy::default());

        let t = recorder
            .record_outcome(&mut f.collection, &f.id, Outcome::Unknown)
            .await
            .unwrap();
        assert_eq!(t.to, Health::Suspicious);
        assert_eq!(f.collection.get(&f.id).unwrap().consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn banned_credentials_ignore_outcomes_and_refuse_overrides() {
        let mut f = fixture();
        let recorder = UsageRecorder::new(&f.store, HealthPolicy::default());

        recorder
            .record_outcome(&mut f.collection, &f.id, Outcome::ServiceBanned)
            .await
            .unwrap();
        let before = f.collection.get(&f.id).unwrap().consecutive_failures();

        let t = recorder
            .record_outcome(&mut f.collection, &f.id, Outcome::Success)
            .await
            .unwrap();
        assert!(!t.changed());
        assert_eq!(f.collection.get(&f.id).unwrap().consecutive_failures(), before);

        let err = recorder
            .override_health(&mut f.collection, &f.id, Health::Active)
            .await
            .unwrap_err();
        assert!(matches!(err, CredpoolError::Transition(_)));
    }

    #[tokio::test]
    async fn override_to_active_clears_failures() {
        let mut f = fixture();
        let recorder = UsageRecorder::new(&f.store, HealthPolicy::default());
        for _ in 0..3 {
            recorder
                .record_outcome(&mut f.collection, &f.id, failure("x"))
                .await
                .unwrap();
        }

        let t = recorder
            .override_health(&mut f.collection, &f.id, Health::Active)
            .await
            .unwrap();
        assert_eq!(t.from, Health::Limited);
        let c = f.collection.get(&f.id).unwrap();
        assert_eq!(c.health(), Health::Active);
        assert_eq!(c.consecutive_failures(), 0);
    }

    #[tokio::test]
    #[traced_test]
    async fn health_changes_are_logged_without_secrets() {
        let mut f = fixture();
        let recorder = UsageRecorder::new(&f.store, HealthPolicy::default());

        recorder
            .record_outcome(&mut f.collection, &f.id, Outcome::Success)
            .await
            .unwrap();
        recorder
            .record_outcome(&mut f.collection, &f.id, Outcome::Success)
            .await
            .unwrap();

        assert!(logs_contain("credential health changed"));
        assert!(logs_contain("to=active"));
        assert!(!logs_contain("13800000001"));
    }

    #[tokio::test]
    async fn unknown_id_is_a_programmer_error() {
        let mut f = fixture();
        let recorder = UsageRecorder::new(&f.store, HealthPolicy::default());
        let err = recorder
            .record_outcome(&mut f.collection, &CredentialId::from("acc_999"), Outcome::Success)
            .await
            .unwrap_err();
        assert!(err.is_programmer_error());
    }
}
