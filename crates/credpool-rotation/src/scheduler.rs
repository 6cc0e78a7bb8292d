// SPDX-FileCopyrightText: 2026 Credpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rotation scheduler: choose the single best credential to use now.
//!
//! Selection order:
//! 1. Drop `Banned`/`Limited` credentials and those at the failure threshold.
//! 2. Score the cooled-down ones and take the lowest score
//!    (ties: fewer uses, then creation order).
//! 3. Otherwise fall back to whichever cooling credential frees up first.
//!
//! With `ignore_cooldown` the cooldown split is skipped and every eligible
//! credential is scored directly.

use chrono::{DateTime, Duration, Utc};
use credpool_config::model::RotationConfig;
use credpool_core::{Health, SchedulerError};
use credpool_vault::{Credential, CredentialCollection};

/// Weights of the scoring function. Lower scores win.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub use_weight: f64,
    pub failure_weight: f64,
    pub cooldown_weight: f64,
    /// Added for any health other than `Active`, including `Unknown`.
    pub health_penalty: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self::from(&RotationConfig::default())
    }
}

impl From<&RotationConfig> for ScoringWeights {
    fn from(config: &RotationConfig) -> Self {
        Self {
            use_weight: config.use_weight,
            failure_weight: config.failure_weight,
            cooldown_weight: config.cooldown_weight,
            health_penalty: config.health_penalty,
        }
    }
}

/// How a credential was chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionKind {
    /// Out of its cooldown window; picked by score.
    CooledDown { score: f64 },
    /// Every eligible credential is cooling; this one frees up first.
    CoolingFallback { available_at: DateTime<Utc> },
    /// Cooldown bypassed by the operator; picked by score.
    CooldownIgnored { score: f64 },
}

/// The scheduler's pick.
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub credential: &'a Credential,
    pub kind: SelectionKind,
}

impl Selection<'_> {
    pub fn is_fallback(&self) -> bool {
        matches!(self.kind, SelectionKind::CoolingFallback { .. })
    }
}

/// Stateless scoring and selection policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scheduler {
    weights: ScoringWeights,
    failure_threshold: u32,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::from_config(&RotationConfig::default())
    }
}

impl Scheduler {
    pub fn new(weights: ScoringWeights, failure_threshold: u32) -> Self {
        Self {
            weights,
            failure_threshold,
        }
    }

    pub fn from_config(config: &RotationConfig) -> Self {
        Self::new(ScoringWeights::from(config), config.failure_threshold)
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Whether `credential` may be handed out at all, cooldown aside.
    pub fn is_eligible(&self, credential: &Credential) -> bool {
        credential.health().is_rotatable()
            && credential.consecutive_failures() < self.failure_threshold
    }

    /// `uses * W_use + failures * W_fail + minutes_left * W_cooldown + penalty`.
    pub fn score(&self, credential: &Credential, now: DateTime<Utc>, cooldown: Duration) -> f64 {
        let w = &self.weights;
        let minutes_left = credential
            .cooldown_expires_at(cooldown)
            .map(|expires| (expires - now).num_milliseconds().max(0) as f64 / 60_000.0)
            .unwrap_or(0.0);
        let penalty = if credential.health() == Health::Active {
            0.0
        } else {
            w.health_penalty
        };

        credential.total_uses() as f64 * w.use_weight
            + f64::from(credential.consecutive_failures()) * w.failure_weight
            + minutes_left * w.cooldown_weight
            + penalty
    }

    /// Pick the next credential, or `NoneAvailable`.
    pub fn select<'a>(
        &self,
        collection: &'a CredentialCollection,
        now: DateTime<Utc>,
        cooldown: Duration,
        ignore_cooldown: bool,
    ) -> Result<Selection<'a>, SchedulerError> {
        // Enumerate first so creation order survives filtering.
        let eligible = collection
            .iter()
            .enumerate()
            .filter(|(_, c)| self.is_eligible(c));

        if ignore_cooldown {
            return self
                .best_scored(eligible, now, cooldown)
                .map(|(credential, score)| Selection {
                    credential,
                    kind: SelectionKind::CooldownIgnored { score },
                })
                .ok_or(SchedulerError::NoneAvailable);
        }

        let (cooled, cooling): (Vec<_>, Vec<_>) =
            eligible.partition(|(_, c)| c.is_cooled_down(now, cooldown));

        if let Some((credential, score)) = self.best_scored(cooled.into_iter(), now, cooldown) {
            return Ok(Selection {
                credential,
                kind: SelectionKind::CooledDown { score },
            });
        }

        cooling
            .into_iter()
            .filter_map(|(index, c)| c.cooldown_expires_at(cooldown).map(|at| (at, index, c)))
            .min_by_key(|(at, index, _)| (*at, *index))
            .map(|(available_at, _, credential)| Selection {
                credential,
                kind: SelectionKind::CoolingFallback { available_at },
            })
            .ok_or(SchedulerError::NoneAvailable)
    }

    fn best_scored<'a>(
        &self,
        candidates: impl Iterator<Item = (usize, &'a Credential)>,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Option<(&'a Credential, f64)> {
        candidates
            .map(|(index, c)| (self.score(c, now, cooldown), index, c))
            .min_by(|a, b| {
                a.0.total_cmp(&b.0)
                    .then(a.2.total_uses().cmp(&b.2.total_uses()))
                    .then(a.1.cmp(&b.1))
            })
            .map(|(score, _, credential)| (credential, score))
    }
}
