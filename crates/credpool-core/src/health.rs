// SPDX-FileCopyrightText: 2026 Credpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account health state machine.
//!
//! Pure transition logic, no I/O:
//!
//! ```text
//! Unknown --success--> Active --failure--> Suspicious --success--> Active
//!                                               |
//!                      failures >= threshold or restricted
//!                                               v
//!                                            Limited
//! any non-Banned --ban--> Banned (terminal)
//! ```
//!
//! The usage recorder drives transitions from outcomes; operators use
//! [`HealthEvent::Override`] for corrections.

use crate::error::TransitionError;
use crate::types::{Health, Outcome};

/// Default number of consecutive failures that demotes a credential to `Limited`.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Thresholds governing automatic transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    pub failure_threshold: u32,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

/// An input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthEvent {
    Success,
    /// A failure, carrying the consecutive failure count *after* incrementing.
    Failure { consecutive_failures: u32 },
    /// The service signaled a restriction.
    Restricted,
    /// The service or an operator banned the account.
    Banned,
    /// The session ended without a known outcome.
    OutcomeUnknown,
    /// Explicit operator correction.
    Override(Health),
}

impl HealthEvent {
    /// Map a reported outcome to its event, given the failure count after
    /// the outcome has been applied to the counters.
    pub fn from_outcome(outcome: &Outcome, consecutive_failures: u32) -> Self {
        match outcome {
            Outcome::Success => HealthEvent::Success,
            Outcome::Failure(_) => HealthEvent::Failure {
                consecutive_failures,
            },
            Outcome::ServiceRestricted => HealthEvent::Restricted,
            Outcome::ServiceBanned => HealthEvent::Banned,
            Outcome::Unknown => HealthEvent::OutcomeUnknown,
        }
    }
}

/// An applied transition. `from == to` is a valid self-loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Health,
    pub to: Health,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

impl HealthPolicy {
    /// Compute the state that follows `current` on `event`.
    pub fn next(&self, current: Health, event: HealthEvent) -> Result<Transition, TransitionError> {
        if current.is_terminal() {
            return Err(TransitionError::Terminal { from: current });
        }

        let to = match event {
            HealthEvent::Override(target) => target,
            HealthEvent::Banned => Health::Banned,
            HealthEvent::Restricted => Health::Limited,
            // Limited is only cleared by an operator override.
            _ if current == Health::Limited => Health::Limited,
            HealthEvent::Success => Health::Active,
            HealthEvent::Failure {
                consecutive_failures,
            } if consecutive_failures >= self.failure_threshold => Health::Limited,
            HealthEvent::Failure { .. } => Health::Suspicious,
            HealthEvent::OutcomeUnknown => match current {
                Health::Unknown | Health::Active => Health::Suspicious,
                other => other,
            },
        };

        Ok(Transition { from: current, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy() -> HealthPolicy {
        HealthPolicy::default()
    }

    fn next(current: Health, event: HealthEvent) -> Health {
        policy().next(current, event).unwrap().to
    }

    #[test]
    fn first_success_activates() {
        assert_eq!(next(Health::Unknown, HealthEvent::Success), Health::Active);
    }

    #[test]
    fn failures_below_threshold_are_suspicious() {
        for n in 1..3 {
            let event = HealthEvent::Failure {
                consecutive_failures: n,
            };
            assert_eq!(next(Health::Active, event), Health::Suspicious);
            assert_eq!(next(Health::Suspicious, event), Health::Suspicious);
            assert_eq!(next(Health::Unknown, event), Health::Suspicious);
        }
    }

    #[test]
    fn threshold_failure_limits() {
        let event = HealthEvent::Failure {
            consecutive_failures: 3,
        };
        assert_eq!(next(Health::Suspicious, event), Health::Limited);
    }

    #[test]
    fn success_recovers_suspicious() {
        assert_eq!(next(Health::Suspicious, HealthEvent::Success), Health::Active);
    }

    #[test]
    fn restriction_limits_from_any_live_state() {
        for state in [Health::Unknown, Health::Active, Health::Suspicious, Health::Limited] {
            assert_eq!(next(state, HealthEvent::Restricted), Health::Limited);
        }
    }

    #[test]
    fn limited_is_sticky_without_override() {
        assert_eq!(next(Health::Limited, HealthEvent::Success), Health::Limited);
        assert_eq!(
            next(Health::Limited, HealthEvent::OutcomeUnknown),
            Health::Limited
        );
        assert_eq!(
            next(Health::Limited, HealthEvent::Override(Health::Active)),
            Health::Active
        );
    }

    #[test]
    fn outcome_unknown_marks_suspicious_conservatively() {
        assert_eq!(
            next(Health::Active, HealthEvent::OutcomeUnknown),
            Health::Suspicious
        );
        assert_eq!(
            next(Health::Unknown, HealthEvent::OutcomeUnknown),
            Health::Suspicious
        );
    }

    #[test]
    fn banned_is_terminal() {
        let err = policy()
            .next(Health::Banned, HealthEvent::Override(Health::Active))
            .unwrap_err();
        assert_eq!(err, TransitionError::Terminal { from: Health::Banned });
        assert!(policy().next(Health::Banned, HealthEvent::Success).is_err());
    }

    #[test]
    fn custom_threshold_is_honoured() {
        let policy = HealthPolicy {
            failure_threshold: 5,
        };
        let t = policy
            .next(
                Health::Suspicious,
                HealthEvent::Failure {
                    consecutive_failures: 4,
                },
            )
            .unwrap();
        assert_eq!(t.to, Health::Suspicious);
        assert!(!t.changed());
    }

    fn any_health() -> impl Strategy<Value = Health> {
        prop_oneof![
            Just(Health::Unknown),
            Just(Health::Active),
            Just(Health::Suspicious),
            Just(Health::Limited),
            Just(Health::Banned),
        ]
    }

    fn any_event() -> impl Strategy<Value = HealthEvent> {
        prop_oneof![
            Just(HealthEvent::Success),
            (0u32..10).prop_map(|n| HealthEvent::Failure {
                consecutive_failures: n
            }),
            Just(HealthEvent::Restricted),
            Just(HealthEvent::Banned),
            Just(HealthEvent::OutcomeUnknown),
            any_health().prop_map(HealthEvent::Override),
        ]
    }

    proptest! {
        #[test]
        fn banned_never_leaves(event in any_event()) {
            prop_assert!(policy().next(Health::Banned, event).is_err());
        }

        #[test]
        fn ban_event_always_bans_live_states(state in any_health()) {
            prop_assume!(state != Health::Banned);
            prop_assert_eq!(next(state, HealthEvent::Banned), Health::Banned);
        }

        #[test]
        fn automatic_events_never_promote_limited(event in any_event()) {
            prop_assume!(!matches!(event, HealthEvent::Override(_)));
            let to = next(Health::Limited, event);
            prop_assert!(to == Health::Limited || to == Health::Banned);
        }
    }
}
