// SPDX-FileCopyrightText: 2026 Credpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the vault and rotation crates.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Stable opaque identifier of a managed credential.
///
/// Assigned once at creation from a persisted sequence and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialId(pub String);

impl CredentialId {
    /// Build the id for the `n`th credential ever created: `acc_001`, `acc_002`, ...
    pub fn from_sequence(n: u64) -> Self {
        Self(format!("acc_{n:03}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CredentialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CredentialId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CredentialId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Lifecycle classification of a credential's standing with the external service.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Health {
    /// Newly added or never evaluated.
    #[default]
    Unknown,
    Active,
    /// Recent failures, not yet disqualifying.
    Suspicious,
    /// The service signaled a restriction. Excluded from rotation.
    Limited,
    /// Terminal. Excluded from rotation forever.
    Banned,
}

impl Health {
    /// Banned admits no further transitions.
    pub fn is_terminal(self) -> bool {
        self == Health::Banned
    }

    /// Whether the scheduler may ever hand out a credential in this state.
    pub fn is_rotatable(self) -> bool {
        !matches!(self, Health::Limited | Health::Banned)
    }
}

/// Result of one automated session, reported back by the automation layer.
///
/// Passed by value into the usage recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// A failed session with a human-readable reason.
    Failure(String),
    /// The service signaled a restriction (e.g. search limits).
    ServiceRestricted,
    /// The service signaled a permanent ban.
    ServiceBanned,
    /// The session was cancelled before an outcome was known.
    Unknown,
}

impl Outcome {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure(_) => "failure",
            Outcome::ServiceRestricted => "restricted",
            Outcome::ServiceBanned => "banned",
            Outcome::Unknown => "unknown",
        }
    }

    /// The `last_error` text this outcome records, if it is a failure of any kind.
    pub fn error_text(&self) -> Option<String> {
        match self {
            Outcome::Success | Outcome::Unknown => None,
            Outcome::Failure(reason) => Some(reason.clone()),
            Outcome::ServiceRestricted => Some("service signaled restriction".to_string()),
            Outcome::ServiceBanned => Some("service signaled permanent ban".to_string()),
        }
    }
}
