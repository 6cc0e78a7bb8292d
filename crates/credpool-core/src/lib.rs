// SPDX-FileCopyrightText: 2026 Credpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for credpool.
//!
//! This crate provides the error taxonomy, the shared credential types, the
//! clock abstraction, and the pure account health state machine used by the
//! vault and rotation crates.

pub mod clock;
pub mod error;
pub mod health;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CredpoolError, SchedulerError, TransitionError, VaultError};
pub use health::{HealthEvent, HealthPolicy, Transition};
pub use types::{CredentialId, Health, Outcome};
