// SPDX-FileCopyrightText: 2026 Credpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential rotation for credpool.
//!
//! - [`Scheduler`] picks the next credential by score and cooldown.
//! - [`UsageRecorder`] applies selections and outcomes and persists them.
//! - [`Vault`] / [`VaultHandle`] are the entry points for the automation
//!   layer: unlock once, then select, reveal, and report through a single
//!   critical section.

pub mod handle;
pub mod recorder;
pub mod scheduler;

pub use handle::{PoolStatistics, Vault, VaultHandle};
pub use recorder::UsageRecorder;
pub use scheduler::{Scheduler, ScoringWeights, Selection, SelectionKind};
