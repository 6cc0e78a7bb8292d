// SPDX-FileCopyrightText: 2026 Credpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! credpool - encrypted account pool with cooldown-aware rotation.
//!
//! Operator front end: create the vault, manage credentials, and drive the
//! scheduler by hand.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod list;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use credpool_config::CredpoolConfig;
use credpool_core::{CredpoolError, Health, Outcome, VaultError};

/// credpool - encrypted account pool with cooldown-aware rotation.
#[derive(Parser, Debug)]
#[command(name = "credpool", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new vault protected by a passphrase.
    Init,
    /// Add a credential. The secret is read from a hidden prompt.
    Add {
        /// Account handle, e.g. phone number or email.
        identifier: String,
        /// Contact number for verification codes.
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List credentials without secrets.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Show pool statistics.
    Status {
        #[arg(long)]
        json: bool,
        #[arg(long)]
        plain: bool,
    },
    /// Remove a credential and its session artifact.
    Remove {
        /// Credential id, e.g. acc_001.
        id: String,
    },
    /// Reserve the next credential and print its id.
    Next {
        /// Score every eligible credential, cooling ones included.
        #[arg(long)]
        ignore_cooldown: bool,
        /// Override the configured cooldown window.
        #[arg(long, value_name = "MINUTES")]
        cooldown_minutes: Option<u64>,
    },
    /// Report the outcome of a session.
    Report {
        id: String,
        #[arg(value_enum)]
        outcome: OutcomeArg,
        /// Failure description stored as the credential's last error.
        #[arg(long)]
        reason: Option<String>,
    },
    /// Set a credential's health explicitly.
    Mark {
        id: String,
        /// unknown, active, suspicious, limited, or banned.
        health: Health,
    },
}

/// Session outcomes accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutcomeArg {
    Success,
    Failure,
    Restricted,
    Banned,
    Unknown,
}

impl OutcomeArg {
    fn into_outcome(self, reason: Option<String>) -> Outcome {
        match self {
            OutcomeArg::Success => Outcome::Success,
            OutcomeArg::Failure => {
                Outcome::Failure(reason.unwrap_or_else(|| "reported by operator".to_string()))
            }
            OutcomeArg::Restricted => Outcome::ServiceRestricted,
            OutcomeArg::Banned => Outcome::ServiceBanned,
            OutcomeArg::Unknown => Outcome::Unknown,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => credpool_config::load_and_validate_path(path),
        None => credpool_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            credpool_config::render_errors(&errors);
            std::process::exit(2);
        }
    };

    init_tracing(&config.log.level);

    if let Err(e) = run(cli.command, &config).await {
        if e.is_none_available() {
            eprintln!("credpool: no credential available right now; retry later or add credentials");
        } else {
            eprintln!("credpool: {e}");
        }
        std::process::exit(exit_code(&e));
    }
}

async fn run(command: Commands, config: &CredpoolConfig) -> Result<(), CredpoolError> {
    match command {
        Commands::Init => commands::run_init(config).await,
        Commands::Add {
            identifier,
            phone,
            notes,
        } => commands::run_add(config, identifier, phone, notes).await,
        Commands::List { json, plain } => list::run_list(config, json, plain).await,
        Commands::Status { json, plain } => list::run_status(config, json, plain).await,
        Commands::Remove { id } => commands::run_remove(config, &id.into()).await,
        Commands::Next {
            ignore_cooldown,
            cooldown_minutes,
        } => commands::run_next(config, ignore_cooldown, cooldown_minutes).await,
        Commands::Report {
            id,
            outcome,
            reason,
        } => commands::run_report(config, &id.into(), outcome.into_outcome(reason)).await,
        Commands::Mark { id, health } => commands::run_mark(config, &id.into(), health).await,
    }
}

/// 3 for "nothing available", 4 for credential problems, 1 otherwise.
fn exit_code(err: &CredpoolError) -> i32 {
    match err {
        e if e.is_none_available() => 3,
        CredpoolError::Vault(VaultError::InvalidPassphrase | VaultError::DecryptionFailed) => 4,
        _ => 1,
    }
}

/// Initialize the tracing subscriber with the given log level.
///
/// `RUST_LOG` takes precedence when set.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("credpool={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn parses_report_with_reason() {
        let cli = Cli::try_parse_from([
            "credpool", "report", "acc_002", "failure", "--reason", "captcha loop",
        ])
        .unwrap();
        match cli.command {
            Commands::Report {
                id,
                outcome,
                reason,
            } => {
                assert_eq!(id, "acc_002");
                assert_eq!(
                    outcome.into_outcome(reason),
                    Outcome::Failure("captcha loop".to_string())
                );
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_mark_health_case_insensitively() {
        let cli = Cli::try_parse_from(["credpool", "mark", "acc_001", "Banned"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Mark {
                health: Health::Banned,
                ..
            }
        ));
        assert!(Cli::try_parse_from(["credpool", "mark", "acc_001", "frozen"]).is_err());
    }

    #[test]
    fn parses_next_flags_and_global_config() {
        let cli = Cli::try_parse_from([
            "credpool",
            "next",
            "--ignore-cooldown",
            "--cooldown-minutes",
            "15",
            "--config",
            "/tmp/credpool.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/credpool.toml")));
        assert!(matches!(
            cli.command,
            Commands::Next {
                ignore_cooldown: true,
                cooldown_minutes: Some(15)
            }
        ));
    }

    #[test]
    fn exit_codes_distinguish_none_available() {
        let none = CredpoolError::Scheduler(credpool_core::SchedulerError::NoneAvailable);
        assert_eq!(exit_code(&none), 3);
        assert_eq!(exit_code(&VaultError::InvalidPassphrase.into()), 4);
        assert_eq!(exit_code(&CredpoolError::Internal("x".into())), 1);
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = credpool_config::load_and_validate_str("").expect("default config should be valid");
        assert_eq!(config.rotation.cooldown_minutes, 60);
    }
}
