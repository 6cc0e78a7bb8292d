// SPDX-FileCopyrightText: 2026 Credpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `credpool list` and `credpool status`.
//!
//! Plain or colored tables on a TTY, `--json` for scripting. Secrets are
//! never part of either output.

use std::io::IsTerminal;

use chrono::{DateTime, Utc};
use credpool_config::CredpoolConfig;
use credpool_core::{CredpoolError, Health};
use credpool_rotation::PoolStatistics;
use credpool_vault::CredentialSummary;

use crate::commands::open_vault;

/// Run `credpool list`.
pub async fn run_list(config: &CredpoolConfig, json: bool, plain: bool) -> Result<(), CredpoolError> {
    let handle = open_vault(config).await?;
    let summaries = handle.list_credentials().await?;

    if json {
        println!("{}", to_json(&summaries)?);
        return Ok(());
    }

    let use_color = !plain && std::io::stdout().is_terminal();
    if summaries.is_empty() {
        println!("  no credentials configured; add one with `credpool add <identifier>`");
        return Ok(());
    }

    println!();
    println!(
        "  {:<9} {:<24} {:<12} {:>5} {:>4}  {}",
        "ID", "IDENTIFIER", "HEALTH", "USES", "FAIL", "LAST USED"
    );
    println!("  {}", "-".repeat(76));
    for summary in &summaries {
        println!("{}", format_row(summary, use_color));
    }
    println!();
    Ok(())
}

/// Run `credpool status`.
pub async fn run_status(
    config: &CredpoolConfig,
    json: bool,
    plain: bool,
) -> Result<(), CredpoolError> {
    let handle = open_vault(config).await?;
    let cooldown = handle.cooldown();
    let stats = handle.statistics(cooldown).await?;

    if json {
        println!("{}", to_json(&stats)?);
        return Ok(());
    }

    let use_color = !plain && std::io::stdout().is_terminal();
    print_status(&stats, cooldown.num_minutes(), use_color);
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, CredpoolError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| CredpoolError::Internal(format!("failed to serialize output: {e}")))
}

fn format_row(summary: &CredentialSummary, use_color: bool) -> String {
    format!(
        "  {:<9} {:<24} {} {:>5} {:>4}  {}",
        summary.id,
        truncate(&summary.identifier, 24),
        health_cell(summary.health, use_color),
        summary.total_uses,
        summary.consecutive_failures,
        format_last_used(summary.last_used_at),
    )
}

/// Health padded to a fixed width, colored when requested.
fn health_cell(health: Health, use_color: bool) -> String {
    let text = format!("{:<12}", format!("{} {health}", health_symbol(health)));
    if !use_color {
        return text;
    }

    use colored::Colorize;
    match health {
        Health::Active => text.green().to_string(),
        Health::Suspicious => text.yellow().to_string(),
        Health::Limited => text.magenta().to_string(),
        Health::Banned => text.red().to_string(),
        Health::Unknown => text.dimmed().to_string(),
    }
}

fn health_symbol(health: Health) -> &'static str {
    match health {
        Health::Active => "+",
        Health::Suspicious => "?",
        Health::Limited => "-",
        Health::Banned => "x",
        Health::Unknown => ".",
    }
}

fn format_last_used(at: Option<DateTime<Utc>>) -> String {
    at.map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('~');
    out
}

fn print_status(stats: &PoolStatistics, cooldown_minutes: i64, use_color: bool) {
    println!();
    println!("  credpool status");
    println!("  {}", "-".repeat(35));
    println!("    Credentials: {}", stats.total);

    let available = format!("{}", stats.available);
    if use_color {
        use colored::Colorize;
        let available = if stats.available > 0 {
            available.green()
        } else {
            available.red()
        };
        println!("    Available:   {available}");
    } else {
        println!("    Available:   {available}");
    }
    println!("    Cooling:     {} (window {cooldown_minutes}m)", stats.cooling);
    println!("    Total uses:  {}", stats.total_uses);

    if !stats.by_health.is_empty() {
        println!();
        for (health, count) in &stats.by_health {
            println!("    {:<12} {count}", health_cell(*health, use_color));
        }
    }
    println!();
}
