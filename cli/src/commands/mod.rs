// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Hedron CLI

pub mod config;
pub mod slot;
pub mod sync;
pub mod world;

pub use self::config::ConfigCommand;
pub use self::slot::SlotCommand;
pub use self::sync::SyncArgs;
pub use self::world::WorldCommand;

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use hedron_core::application::SyncReport;
use hedron_core::domain::config::HedronConfig;
use hedron_core::domain::entity::{EntityId, OwnerId};

/// Load and validate configuration for commands that run the engine
pub(crate) fn load_config(config_override: Option<PathBuf>) -> Result<HedronConfig> {
    let config = HedronConfig::load_or_default(config_override).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

pub(crate) fn parse_owner_id(raw: &str) -> Result<OwnerId> {
    OwnerId::from_string(raw).with_context(|| format!("Invalid owner id '{}'", raw))
}

pub(crate) fn parse_entity_id(raw: &str) -> Result<EntityId> {
    EntityId::from_string(raw).with_context(|| format!("Invalid entity id '{}'", raw))
}

pub(crate) fn print_report(report: &SyncReport) {
    if report.is_noop() {
        println!(
            "  {} {} ({} unchanged)",
            "=".dimmed(),
            report.owner_id,
            report.unchanged
        );
    } else {
        println!(
            "  {} {} ({} created, {} deleted, {} unchanged)",
            "✓".green(),
            report.owner_id,
            report.created.len(),
            report.deleted.len(),
            report.unchanged
        );
    }
    for key in &report.created {
        println!("      {} {}", "+".green(), key);
    }
    for key in &report.deleted {
        println!("      {} {}", "-".red(), key);
    }
    for key in &report.unresolved {
        println!("      {} {} (template not found)", "?".yellow(), key);
    }
}
