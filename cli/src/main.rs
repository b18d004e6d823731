// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Hedron CLI
//!
//! The `hedron` binary hosts the reconciliation engine over a YAML world
//! file: owners with their entities, plus a library of modules and grant
//! templates.
//!
//! ## Commands
//!
//! - `hedron sync --world FILE [--owner ID] [--write]` - Reconcile granted entities
//! - `hedron slot set|clear` - Equip or unequip modules, then reconcile
//! - `hedron world show` - Inspect owners, containers and grants
//! - `hedron config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use hedron_cli::commands::{self, ConfigCommand, SlotCommand, SyncArgs, WorldCommand};

/// Hedron - keep granted entities in step with equipped modules
#[derive(Parser)]
#[command(name = "hedron")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "HEDRON_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile granted entities of one or every owner
    #[command(name = "sync")]
    Sync(SyncArgs),

    /// Container slot assignment
    #[command(name = "slot")]
    Slot {
        #[command(subcommand)]
        command: SlotCommand,
    },

    /// World inspection
    #[command(name = "world")]
    World {
        #[command(subcommand)]
        command: WorldCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Sync(args) => commands::sync::execute(args, cli.config).await,
        Commands::Slot { command } => commands::slot::handle_command(command, cli.config).await,
        Commands::World { command } => commands::world::handle_command(command, cli.config).await,
        Commands::Config { command } => commands::config::handle_command(command, cli.config).await,
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
