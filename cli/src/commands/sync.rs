// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `hedron sync`: reconcile one owner or every owner of a world file

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use hedron_core::application::SyncError;

use super::{load_config, parse_owner_id, print_report};
use crate::embedded::EmbeddedEngine;

#[derive(Args)]
pub struct SyncArgs {
    /// World file (YAML snapshot of owners and library)
    #[arg(short, long, value_name = "FILE")]
    pub world: PathBuf,

    /// Sync only this owner (default: every owner)
    #[arg(long, value_name = "ID")]
    pub owner: Option<String>,

    /// Save the converged world back to the file
    #[arg(long)]
    pub write: bool,
}

pub async fn execute(args: SyncArgs, config_override: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_override)?;
    let engine = EmbeddedEngine::load(config, &args.world)?;

    let outcome = match &args.owner {
        Some(raw) => {
            let owner_id = parse_owner_id(raw)?;
            engine.sync_owner(owner_id).await.map(|report| vec![report])
        }
        None => engine.sync_all().await,
    };

    println!("{}", "Sync results:".bold());
    let result = match outcome {
        Ok(reports) => {
            reports.iter().for_each(print_report);
            Ok(())
        }
        Err(SyncError::Partial { completed, failed }) => {
            completed.iter().for_each(print_report);
            for (owner_id, reason) in &failed {
                println!("  {} {}: {}", "✗".red(), owner_id, reason);
            }
            Err(anyhow::anyhow!("{} owners failed to sync", failed.len()))
        }
        Err(e) => Err(e.into()),
    };

    // Whatever converged is worth keeping even when some owners failed
    if args.write {
        engine.save(&args.world)?;
        println!("{}", format!("✓ World saved: {}", args.world.display()).green());
    }
    result
}
