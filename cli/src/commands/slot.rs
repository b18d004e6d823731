// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `hedron slot`: assign or clear container slots
//!
//! Assignments go through the slot store; the resulting change notification
//! is dispatched like any other, so the owner is reconciled before the world
//! is saved.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use hedron_core::domain::container::{SlotName, Slots};
use hedron_core::domain::entity::EntityRef;

use super::{load_config, parse_entity_id, parse_owner_id, print_report};
use crate::embedded::EmbeddedEngine;

#[derive(Subcommand)]
pub enum SlotCommand {
    /// Equip a module into a slot
    Set {
        #[arg(short, long, value_name = "FILE")]
        world: PathBuf,

        #[arg(long, value_name = "ID")]
        owner: String,

        /// Container entity id
        #[arg(long, value_name = "ID")]
        container: String,

        /// `core` or `fragment-<n>`
        #[arg(long)]
        slot: String,

        /// Module reference (e.g. Compendium.embers.Item.abc)
        #[arg(long, value_name = "REF")]
        module: String,
    },

    /// Empty a slot
    Clear {
        #[arg(short, long, value_name = "FILE")]
        world: PathBuf,

        #[arg(long, value_name = "ID")]
        owner: String,

        #[arg(long, value_name = "ID")]
        container: String,

        #[arg(long)]
        slot: String,
    },
}

pub async fn handle_command(command: SlotCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        SlotCommand::Set {
            world,
            owner,
            container,
            slot,
            module,
        } => assign(config_override, world, &owner, &container, &slot, Some(EntityRef::new(module))).await,
        SlotCommand::Clear {
            world,
            owner,
            container,
            slot,
        } => assign(config_override, world, &owner, &container, &slot, None).await,
    }
}

async fn assign(
    config_override: Option<PathBuf>,
    world_path: PathBuf,
    owner: &str,
    container: &str,
    slot: &str,
    module: Option<EntityRef>,
) -> Result<()> {
    let owner_id = parse_owner_id(owner)?;
    let container_id = parse_entity_id(container)?;
    let slot: SlotName = slot.parse().context("Invalid slot")?;

    let config = load_config(config_override)?;
    let mut engine = EmbeddedEngine::load(config, &world_path)?;

    let slots = engine
        .slots()
        .set_slot(owner_id, container_id, slot, module)
        .await
        .context("Slot assignment rejected")?;
    print_slots(&slots);

    let applied = engine.settle().await?;
    if !applied.is_empty() {
        println!();
        println!("{}", "Reconciled:".bold());
        applied.iter().for_each(print_report);
    }

    engine.save(&world_path)?;
    println!();
    println!("{}", format!("✓ World saved: {}", world_path.display()).green());
    Ok(())
}

pub(crate) fn print_slots(slots: &Slots) {
    for (name, module) in slots.iter() {
        match module {
            Some(reference) => println!("    {:<12} {}", name.to_string(), reference),
            None => println!("    {:<12} {}", name.to_string(), "(empty)".dimmed()),
        }
    }
}
