// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `hedron world`: inspect a world file

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use hedron_core::domain::module::Module;
use hedron_core::infrastructure::repositories::WorldSnapshot;

use super::load_config;
use super::slot::print_slots;

#[derive(Subcommand)]
pub enum WorldCommand {
    /// List owners, their containers and granted entities
    Show {
        #[arg(short, long, value_name = "FILE")]
        world: PathBuf,
    },
}

pub async fn handle_command(command: WorldCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        WorldCommand::Show { world } => show(config_override, world).await,
    }
}

async fn show(config_override: Option<PathBuf>, world_path: PathBuf) -> Result<()> {
    let config = load_config(config_override)?;
    let spec = config.container_spec();
    let snapshot = WorldSnapshot::from_yaml_file(&world_path)?;

    for owner in &snapshot.owners {
        println!("{} ({})", owner.name.bold(), owner.id);

        let containers: Vec<_> = owner.containers(&spec).collect();
        if containers.is_empty() {
            println!("  {}", "no containers".dimmed());
        }
        for container in containers {
            println!(
                "  {} {}",
                container.name.as_deref().unwrap_or("Container"),
                container.id.to_string().dimmed()
            );
            print_slots(&spec.slots_of(container));
        }

        let granted: Vec<_> = owner.granted().collect();
        if !granted.is_empty() {
            println!("  Granted:");
        }
        for grant in granted {
            let name = owner
                .entity(grant.id)
                .and_then(|e| e.name.clone())
                .unwrap_or_default();
            println!("    {} {}", name, grant.key.to_string().dimmed());
        }
        println!();
    }

    let modules: Vec<_> = snapshot
        .library
        .iter()
        .filter(|entry| Module::is_module(&entry.entity))
        .collect();
    if !modules.is_empty() {
        println!("{}", "Library modules:".bold());
        for entry in modules {
            let module = Module::from_entity(entry.reference.clone(), &entry.entity);
            let category = module
                .category
                .map(|c| c.to_string())
                .unwrap_or_else(|| "untyped".to_string());
            println!(
                "  {} [{}] {} effects, {} actions",
                entry.reference,
                category,
                module.grants.effects.len(),
                module.grants.actions.len()
            );
        }
    }
    Ok(())
}
