// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};

use crate::domain::entity::{Entity, EntityRef};
use crate::domain::properties::hedron;

/// Category of an equippable module; decides which slots accept it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleCategory {
    Core,
    Fragment,
}

impl std::fmt::Display for ModuleCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Core => f.write_str("core"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

/// Grant templates declared by a module, stored under `hedron.grant`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantTemplates {
    #[serde(default)]
    pub effects: Vec<EntityRef>,

    #[serde(default)]
    pub actions: Vec<EntityRef>,
}

impl GrantTemplates {
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty() && self.actions.is_empty()
    }
}

/// Read-only view of a resolved module entity
#[derive(Debug, Clone)]
pub struct Module {
    pub reference: EntityRef,
    pub category: Option<ModuleCategory>,
    pub grants: GrantTemplates,
}

impl Module {
    /// Malformed category or grant properties read as absent
    pub fn from_entity(reference: EntityRef, entity: &Entity) -> Self {
        Self {
            reference,
            category: entity.flags.get(&hedron::MODULE_TYPE).ok().flatten(),
            grants: entity.flags.get_or_default(&hedron::GRANT),
        }
    }

    pub fn is_module(entity: &Entity) -> bool {
        entity.flags.contains(&hedron::MODULE_TYPE) || entity.flags.contains(&hedron::GRANT)
    }
}
