// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::domain::entity::{Entity, EntityId, EntityRef, OwnerId};
use crate::domain::module::ModuleCategory;
use crate::domain::properties::{hedron, PropertyError};
use crate::domain::repository::RepositoryError;

// ============================================================================
// Value Objects
// ============================================================================

/// Name of a slot on a container: the single `core` slot or `fragment-<i>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlotName {
    Core,
    Fragment(usize),
}

impl SlotName {
    /// Module category this slot accepts
    pub fn required_category(&self) -> ModuleCategory {
        match self {
            Self::Core => ModuleCategory::Core,
            Self::Fragment(_) => ModuleCategory::Fragment,
        }
    }
}

impl std::fmt::Display for SlotName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Core => f.write_str("core"),
            Self::Fragment(index) => write!(f, "fragment-{index}"),
        }
    }
}

impl FromStr for SlotName {
    type Err = SlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "core" {
            return Ok(Self::Core);
        }
        s.strip_prefix("fragment-")
            .and_then(|index| index.parse().ok())
            .map(Self::Fragment)
            .ok_or_else(|| SlotError::InvalidSlotName(s.to_string()))
    }
}

/// Slot assignments of one container, stored under `hedron.slots`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slots {
    #[serde(default)]
    pub core: Option<EntityRef>,

    #[serde(default)]
    pub fragments: Vec<Option<EntityRef>>,
}

impl Slots {
    pub fn empty(fragment_count: usize) -> Self {
        Self {
            core: None,
            fragments: vec![None; fragment_count],
        }
    }

    /// Pad or cut the fragment list to the configured layout
    pub fn normalized(mut self, fragment_count: usize) -> Self {
        self.fragments.resize(fragment_count, None);
        self
    }

    pub fn get(&self, slot: SlotName) -> Option<&EntityRef> {
        match slot {
            SlotName::Core => self.core.as_ref(),
            SlotName::Fragment(index) => self.fragments.get(index).and_then(Option::as_ref),
        }
    }

    pub fn assign(&mut self, slot: SlotName, module: Option<EntityRef>) -> Result<(), SlotError> {
        match slot {
            SlotName::Core => self.core = module,
            SlotName::Fragment(index) => {
                let fragment_count = self.fragments.len();
                let entry = self
                    .fragments
                    .get_mut(index)
                    .ok_or(SlotError::UnknownSlot { slot, fragment_count })?;
                *entry = module;
            }
        }
        Ok(())
    }

    /// Empty every slot holding `module`; returns the slots that were cleared
    pub fn remove_module(&mut self, module: &EntityRef) -> Vec<SlotName> {
        let mut cleared = Vec::new();
        if self.core.as_ref() == Some(module) {
            self.core = None;
            cleared.push(SlotName::Core);
        }
        for (index, fragment) in self.fragments.iter_mut().enumerate() {
            if fragment.as_ref() == Some(module) {
                *fragment = None;
                cleared.push(SlotName::Fragment(index));
            }
        }
        cleared
    }

    /// Every slot of the layout with its assignment, core first
    pub fn iter(&self) -> impl Iterator<Item = (SlotName, Option<&EntityRef>)> {
        std::iter::once((SlotName::Core, self.core.as_ref())).chain(
            self.fragments
                .iter()
                .enumerate()
                .map(|(index, fragment)| (SlotName::Fragment(index), fragment.as_ref())),
        )
    }

    pub fn occupied(&self) -> impl Iterator<Item = (SlotName, &EntityRef)> {
        self.iter()
            .filter_map(|(slot, module)| module.map(|module| (slot, module)))
    }

    pub fn contains(&self, module: &EntityRef) -> bool {
        self.occupied().any(|(_, assigned)| assigned == module)
    }
}

/// How containers are recognized among an owner's entities, and their layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub entity_type: String,
    pub slug: String,
    pub fragment_count: usize,
}

impl Default for ContainerSpec {
    fn default() -> Self {
        Self {
            entity_type: "equipment".to_string(),
            slug: "hedron-interface".to_string(),
            fragment_count: 2,
        }
    }
}

impl ContainerSpec {
    /// A container is an entity of the container type that either carries
    /// the canonical slug or is explicitly flagged.
    pub fn is_container(&self, entity: &Entity) -> bool {
        if entity.entity_type != self.entity_type {
            return false;
        }
        entity.slug.as_deref() == Some(self.slug.as_str())
            || entity.flags.get_or_default(&hedron::IS_CONTAINER)
    }

    /// Slots of a container; absent or malformed state reads as all-empty
    pub fn slots_of(&self, container: &Entity) -> Slots {
        container
            .flags
            .get_or_default(&hedron::SLOTS)
            .normalized(self.fragment_count)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum SlotError {
    #[error("Invalid slot name '{0}' (expected 'core' or 'fragment-<n>')")]
    InvalidSlotName(String),

    #[error("Slot {slot} does not exist (container has {fragment_count} fragment slots)")]
    UnknownSlot { slot: SlotName, fragment_count: usize },

    #[error("Slot {slot} accepts only {expected} modules, got {}", describe_category(.actual))]
    CategoryMismatch {
        slot: SlotName,
        expected: ModuleCategory,
        actual: Option<ModuleCategory>,
    },

    #[error("Module {0} could not be resolved")]
    ModuleNotFound(EntityRef),

    #[error("Owner {0} not found")]
    OwnerNotFound(OwnerId),

    #[error("Entity {container} not found on owner {owner_id}")]
    ContainerNotFound { owner_id: OwnerId, container: EntityId },

    #[error("Entity {0} is not a container")]
    NotAContainer(EntityId),

    #[error(transparent)]
    Property(#[from] PropertyError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

fn describe_category(category: &Option<ModuleCategory>) -> String {
    match category {
        Some(category) => format!("a {category} module"),
        None => "an untyped entity".to_string(),
    }
}
