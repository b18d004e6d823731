// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};

use crate::domain::container::ContainerSpec;
use crate::domain::entity::{Entity, EntityId, EntityRef, OwnerId};
use crate::domain::grant::GrantedEntity;

/// Aggregate root holding containers, granted entities and anything else
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub id: OwnerId,
    pub name: String,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl Owner {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: OwnerId::new(),
            name: name.into(),
            entities: Vec::new(),
        }
    }

    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.id == id)
    }

    /// Reference under which an embedded entity resolves
    pub fn entity_ref(&self, id: EntityId) -> EntityRef {
        EntityRef::owned(self.id, id)
    }

    pub fn containers<'a>(&'a self, spec: &'a ContainerSpec) -> impl Iterator<Item = &'a Entity> + 'a {
        self.entities.iter().filter(move |e| spec.is_container(e))
    }

    /// Every tagged entity, in collection order
    pub fn granted(&self) -> impl Iterator<Item = GrantedEntity> + '_ {
        self.entities.iter().filter_map(GrantedEntity::from_entity)
    }
}
