// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the collaborator traits declared in
//! `crate::domain::repository`.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Hold owners and library entities, resolve references
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! - **InMemoryWorld** - lock-protected map of owners plus a library of
//!   referenceable entities (compendium-style templates and modules). It
//!   implements `EntityResolver`, `OwnerRepository` and `OwnerRegistry`, and
//!   when given an event bus it publishes a `ChangeEvent` after every
//!   mutation, the way a host's document hooks would.
//! - **WorldSnapshot** - YAML form of a world, used by the CLI.

pub mod snapshot;

pub use snapshot::{LibraryEntry, WorldSnapshot};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::domain::entity::{Entity, EntityId, EntityRef, NewEntity, OwnerId};
use crate::domain::events::ChangeEvent;
use crate::domain::owner::Owner;
use crate::domain::properties::hedron;
use crate::domain::repository::{EntityResolver, OwnerRegistry, OwnerRepository, RepositoryError};
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, Default)]
struct WorldState {
    owners: BTreeMap<OwnerId, Owner>,
    library: BTreeMap<EntityRef, Entity>,
}

#[derive(Clone, Default)]
pub struct InMemoryWorld {
    state: Arc<RwLock<WorldState>>,
    event_bus: Option<Arc<EventBus>>,
}

impl InMemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish change notifications to `event_bus` after each mutation
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn from_snapshot(snapshot: WorldSnapshot) -> Self {
        let world = Self::new();
        {
            let mut state = world.state.write();
            for owner in snapshot.owners {
                state.owners.insert(owner.id, owner);
            }
            for entry in snapshot.library {
                state.library.insert(entry.reference, entry.entity);
            }
        }
        world
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        let state = self.state.read();
        WorldSnapshot {
            owners: state.owners.values().cloned().collect(),
            library: state
                .library
                .iter()
                .map(|(reference, entity)| LibraryEntry {
                    reference: reference.clone(),
                    entity: entity.clone(),
                })
                .collect(),
        }
    }

    /// Seed an owner without emitting events
    pub fn insert_owner(&self, owner: Owner) {
        self.state.write().owners.insert(owner.id, owner);
    }

    /// Seed a library entity without emitting events
    pub fn insert_library_entity(&self, reference: EntityRef, entity: Entity) {
        self.state.write().library.insert(reference, entity);
    }

    /// Remove a library entity. Holders of a removed module are notified as
    /// if its grants and category had changed.
    pub fn remove_library_entity(&self, reference: &EntityRef) -> Option<Entity> {
        let removed = self.state.write().library.remove(reference)?;
        self.publish(ChangeEvent::EntityUpdated {
            owner_id: None,
            entity_ref: reference.clone(),
            entity: removed.clone(),
            changed: vec![hedron::GRANT.change_path(), hedron::MODULE_TYPE.change_path()],
            updated_at: Utc::now(),
        });
        Some(removed)
    }

    /// Replace a library entity and notify subscribers of the changed paths
    pub fn update_library_entity(&self, reference: EntityRef, entity: Entity, changed: Vec<String>) {
        self.state.write().library.insert(reference.clone(), entity.clone());
        self.publish(ChangeEvent::EntityUpdated {
            owner_id: None,
            entity_ref: reference,
            entity,
            changed,
            updated_at: Utc::now(),
        });
    }

    fn publish(&self, event: ChangeEvent) {
        if let Some(event_bus) = &self.event_bus {
            event_bus.publish_change_event(event);
        }
    }
}

#[async_trait]
impl EntityResolver for InMemoryWorld {
    async fn resolve(&self, reference: &EntityRef) -> Option<Entity> {
        let state = self.state.read();
        if let Some(entity) = state.library.get(reference) {
            return Some(entity.clone());
        }
        let (owner_id, entity_id) = reference.as_owned()?;
        state.owners.get(&owner_id)?.entity(entity_id).cloned()
    }
}

#[async_trait]
impl OwnerRepository for InMemoryWorld {
    async fn find_by_id(&self, id: OwnerId) -> Result<Option<Owner>, RepositoryError> {
        Ok(self.state.read().owners.get(&id).cloned())
    }

    async fn set_property(
        &self,
        owner_id: OwnerId,
        entity_id: EntityId,
        namespace: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), RepositoryError> {
        let entity = {
            let mut state = self.state.write();
            let owner = state
                .owners
                .get_mut(&owner_id)
                .ok_or_else(|| RepositoryError::NotFound(format!("owner {owner_id}")))?;
            let entity = owner
                .entity_mut(entity_id)
                .ok_or_else(|| RepositoryError::NotFound(format!("entity {entity_id} on owner {owner_id}")))?;
            entity.flags.set_raw(namespace, key, value);
            entity.clone()
        };

        self.publish(ChangeEvent::EntityUpdated {
            owner_id: Some(owner_id),
            entity_ref: EntityRef::owned(owner_id, entity_id),
            entity,
            changed: vec![format!("flags.{namespace}.{key}")],
            updated_at: Utc::now(),
        });
        Ok(())
    }

    async fn create_entities(
        &self,
        owner_id: OwnerId,
        definitions: Vec<NewEntity>,
    ) -> Result<Vec<EntityId>, RepositoryError> {
        let created: Vec<Entity> = {
            let mut state = self.state.write();
            let owner = state
                .owners
                .get_mut(&owner_id)
                .ok_or_else(|| RepositoryError::NotFound(format!("owner {owner_id}")))?;
            let created: Vec<Entity> = definitions
                .into_iter()
                .map(|definition| definition.into_entity(EntityId::new()))
                .collect();
            owner.entities.extend(created.iter().cloned());
            created
        };

        let ids = created.iter().map(|e| e.id).collect();
        for entity in created {
            self.publish(ChangeEvent::EntityCreated {
                owner_id,
                entity,
                created_at: Utc::now(),
            });
        }
        Ok(ids)
    }

    async fn delete_entities(&self, owner_id: OwnerId, ids: &[EntityId]) -> Result<(), RepositoryError> {
        let removed: Vec<Entity> = {
            let mut state = self.state.write();
            let owner = state
                .owners
                .get_mut(&owner_id)
                .ok_or_else(|| RepositoryError::NotFound(format!("owner {owner_id}")))?;

            // All or nothing: refuse the batch if any id is unknown
            if let Some(missing) = ids.iter().find(|id| owner.entity(**id).is_none()) {
                return Err(RepositoryError::NotFound(format!(
                    "entity {missing} on owner {owner_id}"
                )));
            }

            let doomed: HashSet<EntityId> = ids.iter().copied().collect();
            let (removed, kept): (Vec<Entity>, Vec<Entity>) = std::mem::take(&mut owner.entities)
                .into_iter()
                .partition(|e| doomed.contains(&e.id));
            owner.entities = kept;
            removed
        };

        for entity in removed {
            self.publish(ChangeEvent::EntityDeleted {
                owner_id,
                entity,
                deleted_at: Utc::now(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl OwnerRegistry for InMemoryWorld {
    async fn owner_ids(&self) -> Result<Vec<OwnerId>, RepositoryError> {
        Ok(self.state.read().owners.keys().copied().collect())
    }
}
