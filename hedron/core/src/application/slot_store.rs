// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Slot Store Application Service
//!
//! Reads and writes the slot assignments of containers. Category
//! compatibility is enforced here, at assignment time; nothing downstream
//! re-validates it. Writes go through `OwnerRepository::set_property`, and
//! the resulting change notification is what triggers reconciliation. The
//! store never calls the reconciler itself.
//!
//! A write replaces the whole slot mapping, so writes to the same container
//! are serialized by a per-container async lock.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::container::{ContainerSpec, SlotError, SlotName, Slots};
use crate::domain::entity::{Entity, EntityId, EntityRef, OwnerId};
use crate::domain::module::Module;
use crate::domain::properties::{hedron, PropertyError};
use crate::domain::repository::{EntityResolver, OwnerRepository};

type ContainerKey = (OwnerId, EntityId);

pub struct SlotStore {
    owners: Arc<dyn OwnerRepository>,
    resolver: Arc<dyn EntityResolver>,
    spec: ContainerSpec,
    locks: DashMap<ContainerKey, Arc<Mutex<()>>>,
}

impl SlotStore {
    pub fn new(
        owners: Arc<dyn OwnerRepository>,
        resolver: Arc<dyn EntityResolver>,
        spec: ContainerSpec,
    ) -> Self {
        Self {
            owners,
            resolver,
            spec,
            locks: DashMap::new(),
        }
    }

    /// Slot mapping of a container. Never fails: absent or malformed state
    /// reads as all-empty slots.
    pub fn get_slots(&self, container: &Entity) -> Slots {
        self.spec.slots_of(container)
    }

    /// Load a container from its owner and read its slots
    pub async fn slots(&self, owner_id: OwnerId, container_id: EntityId) -> Result<Slots, SlotError> {
        let container = self.load_container(owner_id, container_id).await?;
        Ok(self.get_slots(&container))
    }

    /// Assign `module` to `slot`, or empty the slot with `None`.
    ///
    /// Rejects modules whose category does not match the slot before
    /// anything is written.
    pub async fn set_slot(
        &self,
        owner_id: OwnerId,
        container_id: EntityId,
        slot: SlotName,
        module: Option<EntityRef>,
    ) -> Result<Slots, SlotError> {
        let key = (owner_id, container_id);
        let lock = self.container_lock(key);
        let result = {
            let _guard = lock.lock().await;
            self.set_slot_locked(owner_id, container_id, slot, module).await
        };
        drop(lock);
        self.release_container_lock(key);
        result
    }

    async fn set_slot_locked(
        &self,
        owner_id: OwnerId,
        container_id: EntityId,
        slot: SlotName,
        module: Option<EntityRef>,
    ) -> Result<Slots, SlotError> {
        let container = self.load_container(owner_id, container_id).await?;
        let current = self.get_slots(&container);

        if let Some(reference) = &module {
            self.check_category(slot, reference).await?;
        }

        let mut slots = current.clone();
        slots.assign(slot, module.clone())?;

        if slots == current {
            debug!(%owner_id, %container_id, %slot, "Slot already holds requested module");
            return Ok(slots);
        }

        self.persist(owner_id, container_id, &slots).await?;
        match &module {
            Some(reference) => info!(%owner_id, %container_id, %slot, module = %reference, "Module equipped"),
            None => info!(%owner_id, %container_id, %slot, "Slot cleared"),
        }
        Ok(slots)
    }

    /// Remove `module` from every slot of the container that holds it.
    /// Returns the slots that were cleared.
    pub async fn clear_module(
        &self,
        owner_id: OwnerId,
        container_id: EntityId,
        module: &EntityRef,
    ) -> Result<Vec<SlotName>, SlotError> {
        let key = (owner_id, container_id);
        let lock = self.container_lock(key);
        let result = {
            let _guard = lock.lock().await;
            self.clear_module_locked(owner_id, container_id, module).await
        };
        drop(lock);
        self.release_container_lock(key);
        result
    }

    async fn clear_module_locked(
        &self,
        owner_id: OwnerId,
        container_id: EntityId,
        module: &EntityRef,
    ) -> Result<Vec<SlotName>, SlotError> {
        let container = self.load_container(owner_id, container_id).await?;
        let mut slots = self.get_slots(&container);

        let cleared = slots.remove_module(module);
        if cleared.is_empty() {
            debug!(%owner_id, %container_id, module = %module, "Module not equipped; nothing to clear");
            return Ok(cleared);
        }

        self.persist(owner_id, container_id, &slots).await?;
        info!(%owner_id, %container_id, module = %module, slots = cleared.len(), "Module unequipped");
        Ok(cleared)
    }

    fn container_lock(&self, key: ContainerKey) -> Arc<Mutex<()>> {
        self.locks.entry(key).or_default().clone()
    }

    fn release_container_lock(&self, key: ContainerKey) {
        self.locks.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn check_category(&self, slot: SlotName, reference: &EntityRef) -> Result<(), SlotError> {
        let entity = self
            .resolver
            .resolve(reference)
            .await
            .ok_or_else(|| SlotError::ModuleNotFound(reference.clone()))?;

        let module = Module::from_entity(reference.clone(), &entity);
        let expected = slot.required_category();
        if module.category != Some(expected) {
            return Err(SlotError::CategoryMismatch {
                slot,
                expected,
                actual: module.category,
            });
        }
        Ok(())
    }

    async fn load_container(&self, owner_id: OwnerId, container_id: EntityId) -> Result<Entity, SlotError> {
        let owner = self
            .owners
            .find_by_id(owner_id)
            .await?
            .ok_or(SlotError::OwnerNotFound(owner_id))?;

        let container = owner
            .entity(container_id)
            .cloned()
            .ok_or(SlotError::ContainerNotFound {
                owner_id,
                container: container_id,
            })?;

        if !self.spec.is_container(&container) {
            return Err(SlotError::NotAContainer(container_id));
        }
        Ok(container)
    }

    async fn persist(&self, owner_id: OwnerId, container_id: EntityId, slots: &Slots) -> Result<(), SlotError> {
        let key = &hedron::SLOTS;
        let value = serde_json::to_value(slots).map_err(|e| PropertyError::Serialization {
            namespace: key.namespace,
            key: key.key,
            reason: e.to_string(),
        })?;
        self.owners
            .set_property(owner_id, container_id, key.namespace, key.key, value)
            .await?;
        Ok(())
    }
}
