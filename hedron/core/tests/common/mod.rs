// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use hedron_core::application::{Reconciler, SlotStore};
use hedron_core::domain::config::HedronConfig;
use hedron_core::domain::container::{SlotName, Slots};
use hedron_core::domain::entity::{Entity, EntityId, EntityRef, OwnerId};
use hedron_core::domain::grant::{GrantKey, GrantKind};
use hedron_core::domain::module::{GrantTemplates, ModuleCategory};
use hedron_core::domain::owner::Owner;
use hedron_core::domain::properties::hedron;
use hedron_core::domain::repository::OwnerRepository;
use hedron_core::infrastructure::event_bus::EventBus;
use hedron_core::infrastructure::repositories::InMemoryWorld;

pub const CORE_EMBER: &str = "Compendium.embers.Item.core-ember";
pub const FRAG_FLAME: &str = "Compendium.embers.Item.frag-flame";
pub const FRAG_FROST: &str = "Compendium.embers.Item.frag-frost";
pub const EFFECT_GLOW: &str = "Compendium.fx.Item.glow";
pub const EFFECT_CHILL: &str = "Compendium.fx.Item.chill";
pub const ACTION_BLAST: &str = "Compendium.act.Item.blast";

pub struct Harness {
    pub config: HedronConfig,
    pub event_bus: Arc<EventBus>,
    pub world: Arc<InMemoryWorld>,
    pub reconciler: Arc<Reconciler>,
    pub slots: SlotStore,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(HedronConfig::default())
    }

    pub fn with_config(config: HedronConfig) -> Self {
        let event_bus = Arc::new(EventBus::new(256));
        let world = Arc::new(InMemoryWorld::new().with_event_bus(event_bus.clone()));
        seed_library(&world);

        let reconciler = Arc::new(Reconciler::new(
            world.clone(),
            world.clone(),
            event_bus.clone(),
            &config,
        ));
        let slots = SlotStore::new(world.clone(), world.clone(), config.container_spec());

        Self {
            config,
            event_bus,
            world,
            reconciler,
            slots,
        }
    }

    /// Insert an owner holding one empty container
    pub fn add_owner(&self, name: &str) -> (OwnerId, EntityId) {
        let container = container();
        let container_id = container.id;
        let owner = Owner::new(name).with_entity(container);
        let owner_id = owner.id;
        self.world.insert_owner(owner);
        (owner_id, container_id)
    }

    pub async fn equip(&self, owner_id: OwnerId, container_id: EntityId, slot: SlotName, module: &str) {
        self.slots
            .set_slot(owner_id, container_id, slot, Some(EntityRef::from(module)))
            .await
            .unwrap();
    }

    pub async fn owner(&self, owner_id: OwnerId) -> Owner {
        self.world.find_by_id(owner_id).await.unwrap().unwrap()
    }

    /// Granted keys of the owner, sorted, duplicates kept
    pub async fn granted_keys(&self, owner_id: OwnerId) -> Vec<GrantKey> {
        let mut keys: Vec<GrantKey> = self.owner(owner_id).await.granted().map(|g| g.key).collect();
        keys.sort();
        keys
    }
}

pub fn container() -> Entity {
    Entity::new("equipment")
        .with_name("Hedron Interface")
        .with_slug("hedron-interface")
        .with_property(&hedron::SLOTS, &Slots::empty(2))
        .unwrap()
}

pub fn module(category: ModuleCategory, effects: &[&str], actions: &[&str]) -> Entity {
    Entity::new("equipment")
        .with_property(&hedron::MODULE_TYPE, &category)
        .unwrap()
        .with_property(
            &hedron::GRANT,
            &GrantTemplates {
                effects: effects.iter().map(|e| EntityRef::from(*e)).collect(),
                actions: actions.iter().map(|a| EntityRef::from(*a)).collect(),
            },
        )
        .unwrap()
}

pub fn granted(source: &str, kind: GrantKind) -> Entity {
    Entity::new("effect")
        .with_name("Stale Grant")
        .with_property(&hedron::SOURCE, &EntityRef::from(source))
        .unwrap()
        .with_property(&hedron::GRANT_KIND, &kind)
        .unwrap()
}

fn seed_library(world: &InMemoryWorld) {
    world.insert_library_entity(
        EntityRef::from(CORE_EMBER),
        module(ModuleCategory::Core, &[EFFECT_GLOW], &[]).with_name("Core Ember"),
    );
    world.insert_library_entity(
        EntityRef::from(FRAG_FLAME),
        module(ModuleCategory::Fragment, &[], &[ACTION_BLAST]).with_name("Flame Fragment"),
    );
    world.insert_library_entity(
        EntityRef::from(FRAG_FROST),
        module(ModuleCategory::Fragment, &[EFFECT_CHILL, EFFECT_GLOW], &[]).with_name("Frost Fragment"),
    );
    world.insert_library_entity(
        EntityRef::from(EFFECT_GLOW),
        Entity::new("effect")
            .with_name("Glow")
            .with_system(serde_json::json!({ "duration": { "rounds": 3 } })),
    );
    world.insert_library_entity(EntityRef::from(EFFECT_CHILL), Entity::new("effect").with_name("Chill"));
    // Unnamed on purpose: snapshots fall back to the kind's default name
    world.insert_library_entity(EntityRef::from(ACTION_BLAST), Entity::new("action"));
}
