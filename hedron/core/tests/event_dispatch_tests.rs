// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end tests of the background dispatch loop: mutations published by
//! the in-memory world reach the reconciler through the event bus.

mod common;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use common::*;
use hedron_core::application::{EventDispatcher, Reconciler};
use hedron_core::domain::config::HedronConfig;
use hedron_core::domain::container::{SlotName, Slots};
use hedron_core::domain::entity::{Entity, EntityRef};
use hedron_core::domain::events::{ChangeEvent, SyncEvent};
use hedron_core::domain::grant::GrantKey;
use hedron_core::domain::module::ModuleCategory;
use hedron_core::domain::owner::Owner;
use hedron_core::domain::properties::hedron;
use hedron_core::domain::repository::{EntityResolver, OwnerRepository};
use hedron_core::infrastructure::event_bus::{EventBus, SyncEventReceiver};
use hedron_core::infrastructure::repositories::InMemoryWorld;

fn start_dispatcher(h: &Harness) -> tokio::task::JoinHandle<()> {
    let dispatcher = Arc::new(EventDispatcher::new(
        h.reconciler.clone(),
        h.world.clone(),
        h.world.clone(),
        h.event_bus.clone(),
        h.config.container_spec(),
    ));
    dispatcher.start()
}

/// Wait for the next completion that changed something
async fn next_applied_sync(events: &mut SyncEventReceiver) -> (usize, usize) {
    loop {
        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for sync")
            .unwrap();
        match event {
            SyncEvent::OwnerSynced { created, deleted, .. } if created + deleted > 0 => {
                return (created, deleted)
            }
            SyncEvent::OwnerSynced { .. } => continue,
            SyncEvent::OwnerSyncFailed { reason, .. } => panic!("sync failed: {}", reason),
        }
    }
}

#[tokio::test]
async fn test_slot_change_triggers_sync() {
    let h = Harness::new();
    let (owner_id, container_id) = h.add_owner("Valeros");
    let handle = start_dispatcher(&h);
    let mut events = h.event_bus.subscribe_sync(owner_id);

    h.equip(owner_id, container_id, SlotName::Core, CORE_EMBER).await;
    assert_eq!(next_applied_sync(&mut events).await, (1, 0));
    assert_eq!(h.granted_keys(owner_id).await, vec![GrantKey::effect(EFFECT_GLOW)]);

    h.slots.set_slot(owner_id, container_id, SlotName::Core, None).await.unwrap();
    assert_eq!(next_applied_sync(&mut events).await, (0, 1));
    assert!(h.granted_keys(owner_id).await.is_empty());

    handle.abort();
}

#[tokio::test]
async fn test_deleted_grant_is_restored() {
    let h = Harness::new();
    let (owner_id, container_id) = h.add_owner("Kyra");
    h.equip(owner_id, container_id, SlotName::Fragment(0), FRAG_FLAME).await;
    h.reconciler.sync(owner_id).await.unwrap();

    let handle = start_dispatcher(&h);
    let mut events = h.event_bus.subscribe_sync(owner_id);

    let granted_id = h.owner(owner_id).await.granted().next().unwrap().id;
    h.world.delete_entities(owner_id, &[granted_id]).await.unwrap();

    assert_eq!(next_applied_sync(&mut events).await, (1, 0));
    assert_eq!(h.granted_keys(owner_id).await, vec![GrantKey::action(ACTION_BLAST)]);

    handle.abort();
}

#[tokio::test]
async fn test_library_module_change_resyncs_holders() {
    let h = Harness::new();
    let (holder_id, container_id) = h.add_owner("Seoni");
    let (bystander_id, _) = h.add_owner("Ezren");
    h.equip(holder_id, container_id, SlotName::Core, CORE_EMBER).await;
    h.reconciler.sync(holder_id).await.unwrap();

    let handle = start_dispatcher(&h);
    let mut events = h.event_bus.subscribe_sync(holder_id);

    h.world.update_library_entity(
        EntityRef::from(CORE_EMBER),
        module(ModuleCategory::Core, &[EFFECT_GLOW, EFFECT_CHILL], &[]),
        vec!["flags.hedron.grant".to_string()],
    );

    assert_eq!(next_applied_sync(&mut events).await, (1, 0));
    assert_eq!(
        h.granted_keys(holder_id).await,
        vec![GrantKey::effect(EFFECT_CHILL), GrantKey::effect(EFFECT_GLOW)]
    );
    assert!(h.granted_keys(bystander_id).await.is_empty());

    handle.abort();
}

#[tokio::test]
async fn test_removed_library_module_drops_holder_grants() {
    let h = Harness::new();
    let (holder_id, container_id) = h.add_owner("Jirelle");
    h.equip(holder_id, container_id, SlotName::Core, CORE_EMBER).await;
    h.reconciler.sync(holder_id).await.unwrap();

    let handle = start_dispatcher(&h);
    let mut events = h.event_bus.subscribe_sync(holder_id);

    assert!(h.world.remove_library_entity(&EntityRef::from(CORE_EMBER)).is_some());

    assert_eq!(next_applied_sync(&mut events).await, (0, 1));
    assert!(h.granted_keys(holder_id).await.is_empty());

    handle.abort();
}

#[tokio::test]
async fn test_session_start_syncs_every_owner() {
    let h = Harness::new();
    let mut owners = Vec::new();
    for name in ["Amiri", "Lini"] {
        let (owner_id, container_id) = h.add_owner(name);
        h.equip(owner_id, container_id, SlotName::Core, CORE_EMBER).await;
        owners.push(owner_id);
    }

    let handle = start_dispatcher(&h);
    let mut first = h.event_bus.subscribe_sync(owners[0]);
    let mut second = h.event_bus.subscribe_sync(owners[1]);

    h.event_bus
        .publish_change_event(ChangeEvent::SessionStarted { started_at: Utc::now() });

    assert_eq!(next_applied_sync(&mut first).await, (1, 0));
    assert_eq!(next_applied_sync(&mut second).await, (1, 0));
    handle.abort();
}

#[tokio::test]
async fn test_irrelevant_changes_do_not_sync() {
    let h = Harness::new();
    let (owner_id, _) = h.add_owner("Merisiel");
    let owner = h.owner(owner_id).await;
    let container_id = owner.entities[0].id;

    let dispatcher = EventDispatcher::new(
        h.reconciler.clone(),
        h.world.clone(),
        h.world.clone(),
        h.event_bus.clone(),
        h.config.container_spec(),
    );

    let unrelated = ChangeEvent::EntityUpdated {
        owner_id: None,
        entity_ref: EntityRef::from(EFFECT_GLOW),
        entity: h.world.resolve(&EntityRef::from(EFFECT_GLOW)).await.unwrap(),
        changed: vec!["name".to_string()],
        updated_at: Utc::now(),
    };
    assert!(dispatcher.dispatch(&unrelated).await.unwrap().is_empty());

    let container_touched = ChangeEvent::EntityUpdated {
        owner_id: Some(owner_id),
        entity_ref: owner.entity_ref(container_id),
        entity: owner.entities[0].clone(),
        changed: vec!["name".to_string()],
        updated_at: Utc::now(),
    };
    assert_eq!(dispatcher.dispatch(&container_touched).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_container_losing_its_slug_drops_grants() {
    let h = Harness::new();
    let (owner_id, container_id) = h.add_owner("Imrijka");
    h.equip(owner_id, container_id, SlotName::Core, CORE_EMBER).await;
    h.reconciler.sync(owner_id).await.unwrap();
    assert_eq!(h.granted_keys(owner_id).await, vec![GrantKey::effect(EFFECT_GLOW)]);

    let mut owner = h.owner(owner_id).await;
    let former = owner.entity_mut(container_id).unwrap();
    former.slug = Some("backpack".to_string());
    let former = former.clone();
    h.world.insert_owner(owner.clone());

    let dispatcher = EventDispatcher::new(
        h.reconciler.clone(),
        h.world.clone(),
        h.world.clone(),
        h.event_bus.clone(),
        h.config.container_spec(),
    );
    let reports = dispatcher
        .dispatch(&ChangeEvent::EntityUpdated {
            owner_id: Some(owner_id),
            entity_ref: owner.entity_ref(container_id),
            entity: former,
            changed: vec!["slug".to_string()],
            updated_at: Utc::now(),
        })
        .await
        .unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].deleted, vec![GrantKey::effect(EFFECT_GLOW)]);
    assert!(h.granted_keys(owner_id).await.is_empty());
}

#[tokio::test]
async fn test_lagged_dispatcher_resyncs_every_owner() {
    let config = HedronConfig::default();
    let event_bus = Arc::new(EventBus::new(2));
    let world = Arc::new(InMemoryWorld::new().with_event_bus(event_bus.clone()));
    world.insert_library_entity(
        EntityRef::from(CORE_EMBER),
        module(ModuleCategory::Core, &[EFFECT_GLOW], &[]),
    );
    world.insert_library_entity(EntityRef::from(EFFECT_GLOW), Entity::new("effect").with_name("Glow"));

    let mut slots = Slots::empty(2);
    slots.assign(SlotName::Core, Some(EntityRef::from(CORE_EMBER))).unwrap();
    let mut owners = Vec::new();
    for name in ["Tessa", "Quinn", "Rexxar"] {
        let owner = Owner::new(name).with_entity(container().with_property(&hedron::SLOTS, &slots).unwrap());
        owners.push(owner.id);
        world.insert_owner(owner);
    }

    let reconciler = Arc::new(Reconciler::new(world.clone(), world.clone(), event_bus.clone(), &config));
    let dispatcher = Arc::new(EventDispatcher::new(
        reconciler,
        world.clone(),
        world.clone(),
        event_bus.clone(),
        config.container_spec(),
    ));
    let handle = dispatcher.start();

    // Overflow the bus before the loop first runs; none of these is relevant
    for _ in 0..8 {
        event_bus.publish_change_event(ChangeEvent::EntityUpdated {
            owner_id: None,
            entity_ref: EntityRef::from(EFFECT_GLOW),
            entity: Entity::new("effect").with_name("Glow"),
            changed: vec!["name".to_string()],
            updated_at: Utc::now(),
        });
    }

    timeout(Duration::from_secs(5), async {
        loop {
            let mut converged = true;
            for owner_id in &owners {
                let owner = world.find_by_id(*owner_id).await.unwrap().unwrap();
                let keys: Vec<GrantKey> = owner.granted().map(|g| g.key).collect();
                converged &= keys == vec![GrantKey::effect(EFFECT_GLOW)];
            }
            if converged {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("owners did not converge after the dispatcher lagged");

    handle.abort();
}
