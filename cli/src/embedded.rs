// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Embedded engine
//!
//! Creates the reconciliation services in-process over a world file and
//! executes commands directly. Change notifications published by the world
//! are drained and dispatched synchronously by [`EmbeddedEngine::settle`],
//! so a command returns only once every affected owner has converged.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use hedron_core::{
    application::{EventDispatcher, Reconciler, SlotStore, SyncError, SyncReport},
    domain::{config::HedronConfig, entity::OwnerId},
    infrastructure::{
        event_bus::{ChangeEventReceiver, EventBus, EventBusError},
        repositories::{InMemoryWorld, WorldSnapshot},
    },
};

pub struct EmbeddedEngine {
    config: HedronConfig,
    world: Arc<InMemoryWorld>,
    receiver: ChangeEventReceiver,
    reconciler: Arc<Reconciler>,
    dispatcher: EventDispatcher,
    slots: SlotStore,
}

impl EmbeddedEngine {
    /// Load a world file and wire the services around it
    pub fn load(config: HedronConfig, world_path: &Path) -> Result<Self> {
        let snapshot = WorldSnapshot::from_yaml_file(world_path)
            .with_context(|| format!("Failed to load world from {:?}", world_path))?;
        Ok(Self::from_snapshot(config, snapshot))
    }

    pub fn from_snapshot(config: HedronConfig, snapshot: WorldSnapshot) -> Self {
        let event_bus = Arc::new(EventBus::new(config.spec.sync.event_bus_capacity));
        let receiver = event_bus.subscribe_changes();
        let world = Arc::new(InMemoryWorld::from_snapshot(snapshot).with_event_bus(event_bus.clone()));

        let reconciler = Arc::new(Reconciler::new(
            world.clone(),
            world.clone(),
            event_bus.clone(),
            &config,
        ));
        let dispatcher = EventDispatcher::new(
            reconciler.clone(),
            world.clone(),
            world.clone(),
            event_bus,
            config.container_spec(),
        );
        let slots = SlotStore::new(world.clone(), world.clone(), config.container_spec());

        Self {
            config,
            world,
            receiver,
            reconciler,
            dispatcher,
            slots,
        }
    }

    pub fn config(&self) -> &HedronConfig {
        &self.config
    }

    pub fn world(&self) -> &InMemoryWorld {
        &self.world
    }

    pub fn slots(&self) -> &SlotStore {
        &self.slots
    }

    pub async fn sync_owner(&self, owner_id: OwnerId) -> Result<SyncReport, SyncError> {
        self.reconciler.sync(owner_id).await
    }

    pub async fn sync_all(&self) -> Result<Vec<SyncReport>, SyncError> {
        self.dispatcher.sync_all().await
    }

    /// Dispatch every pending change notification, including the ones the
    /// resulting syncs publish, until the bus is empty. Returns the reports
    /// of syncs that changed something.
    pub async fn settle(&mut self) -> Result<Vec<SyncReport>> {
        let mut applied = Vec::new();
        loop {
            let reports = match self.receiver.try_recv() {
                Ok(event) => self.dispatcher.dispatch(&event).await?,
                Err(EventBusError::Empty) | Err(EventBusError::Closed) => break,
                Err(EventBusError::Lagged(n)) => {
                    warn!("Dropped {} change notifications; resyncing all owners", n);
                    self.dispatcher.sync_all().await?
                }
            };
            applied.extend(reports.into_iter().filter(|report| !report.is_noop()));
        }
        debug!(applied = applied.len(), "Event bus settled");
        Ok(applied)
    }

    pub fn save(&self, world_path: &Path) -> Result<()> {
        self.world
            .snapshot()
            .to_yaml_file(world_path)
            .with_context(|| format!("Failed to write world to {:?}", world_path))
    }
}
