// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Event Dispatcher Application Service
//!
//! Subscribes to change notifications on the event bus and decides, through
//! a single relevance predicate, which owners need reconciling. Each
//! relevant event is handled in its own task so different owners proceed
//! concurrently; the reconciler's per-owner lock serializes the same owner.
//!
//! The dispatcher never crashes on a failed sync: errors are logged and the
//! next relevant event (or a full sync) repairs the owner.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::reconciler::{Reconciler, SyncError, SyncReport};
use crate::domain::container::ContainerSpec;
use crate::domain::entity::{Entity, EntityRef, OwnerId};
use crate::domain::events::ChangeEvent;
use crate::domain::grant::GrantedEntity;
use crate::domain::module::Module;
use crate::domain::properties::hedron;
use crate::domain::repository::{OwnerRegistry, OwnerRepository};
use crate::infrastructure::event_bus::{EventBus, EventBusError};

/// Which owners a change notification affects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relevance {
    Ignore,
    Owner(OwnerId),
    /// Owners whose containers hold the given module
    OwnersReferencing(EntityRef),
    AllOwners,
}

/// The relevance predicate. Pure: decided from the event alone.
pub fn relevance(spec: &ContainerSpec, event: &ChangeEvent) -> Relevance {
    match event {
        ChangeEvent::EntityUpdated {
            owner_id: Some(owner_id),
            entity,
            changed,
            ..
        } => {
            let mut watched = hedron::watched_paths().to_vec();
            watched.push(hedron::SOURCE.change_path());
            watched.push(hedron::GRANT_KIND.change_path());
            // Container recognition reads these, so an entity can stop being one
            watched.extend(CONTAINER_FIELDS.iter().map(|field| field.to_string()));

            if spec.is_container(entity) || touches_any(changed, &watched) {
                Relevance::Owner(*owner_id)
            } else {
                Relevance::Ignore
            }
        }
        ChangeEvent::EntityUpdated {
            owner_id: None,
            entity_ref,
            changed,
            ..
        } => {
            let watched = [hedron::GRANT.change_path(), hedron::MODULE_TYPE.change_path()];
            if touches_any(changed, &watched) {
                Relevance::OwnersReferencing(entity_ref.clone())
            } else {
                Relevance::Ignore
            }
        }
        ChangeEvent::EntityCreated { owner_id, entity, .. }
        | ChangeEvent::EntityDeleted { owner_id, entity, .. } => {
            if affects_grants(spec, entity) {
                Relevance::Owner(*owner_id)
            } else {
                Relevance::Ignore
            }
        }
        ChangeEvent::OwnerActivated { owner_id, .. } => Relevance::Owner(*owner_id),
        ChangeEvent::SessionStarted { .. } | ChangeEvent::ContextSwitched { .. } => Relevance::AllOwners,
    }
}

const CONTAINER_FIELDS: [&str; 2] = ["type", "slug"];

fn affects_grants(spec: &ContainerSpec, entity: &Entity) -> bool {
    spec.is_container(entity) || Module::is_module(entity) || GrantedEntity::from_entity(entity).is_some()
}

/// A change path touches a watched path when it is the path itself, lies
/// beneath it, or replaces one of its parents (`flags.hedron`).
fn touches(changed: &str, watched: &str) -> bool {
    let beneath = |path: &str, parent: &str| {
        path.len() > parent.len() && path.starts_with(parent) && path.as_bytes()[parent.len()] == b'.'
    };
    changed == watched || beneath(changed, watched) || beneath(watched, changed)
}

fn touches_any(changed: &[String], watched: &[String]) -> bool {
    changed
        .iter()
        .any(|path| watched.iter().any(|w| touches(path, w)))
}

// ============================================================================
// Service
// ============================================================================

pub struct EventDispatcher {
    reconciler: Arc<Reconciler>,
    owners: Arc<dyn OwnerRepository>,
    registry: Arc<dyn OwnerRegistry>,
    event_bus: Arc<EventBus>,
    spec: ContainerSpec,
}

impl EventDispatcher {
    pub fn new(
        reconciler: Arc<Reconciler>,
        owners: Arc<dyn OwnerRepository>,
        registry: Arc<dyn OwnerRegistry>,
        event_bus: Arc<EventBus>,
        spec: ContainerSpec,
    ) -> Self {
        Self {
            reconciler,
            owners,
            registry,
            event_bus,
            spec,
        }
    }

    pub fn relevance(&self, event: &ChangeEvent) -> Relevance {
        relevance(&self.spec, event)
    }

    /// Evaluate the predicate for one event and run the resulting syncs
    pub async fn dispatch(&self, event: &ChangeEvent) -> Result<Vec<SyncReport>, SyncError> {
        let relevance = self.relevance(event);
        if relevance == Relevance::Ignore {
            debug!(?event, "Ignoring irrelevant change");
            return Ok(Vec::new());
        }
        self.apply(relevance).await
    }

    pub async fn apply(&self, relevance: Relevance) -> Result<Vec<SyncReport>, SyncError> {
        match relevance {
            Relevance::Ignore => Ok(Vec::new()),
            Relevance::Owner(owner_id) => Ok(vec![self.reconciler.sync(owner_id).await?]),
            Relevance::OwnersReferencing(module) => {
                let owner_ids = self.owners_referencing(&module).await?;
                debug!(module = %module, owners = owner_ids.len(), "Module changed; resyncing holders");
                self.reconciler.sync_many(owner_ids).await
            }
            Relevance::AllOwners => self.sync_all().await,
        }
    }

    pub async fn sync_all(&self) -> Result<Vec<SyncReport>, SyncError> {
        self.reconciler.sync_all(self.registry.as_ref()).await
    }

    /// Owners with `module` in any slot of any container
    pub async fn owners_referencing(&self, module: &EntityRef) -> Result<Vec<OwnerId>, SyncError> {
        let owner_ids = self.registry.owner_ids().await.map_err(SyncError::Registry)?;

        let mut holders = Vec::new();
        for owner_id in owner_ids {
            let owner = self
                .owners
                .find_by_id(owner_id)
                .await
                .map_err(|source| SyncError::Persistence { owner_id, source })?;
            let Some(owner) = owner else { continue };

            if owner
                .containers(&self.spec)
                .any(|container| self.spec.slots_of(container).contains(module))
            {
                holders.push(owner_id);
            }
        }
        Ok(holders)
    }

    /// Start the background dispatch loop.
    ///
    /// The subscription is taken before the task is spawned, so events
    /// published after `start` returns are never missed. The loop runs until
    /// the event bus closes.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        info!("Starting event dispatcher background task");
        let mut receiver = self.event_bus.subscribe_changes();

        tokio::spawn(async move {
            let mut events_dispatched = 0u64;

            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        let relevance = self.relevance(&event);
                        if relevance == Relevance::Ignore {
                            continue;
                        }
                        events_dispatched += 1;
                        self.spawn_apply(relevance);
                    }
                    Err(EventBusError::Lagged(n)) => {
                        warn!("Event dispatcher lagged by {} events, resyncing all owners", n);
                        self.spawn_apply(Relevance::AllOwners);
                    }
                    Err(EventBusError::Closed) => {
                        info!(
                            "Event bus closed, shutting down event dispatcher (dispatched {} events)",
                            events_dispatched
                        );
                        break;
                    }
                    Err(e) => {
                        error!(error = ?e, "Unexpected error receiving event from bus");
                    }
                }
            }
        })
    }

    fn spawn_apply(self: &Arc<Self>, relevance: Relevance) {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = dispatcher.apply(relevance.clone()).await {
                error!(?relevance, error = %e, "Reconciliation failed");
            }
        });
    }
}
