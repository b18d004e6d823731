// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Reconciler Application Service
//!
//! Converges the granted entities of an owner on the set its equipped
//! modules declare:
//!
//! 1. desired = union of grant templates over every equipped module
//! 2. actual  = entities tagged with `(sourceUuid, grantKind)`
//! 3. create desired - actual in one batch, delete actual - desired in one batch
//!
//! Entities without both tags are never touched, and existing granted
//! entities are never rewritten. A failed batch is returned to the caller
//! as is; the next sync repairs whatever was left behind.
//!
//! Syncs of one owner are serialized by a per-owner async lock, so
//! overlapping trigger events cannot both create the same grant.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::application::grant_resolver::GrantResolver;
use crate::domain::config::HedronConfig;
use crate::domain::entity::{EntityId, NewEntity, OwnerId};
use crate::domain::events::SyncEvent;
use crate::domain::grant::{DesiredGrants, GrantKey, GrantedEntity};
use crate::domain::owner::Owner;
use crate::domain::repository::{EntityResolver, OwnerRegistry, OwnerRepository, RepositoryError};
use crate::infrastructure::event_bus::EventBus;

// ============================================================================
// Results
// ============================================================================

/// Outcome of one owner sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub owner_id: OwnerId,
    pub created: Vec<GrantKey>,
    pub deleted: Vec<GrantKey>,
    pub unchanged: usize,
    /// Desired grants whose template did not resolve; retried on every sync
    pub unresolved: Vec<GrantKey>,
    pub synced_at: DateTime<Utc>,
}

impl SyncReport {
    fn empty(owner_id: OwnerId) -> Self {
        Self {
            owner_id,
            created: Vec::new(),
            deleted: Vec::new(),
            unchanged: 0,
            unresolved: Vec::new(),
            synced_at: Utc::now(),
        }
    }

    /// True when the sync issued no create and no delete
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Persistence failure while syncing owner {owner_id}: {source}")]
    Persistence {
        owner_id: OwnerId,
        #[source]
        source: RepositoryError,
    },

    #[error("Failed to enumerate owners: {0}")]
    Registry(#[source] RepositoryError),

    #[error("{} of {} owners failed to sync", .failed.len(), .failed.len() + .completed.len())]
    Partial {
        completed: Vec<SyncReport>,
        failed: Vec<(OwnerId, String)>,
    },
}

// ============================================================================
// Diff
// ============================================================================

/// Pure diff between the desired grants and the granted entities of an owner
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub to_create: Vec<GrantKey>,
    pub to_delete: Vec<(GrantKey, EntityId)>,
    pub unchanged: usize,
}

impl SyncPlan {
    pub fn compute(owner: &Owner, desired: &DesiredGrants) -> Self {
        let desired = desired.keys();
        let mut plan = SyncPlan::default();

        // First entity per key is the actual one; later ones are duplicates
        let mut actual: BTreeMap<GrantKey, EntityId> = BTreeMap::new();
        for granted in owner.granted() {
            if actual.contains_key(&granted.key) {
                plan.to_delete.push((granted.key, granted.id));
            } else {
                actual.insert(granted.key, granted.id);
            }
        }

        for (key, id) in &actual {
            if desired.contains(key) {
                plan.unchanged += 1;
            } else {
                plan.to_delete.push((key.clone(), *id));
            }
        }

        let present: BTreeSet<&GrantKey> = actual.keys().collect();
        plan.to_create = desired
            .into_iter()
            .filter(|key| !present.contains(key))
            .collect();
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty()
    }
}

// ============================================================================
// Service
// ============================================================================

pub struct Reconciler {
    owners: Arc<dyn OwnerRepository>,
    resolver: Arc<dyn EntityResolver>,
    grants: GrantResolver,
    event_bus: Arc<EventBus>,
    locks: DashMap<OwnerId, Arc<Mutex<()>>>,
    sync_all_concurrency: usize,
}

impl Reconciler {
    pub fn new(
        owners: Arc<dyn OwnerRepository>,
        resolver: Arc<dyn EntityResolver>,
        event_bus: Arc<EventBus>,
        config: &HedronConfig,
    ) -> Self {
        Self {
            owners,
            grants: GrantResolver::new(resolver.clone(), config.container_spec()),
            resolver,
            event_bus,
            locks: DashMap::new(),
            sync_all_concurrency: config.spec.sync.sync_all_concurrency.max(1),
        }
    }

    pub fn grant_resolver(&self) -> &GrantResolver {
        &self.grants
    }

    /// Reconcile one owner. Waits for any sync of the same owner already in
    /// flight, then publishes the outcome on the event bus.
    pub async fn sync(&self, owner_id: OwnerId) -> Result<SyncReport, SyncError> {
        let lock = self.owner_lock(owner_id);
        let result = {
            let _guard = lock.lock().await;

            let result = self.sync_locked(owner_id).await;
            match &result {
                Ok(report) => self.event_bus.publish_sync_event(SyncEvent::OwnerSynced {
                    owner_id,
                    created: report.created.len(),
                    deleted: report.deleted.len(),
                    unchanged: report.unchanged,
                    synced_at: report.synced_at,
                }),
                Err(e) => self.event_bus.publish_sync_event(SyncEvent::OwnerSyncFailed {
                    owner_id,
                    reason: e.to_string(),
                    failed_at: Utc::now(),
                }),
            }
            result
        };

        drop(lock);
        self.release_owner_lock(owner_id);
        result
    }

    /// Reconcile every owner the registry knows about
    pub async fn sync_all(&self, registry: &dyn OwnerRegistry) -> Result<Vec<SyncReport>, SyncError> {
        let owner_ids = registry.owner_ids().await.map_err(SyncError::Registry)?;
        info!(owners = owner_ids.len(), "Syncing all owners");
        self.sync_many(owner_ids).await
    }

    /// Reconcile a set of owners with bounded concurrency. Every owner is
    /// attempted; failures are collected into `SyncError::Partial`.
    pub async fn sync_many(&self, owner_ids: Vec<OwnerId>) -> Result<Vec<SyncReport>, SyncError> {
        let results: Vec<(OwnerId, Result<SyncReport, SyncError>)> = stream::iter(owner_ids)
            .map(|owner_id| async move { (owner_id, self.sync(owner_id).await) })
            .buffer_unordered(self.sync_all_concurrency)
            .collect()
            .await;

        let mut completed = Vec::new();
        let mut failed = Vec::new();
        for (owner_id, result) in results {
            match result {
                Ok(report) => completed.push(report),
                Err(e) => failed.push((owner_id, e.to_string())),
            }
        }
        completed.sort_by_key(|report| report.owner_id);

        if failed.is_empty() {
            Ok(completed)
        } else {
            failed.sort_by_key(|(owner_id, _)| *owner_id);
            Err(SyncError::Partial { completed, failed })
        }
    }

    fn owner_lock(&self, owner_id: OwnerId) -> Arc<Mutex<()>> {
        self.locks.entry(owner_id).or_default().clone()
    }

    /// Drop the owner's lock once no sync holds or awaits it. Cloning in
    /// `owner_lock` and this check both run under the map's shard lock.
    fn release_owner_lock(&self, owner_id: OwnerId) {
        self.locks.remove_if(&owner_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Owners with a sync in flight or waiting
    pub fn active_owner_locks(&self) -> usize {
        self.locks.len()
    }

    async fn sync_locked(&self, owner_id: OwnerId) -> Result<SyncReport, SyncError> {
        let persistence = |source| SyncError::Persistence { owner_id, source };

        let Some(owner) = self.owners.find_by_id(owner_id).await.map_err(persistence)? else {
            debug!(%owner_id, "Owner no longer exists; nothing to sync");
            return Ok(SyncReport::empty(owner_id));
        };

        let desired = self.grants.resolve_desired(&owner).await;
        let plan = SyncPlan::compute(&owner, &desired);
        let mut report = SyncReport::empty(owner_id);
        report.unchanged = plan.unchanged;

        if plan.is_empty() {
            debug!(%owner_id, unchanged = plan.unchanged, "Owner already in sync");
            return Ok(report);
        }

        let (definitions, created, unresolved) = self.build_snapshots(owner_id, &plan.to_create).await;
        report.unresolved = unresolved;

        if !definitions.is_empty() {
            self.owners
                .create_entities(owner_id, definitions)
                .await
                .map_err(persistence)?;
            info!(%owner_id, count = created.len(), "Created granted entities");
        }
        report.created = created;

        if !plan.to_delete.is_empty() {
            let ids: Vec<EntityId> = plan.to_delete.iter().map(|(_, id)| *id).collect();
            self.owners
                .delete_entities(owner_id, &ids)
                .await
                .map_err(persistence)?;
            info!(%owner_id, count = ids.len(), "Deleted orphaned granted entities");
        }
        report.deleted = plan.to_delete.into_iter().map(|(key, _)| key).collect();

        report.synced_at = Utc::now();
        Ok(report)
    }

    /// Resolve templates and snapshot them. Unresolvable templates are
    /// dropped from the batch.
    async fn build_snapshots(
        &self,
        owner_id: OwnerId,
        keys: &[GrantKey],
    ) -> (Vec<NewEntity>, Vec<GrantKey>, Vec<GrantKey>) {
        let templates = join_all(keys.iter().map(|key| self.resolver.resolve(&key.source))).await;

        let mut definitions = Vec::new();
        let mut created = Vec::new();
        let mut unresolved = Vec::new();
        for (key, template) in keys.iter().zip(templates) {
            let Some(template) = template else {
                warn!(%owner_id, grant = %key, "Grant template did not resolve; skipping");
                unresolved.push(key.clone());
                continue;
            };
            match GrantedEntity::snapshot(&template, key) {
                Ok(definition) => {
                    definitions.push(definition);
                    created.push(key.clone());
                }
                Err(e) => {
                    warn!(%owner_id, grant = %key, error = %e, "Cannot snapshot grant template; skipping");
                    unresolved.push(key.clone());
                }
            }
        }
        (definitions, created, unresolved)
    }
}
