// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entity::{Entity, EntityRef, OwnerId};

/// Change notifications emitted by the host (or the in-memory store) after
/// a mutation has been persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChangeEvent {
    EntityUpdated {
        /// `None` for library entities that no owner embeds
        owner_id: Option<OwnerId>,
        entity_ref: EntityRef,
        /// State after the update
        entity: Entity,
        /// Dotted paths of the changed fields (`flags.hedron.slots`)
        changed: Vec<String>,
        updated_at: DateTime<Utc>,
    },
    EntityCreated {
        owner_id: OwnerId,
        entity: Entity,
        created_at: DateTime<Utc>,
    },
    EntityDeleted {
        owner_id: OwnerId,
        entity: Entity,
        deleted_at: DateTime<Utc>,
    },
    /// An owner became active or visible
    OwnerActivated {
        owner_id: OwnerId,
        activated_at: DateTime<Utc>,
    },
    /// Cold start of a hosting session
    SessionStarted { started_at: DateTime<Utc> },
    /// Scene or context switch; staleness cannot be detected otherwise
    ContextSwitched { switched_at: DateTime<Utc> },
}

/// Completion notifications for downstream subscribers (re-render, audit)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SyncEvent {
    OwnerSynced {
        owner_id: OwnerId,
        created: usize,
        deleted: usize,
        unchanged: usize,
        synced_at: DateTime<Utc>,
    },
    OwnerSyncFailed {
        owner_id: OwnerId,
        reason: String,
        failed_at: DateTime<Utc>,
    },
}
