// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Domain Repository Interfaces
//!
//! Contracts for the collaborators the reconciliation engine consumes. The
//! engine owns no storage: hosts implement these traits over their own
//! document store, and `crate::infrastructure::repositories` provides an
//! in-memory implementation for development, tests and the CLI.
//!
//! | Trait | Role | Failure mode |
//! |-------|------|--------------|
//! | `EntityResolver` | Reference -> entity | Never fails; `None` for dangling or unauthorized refs |
//! | `OwnerRepository` | Owner aggregate reads and batched mutations | `RepositoryError` |
//! | `OwnerRegistry` | Enumerates known owners for full syncs | `RepositoryError` |

use async_trait::async_trait;

use crate::domain::entity::{Entity, EntityId, EntityRef, NewEntity, OwnerId};
use crate::domain::owner::Owner;

/// Resolves opaque references to entities
#[async_trait]
pub trait EntityResolver: Send + Sync {
    /// `None` means the reference is dangling or not visible to the caller.
    /// It is not an error: the referenced module simply contributes nothing.
    async fn resolve(&self, reference: &EntityRef) -> Option<Entity>;
}

/// Repository interface for Owner aggregates
#[async_trait]
pub trait OwnerRepository: Send + Sync {
    /// Load the owner with its full entity collection
    async fn find_by_id(&self, id: OwnerId) -> Result<Option<Owner>, RepositoryError>;

    /// Persist one namespaced property on an embedded entity
    async fn set_property(
        &self,
        owner_id: OwnerId,
        entity_id: EntityId,
        namespace: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), RepositoryError>;

    /// Create embedded entities in one batch; returns their assigned ids
    async fn create_entities(
        &self,
        owner_id: OwnerId,
        definitions: Vec<NewEntity>,
    ) -> Result<Vec<EntityId>, RepositoryError>;

    /// Delete embedded entities in one batch
    async fn delete_entities(&self, owner_id: OwnerId, ids: &[EntityId]) -> Result<(), RepositoryError>;
}

/// Explicit registry of the owners a session knows about
#[async_trait]
pub trait OwnerRegistry: Send + Sync {
    async fn owner_ids(&self) -> Result<Vec<OwnerId>, RepositoryError>;
}

/// Repository errors (persistence failures)
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Conflicting write: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for RepositoryError {
    fn from(err: serde_yaml::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for RepositoryError {
    fn from(err: std::io::Error) -> Self {
        RepositoryError::Storage(err.to_string())
    }
}
