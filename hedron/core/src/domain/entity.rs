// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::properties::{Flags, PropertyError, PropertyKey};

// ============================================================================
// Value Objects
// ============================================================================

/// Unique identifier for an owner aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(pub Uuid);

impl OwnerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an entity embedded in an owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque, externally resolvable reference to an entity.
///
/// Library entities use whatever path the host assigns them
/// (`Compendium.embers.Item.k3`). Entities embedded in an owner use
/// `Owner.<owner-id>.Entity.<entity-id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityRef(String);

const OWNED_PREFIX: &str = "Owner.";
const OWNED_SEPARATOR: &str = ".Entity.";

impl EntityRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Reference to an entity embedded in an owner
    pub fn owned(owner_id: OwnerId, entity_id: EntityId) -> Self {
        Self(format!("{OWNED_PREFIX}{owner_id}{OWNED_SEPARATOR}{entity_id}"))
    }

    /// Split an owned reference back into its owner and entity ids.
    /// Returns `None` for library references or malformed ids.
    pub fn as_owned(&self) -> Option<(OwnerId, EntityId)> {
        let rest = self.0.strip_prefix(OWNED_PREFIX)?;
        let (owner, entity) = rest.split_once(OWNED_SEPARATOR)?;
        Some((OwnerId::from_string(owner).ok()?, EntityId::from_string(entity).ok()?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A persisted entity: a container, a module, a granted entity, or anything
/// else the host keeps on an owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Host entity type (e.g. "equipment", "effect", "action")
    #[serde(rename = "type")]
    pub entity_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,

    #[serde(default, skip_serializing_if = "Flags::is_empty")]
    pub flags: Flags,

    /// Opaque content payload, copied verbatim into grant snapshots
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub system: serde_json::Value,
}

impl Entity {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            name: None,
            entity_type: entity_type.into(),
            slug: None,
            flags: Flags::default(),
            system: serde_json::Value::Null,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_system(mut self, system: serde_json::Value) -> Self {
        self.system = system;
        self
    }

    /// Builder-style typed property write
    pub fn with_property<T: Serialize>(
        mut self,
        key: &PropertyKey<T>,
        value: &T,
    ) -> Result<Self, PropertyError> {
        self.flags.set(key, value)?;
        Ok(self)
    }

    /// Typed, validated property read
    pub fn property<T: serde::de::DeserializeOwned>(
        &self,
        key: &PropertyKey<T>,
    ) -> Result<Option<T>, PropertyError> {
        self.flags.get(key)
    }

    /// Strip identity, producing a definition that can be created elsewhere
    pub fn to_new_entity(&self) -> NewEntity {
        NewEntity {
            name: self.name.clone(),
            entity_type: self.entity_type.clone(),
            slug: self.slug.clone(),
            flags: self.flags.clone(),
            system: self.system.clone(),
        }
    }
}

/// Definition of an entity that does not exist yet; the repository assigns
/// its identity on creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntity {
    pub name: Option<String>,
    pub entity_type: String,
    pub slug: Option<String>,
    pub flags: Flags,
    pub system: serde_json::Value,
}

impl NewEntity {
    pub fn into_entity(self, id: EntityId) -> Entity {
        Entity {
            id,
            name: self.name,
            entity_type: self.entity_type,
            slug: self.slug,
            flags: self.flags,
            system: self.system,
        }
    }
}
