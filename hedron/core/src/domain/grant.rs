// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain::entity::{Entity, EntityId, EntityRef, NewEntity};
use crate::domain::module::GrantTemplates;
use crate::domain::properties::{hedron, PropertyError};

/// Kind of derived entity a grant template materializes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantKind {
    Effect,
    Action,
}

impl GrantKind {
    /// Name given to a snapshot whose template has none
    pub fn fallback_name(&self) -> &'static str {
        match self {
            Self::Effect => "Hedron Effect",
            Self::Action => "Hedron Action",
        }
    }
}

impl std::fmt::Display for GrantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Effect => f.write_str("effect"),
            Self::Action => f.write_str("action"),
        }
    }
}

/// Identity of a grant: the template it comes from and its kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GrantKey {
    pub source: EntityRef,
    pub kind: GrantKind,
}

impl GrantKey {
    pub fn new(source: EntityRef, kind: GrantKind) -> Self {
        Self { source, kind }
    }

    pub fn effect(source: impl Into<EntityRef>) -> Self {
        Self::new(source.into(), GrantKind::Effect)
    }

    pub fn action(source: impl Into<EntityRef>) -> Self {
        Self::new(source.into(), GrantKind::Action)
    }
}

impl std::fmt::Display for GrantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.source, self.kind)
    }
}

/// Union of grant templates across every equipped module of an owner
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredGrants {
    pub effects: BTreeSet<EntityRef>,
    pub actions: BTreeSet<EntityRef>,
}

impl DesiredGrants {
    pub fn extend(&mut self, templates: &GrantTemplates) {
        self.effects.extend(templates.effects.iter().cloned());
        self.actions.extend(templates.actions.iter().cloned());
    }

    pub fn keys(&self) -> BTreeSet<GrantKey> {
        self.effects
            .iter()
            .map(|source| GrantKey::new(source.clone(), GrantKind::Effect))
            .chain(
                self.actions
                    .iter()
                    .map(|source| GrantKey::new(source.clone(), GrantKind::Action)),
            )
            .collect()
    }

    pub fn len(&self) -> usize {
        self.effects.len() + self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An entity materialized on an owner because of a grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantedEntity {
    pub id: EntityId,
    pub key: GrantKey,
}

impl GrantedEntity {
    /// Only entities carrying both the source and the kind tag count as
    /// granted; anything else is invisible to reconciliation.
    pub fn from_entity(entity: &Entity) -> Option<Self> {
        let source = entity.flags.get(&hedron::SOURCE).ok().flatten()?;
        let kind = entity.flags.get(&hedron::GRANT_KIND).ok().flatten()?;
        Some(Self {
            id: entity.id,
            key: GrantKey::new(source, kind),
        })
    }

    /// Content snapshot of `template`, tagged with `key`. The snapshot is
    /// taken once; later edits to the template do not reach it.
    pub fn snapshot(template: &Entity, key: &GrantKey) -> Result<NewEntity, PropertyError> {
        let mut definition = template.to_new_entity();
        definition.flags.set(&hedron::SOURCE, &key.source)?;
        definition.flags.set(&hedron::GRANT_KIND, &key.kind)?;
        if definition.name.is_none() {
            definition.name = Some(key.kind.fallback_name().to_string());
        }
        Ok(definition)
    }
}
