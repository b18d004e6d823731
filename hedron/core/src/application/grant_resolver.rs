// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Grant Resolver
//!
//! Computes the desired grant set of an owner: every occupied slot of every
//! container is resolved to its module, and the modules' grant templates
//! are unioned. A reference that no longer resolves contributes nothing.

use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::domain::container::ContainerSpec;
use crate::domain::entity::EntityRef;
use crate::domain::grant::DesiredGrants;
use crate::domain::module::Module;
use crate::domain::owner::Owner;
use crate::domain::repository::EntityResolver;

pub struct GrantResolver {
    resolver: Arc<dyn EntityResolver>,
    spec: ContainerSpec,
}

impl GrantResolver {
    pub fn new(resolver: Arc<dyn EntityResolver>, spec: ContainerSpec) -> Self {
        Self { resolver, spec }
    }

    /// Module references equipped anywhere on the owner, deduplicated
    pub fn equipped_modules(&self, owner: &Owner) -> BTreeSet<EntityRef> {
        owner
            .containers(&self.spec)
            .flat_map(|container| {
                self.spec
                    .slots_of(container)
                    .occupied()
                    .map(|(_, module)| module.clone())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Desired effect and action template sets. Identical for identical
    /// container and module state.
    pub async fn resolve_desired(&self, owner: &Owner) -> DesiredGrants {
        let references = self.equipped_modules(owner);
        let resolved = join_all(references.iter().map(|r| self.resolver.resolve(r))).await;

        let mut desired = DesiredGrants::default();
        for (reference, entity) in references.into_iter().zip(resolved) {
            match entity {
                Some(entity) => {
                    let module = Module::from_entity(reference, &entity);
                    desired.extend(&module.grants);
                }
                None => {
                    debug!(owner_id = %owner.id, module = %reference, "Equipped module did not resolve; skipping");
                }
            }
        }
        desired
    }
}
