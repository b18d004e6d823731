// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Namespaced Property Schema
//!
//! Entities carry a free-form property bag (`namespace -> key -> JSON`), the
//! way host documents carry flags. Nothing in the engine reads that bag
//! directly: every access goes through a [`PropertyKey`] that fixes the
//! namespace, the key and the Rust type, so values are validated on read
//! instead of trusted.
//!
//! The [`hedron`] module is the complete schema of the `hedron` namespace.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use thiserror::Error;
use tracing::warn;

/// Typed handle on one `(namespace, key)` slot of a property bag
#[derive(Debug)]
pub struct PropertyKey<T> {
    pub namespace: &'static str,
    pub key: &'static str,
    _value: PhantomData<fn() -> T>,
}

impl<T> PropertyKey<T> {
    pub const fn new(namespace: &'static str, key: &'static str) -> Self {
        Self {
            namespace,
            key,
            _value: PhantomData,
        }
    }

    /// Dotted change path as reported by hosts (`flags.hedron.slots`)
    pub fn change_path(&self) -> String {
        format!("flags.{}.{}", self.namespace, self.key)
    }
}

#[derive(Debug, Error)]
pub enum PropertyError {
    #[error("Invalid value for {namespace}.{key}: {reason}")]
    Invalid {
        namespace: &'static str,
        key: &'static str,
        reason: String,
    },

    #[error("Cannot serialize {namespace}.{key}: {reason}")]
    Serialization {
        namespace: &'static str,
        key: &'static str,
        reason: String,
    },
}

/// Namespaced property bag
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Flags(BTreeMap<String, serde_json::Map<String, serde_json::Value>>);

impl Flags {
    pub fn is_empty(&self) -> bool {
        self.0.values().all(|ns| ns.is_empty())
    }

    pub fn contains<T>(&self, key: &PropertyKey<T>) -> bool {
        self.raw(key.namespace, key.key)
            .is_some_and(|value| !value.is_null())
    }

    /// Untyped access, for hosts that only need to forward values
    pub fn raw(&self, namespace: &str, key: &str) -> Option<&serde_json::Value> {
        self.0.get(namespace).and_then(|ns| ns.get(key))
    }

    /// A missing key and an explicit `null` both read as `None`
    pub fn get<T: DeserializeOwned>(&self, key: &PropertyKey<T>) -> Result<Option<T>, PropertyError> {
        match self.raw(key.namespace, key.key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| PropertyError::Invalid {
                    namespace: key.namespace,
                    key: key.key,
                    reason: e.to_string(),
                }),
        }
    }

    /// Read with fallback: malformed values are logged and replaced by the default
    pub fn get_or_default<T: DeserializeOwned + Default>(&self, key: &PropertyKey<T>) -> T {
        match self.get(key) {
            Ok(value) => value.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Ignoring malformed property");
                T::default()
            }
        }
    }

    pub fn set<T: Serialize>(&mut self, key: &PropertyKey<T>, value: &T) -> Result<(), PropertyError> {
        let value = serde_json::to_value(value).map_err(|e| PropertyError::Serialization {
            namespace: key.namespace,
            key: key.key,
            reason: e.to_string(),
        })?;
        self.set_raw(key.namespace, key.key, value);
        Ok(())
    }

    pub fn set_raw(&mut self, namespace: &str, key: &str, value: serde_json::Value) {
        self.0
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn unset<T>(&mut self, key: &PropertyKey<T>) {
        if let Some(ns) = self.0.get_mut(key.namespace) {
            ns.remove(key.key);
        }
    }
}

/// Schema of the `hedron` namespace
pub mod hedron {
    use super::PropertyKey;
    use crate::domain::container::Slots;
    use crate::domain::entity::EntityRef;
    use crate::domain::grant::GrantKind;
    use crate::domain::module::{GrantTemplates, ModuleCategory};

    pub const NAMESPACE: &str = "hedron";

    /// Slot assignments of a container
    pub const SLOTS: PropertyKey<Slots> = PropertyKey::new(NAMESPACE, "slots");

    /// Explicit container marker, for containers without the canonical slug
    pub const IS_CONTAINER: PropertyKey<bool> = PropertyKey::new(NAMESPACE, "isHedronInterface");

    /// Module category
    pub const MODULE_TYPE: PropertyKey<ModuleCategory> = PropertyKey::new(NAMESPACE, "type");

    /// Grant templates declared by a module
    pub const GRANT: PropertyKey<GrantTemplates> = PropertyKey::new(NAMESPACE, "grant");

    /// Template a granted entity was materialized from
    pub const SOURCE: PropertyKey<EntityRef> = PropertyKey::new(NAMESPACE, "sourceUuid");

    /// Kind of the grant a granted entity was materialized for
    pub const GRANT_KIND: PropertyKey<GrantKind> = PropertyKey::new(NAMESPACE, "grantKind");

    /// Change paths that alter what an owned entity contributes to reconciliation
    pub fn watched_paths() -> [String; 4] {
        [
            SLOTS.change_path(),
            IS_CONTAINER.change_path(),
            GRANT.change_path(),
            MODULE_TYPE.change_path(),
        ]
    }
}
