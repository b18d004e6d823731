// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::entity::{Entity, EntityRef};
use crate::domain::owner::Owner;
use crate::domain::repository::RepositoryError;

/// Serializable world: every owner plus the referenceable library
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    #[serde(default)]
    pub owners: Vec<Owner>,

    #[serde(default)]
    pub library: Vec<LibraryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub reference: EntityRef,
    pub entity: Entity,
}

impl WorldSnapshot {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, RepositoryError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> Result<(), RepositoryError> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::grant::GrantKey;
    use crate::domain::module::ModuleCategory;
    use crate::domain::properties::hedron;

    const WORLD: &str = r#"
owners:
  - id: 6f1c2f4e-8a43-4a51-9a4e-0a4f2f1d9b10
    name: Valeros
    entities:
      - id: 0b7a1e7c-2f7d-4d0c-8a49-3b5c1f7e2a11
        type: equipment
        slug: hedron-interface
        flags:
          hedron:
            slots:
              core: Compendium.embers.Item.core1
              fragments: [null, null]
      - id: 1c2d3e4f-5a6b-4c7d-8e9f-0a1b2c3d4e5f
        type: effect
        name: Old Grant
        flags:
          hedron:
            sourceUuid: Compendium.fx.Item.e1
            grantKind: effect
library:
  - reference: Compendium.embers.Item.core1
    entity:
      id: 2d3e4f5a-6b7c-4d8e-9f0a-1b2c3d4e5f60
      type: equipment
      name: Core Ember
      flags:
        hedron:
          type: core
          grant:
            effects: [Compendium.fx.Item.e1]
            actions: [Compendium.act.Item.a1]
"#;

    #[test]
    fn test_parses_host_flag_layout() {
        let snapshot = WorldSnapshot::from_yaml_str(WORLD).unwrap();
        let owner = &snapshot.owners[0];
        assert_eq!(owner.entities.len(), 2);

        let granted: Vec<GrantKey> = owner.granted().map(|g| g.key).collect();
        assert_eq!(granted, vec![GrantKey::effect("Compendium.fx.Item.e1")]);

        let module = &snapshot.library[0].entity;
        assert_eq!(
            module.property(&hedron::MODULE_TYPE).unwrap(),
            Some(ModuleCategory::Core)
        );
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.yaml");

        let snapshot = WorldSnapshot::from_yaml_str(WORLD).unwrap();
        snapshot.to_yaml_file(&path).unwrap();
        assert_eq!(WorldSnapshot::from_yaml_file(&path).unwrap(), snapshot);
    }

    #[test]
    fn test_malformed_world_is_a_serialization_error() {
        let err = WorldSnapshot::from_yaml_str("owners: 7").unwrap_err();
        assert!(matches!(err, RepositoryError::Serialization(_)));
    }
}
