// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Engine Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) covering:
// - Container recognition (entity type + slug) and slot layout
// - Sync scheduling (full-sync concurrency, event bus capacity)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::domain::container::ContainerSpec;

pub const API_VERSION: &str = "hedron.dev/v1";
pub const KIND: &str = "HedronConfig";

/// Top-level configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedronConfig {
    /// API version (must be "hedron.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "HedronConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: HedronConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HedronConfigSpec {
    #[serde(default)]
    pub container: ContainerConfig,

    #[serde(default)]
    pub slots: SlotLayoutConfig,

    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Host entity type of containers
    #[serde(default = "default_container_type")]
    pub entity_type: String,

    /// Canonical container slug; flagged entities qualify regardless
    #[serde(default = "default_container_slug")]
    pub slug: String,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            entity_type: default_container_type(),
            slug: default_container_slug(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotLayoutConfig {
    /// Number of fragment slots next to the single core slot
    #[serde(default = "default_fragment_count")]
    pub fragment_count: usize,
}

impl Default for SlotLayoutConfig {
    fn default() -> Self {
        Self {
            fragment_count: default_fragment_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Owners reconciled in parallel during a full sync (1 = sequential)
    #[serde(default = "default_sync_all_concurrency")]
    pub sync_all_concurrency: usize,

    /// Buffered events before slow subscribers start lagging
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_all_concurrency: default_sync_all_concurrency(),
            event_bus_capacity: default_event_bus_capacity(),
        }
    }
}

fn default_container_type() -> String {
    "equipment".to_string()
}

fn default_container_slug() -> String {
    "hedron-interface".to_string()
}

fn default_fragment_count() -> usize {
    2
}

fn default_sync_all_concurrency() -> usize {
    1
}

fn default_event_bus_capacity() -> usize {
    1000
}

impl Default for HedronConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "default".to_string(),
                labels: None,
            },
            spec: HedronConfigSpec::default(),
        }
    }
}

impl HedronConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. HEDRON_CONFIG_PATH environment variable
    /// 2. ./hedron-config.yaml (working directory)
    /// 3. ~/.hedron/config.yaml (user home)
    /// 4. /etc/hedron/config.yaml (system, Unix) or C:\ProgramData\Hedron\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("HEDRON_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./hedron-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".hedron").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/hedron/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Hedron\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::debug!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Some(value) = env_usize("HEDRON_SYNC_CONCURRENCY") {
            tracing::info!("Environment override: HEDRON_SYNC_CONCURRENCY={}", value);
            self.spec.sync.sync_all_concurrency = value;
        }
        if let Some(value) = env_usize("HEDRON_FRAGMENT_SLOTS") {
            tracing::info!("Environment override: HEDRON_FRAGMENT_SLOTS={}", value);
            self.spec.slots.fragment_count = value;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.container.entity_type.is_empty() {
            anyhow::bail!("spec.container.entity_type cannot be empty");
        }

        if self.spec.container.slug.is_empty() {
            anyhow::bail!("spec.container.slug cannot be empty");
        }

        if self.spec.sync.sync_all_concurrency == 0 {
            anyhow::bail!("spec.sync.sync_all_concurrency must be at least 1");
        }

        if self.spec.sync.event_bus_capacity == 0 {
            anyhow::bail!("spec.sync.event_bus_capacity must be at least 1");
        }

        Ok(())
    }

    /// Container recognition and layout derived from this configuration
    pub fn container_spec(&self) -> ContainerSpec {
        ContainerSpec {
            entity_type: self.spec.container.entity_type.clone(),
            slug: self.spec.container.slug.clone(),
            fragment_count: self.spec.slots.fragment_count,
        }
    }
}

fn env_usize(name: &str) -> Option<usize> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Invalid value for {}: '{}'. Expected an integer. Ignoring.", name, raw);
            None
        }
    }
}
