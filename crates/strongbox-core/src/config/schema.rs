//! Configuration schema definitions.

use crate::types::Accessibility;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable consulted for a hex-encoded master key by default.
pub const DEFAULT_MASTER_KEY_ENV: &str = "STRONGBOX_MASTER_KEY";

/// Main Strongbox configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VaultConfig {
    /// Where encrypted slots are persisted.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Environment variable holding the hex-encoded master key.
    #[serde(default = "default_master_key_env")]
    pub master_key_env: String,

    /// Values used to build an explicit scope for callers that want one.
    #[serde(default)]
    pub defaults: ScopeDefaults,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            master_key_env: default_master_key_env(),
            defaults: ScopeDefaults::default(),
        }
    }
}

fn default_master_key_env() -> String {
    DEFAULT_MASTER_KEY_ENV.to_string()
}

/// Storage section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Backend kind.
    #[serde(default)]
    pub backend: BackendKind,

    /// Root directory for the file backend (defaults to `~/.strongbox/vault`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Persistence backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Process-local, nothing survives a restart.
    Memory,
    /// One encrypted file per slot.
    #[default]
    File,
}

/// Default scope values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScopeDefaults {
    /// Namespace (key prefix) partitioning lookup keys.
    #[serde(default)]
    pub namespace: String,

    /// Sharing group identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_group: Option<String>,

    /// Tag new entries for cross-device replication.
    #[serde(default)]
    pub synchronizable: bool,

    /// Accessibility for new entries.
    #[serde(default)]
    pub accessibility: Accessibility,
}
