//! Configuration loading and persistence.

use super::{BackendKind, VaultConfig};
use crate::error::ConfigError;
use crate::paths;
use std::fs;
use std::path::{Path, PathBuf};

impl VaultConfig {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = paths::config_file()?;
        Self::load(&path)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Json5(e.to_string()))
    }

    /// Save configuration to the default path.
    pub fn save_default(&self) -> Result<(), ConfigError> {
        let path = paths::config_file()?;
        self.save(&path)
    }

    /// Save configuration to a file path.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_json5()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Serialize to JSON5 string.
    pub fn to_json5(&self) -> Result<String, ConfigError> {
        // json5 doesn't have a serializer, so we use serde_json with pretty print
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Resolve the directory used by the file backend.
    pub fn storage_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.storage.path {
            Some(path) => Ok(path.clone()),
            None => paths::vault_dir(),
        }
    }

    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        // 1. Master key variable name
        if self.master_key_env.trim().is_empty() {
            errors.push("master_key_env must not be empty".to_string());
        }

        // 2. File backend needs a usable path when one is given
        if self.storage.backend == BackendKind::File {
            if let Some(path) = &self.storage.path {
                if path.as_os_str().is_empty() {
                    errors.push("storage.path must not be empty for the file backend".to_string());
                }
            }
        }

        // 3. Device-local levels cannot be replicated or shared
        let defaults = &self.defaults;
        if defaults.accessibility.is_device_only() {
            if defaults.synchronizable {
                errors.push(format!(
                    "defaults.accessibility '{}' is device-only and cannot be synchronizable",
                    defaults.accessibility
                ));
            }
            if defaults.access_group.is_some() {
                errors.push(format!(
                    "defaults.accessibility '{}' is device-only and cannot use an access group",
                    defaults.accessibility
                ));
            }
        }

        // 4. Access group must be non-blank when present
        if let Some(group) = &defaults.access_group {
            if group.trim().is_empty() {
                errors.push("defaults.access_group must not be blank".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }
}
