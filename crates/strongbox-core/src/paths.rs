//! Path resolution utilities.

use crate::error::ConfigError;
use std::path::PathBuf;

/// Get the Strongbox base directory (~/.strongbox).
pub fn base_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or_else(|| {
        ConfigError::Validation("Could not determine home directory".to_string())
    })?;
    Ok(home.join(".strongbox"))
}

/// Get the main config file path (~/.strongbox/strongbox.json5).
pub fn config_file() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("strongbox.json5"))
}

/// Get the default vault storage directory (~/.strongbox/vault).
pub fn vault_dir() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("vault"))
}
