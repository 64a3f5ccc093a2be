//! Error types for vault operations.

use thiserror::Error;

use crate::backend::BackendError;

/// Errors that can occur during vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Entry already exists: {0}")]
    DuplicateEntry(String),

    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Corrupted entry {key}: {reason}")]
    CorruptedEntry { key: String, reason: String },

    #[error("Policy conflict: {0}")]
    PolicyConflict(String),

    #[error("Access denied: {key} requires {requirement}")]
    AccessDenied { key: String, requirement: String },

    #[error("Backing store unavailable: {0}")]
    BackingStoreUnavailable(#[from] BackendError),

    #[error("Invalid lookup key: {0}")]
    InvalidKey(String),

    #[error("Payload must not be empty")]
    EmptyPayload,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Payload encoding error: {0}")]
    Codec(String),

    #[error("Keychain error: {0}")]
    Keychain(String),

    #[error("Configuration error: {0}")]
    Config(#[from] strongbox_core::ConfigError),
}

impl VaultError {
    pub(crate) fn corrupted(key: impl ToString, reason: impl ToString) -> Self {
        Self::CorruptedEntry {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Convenience result alias for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
