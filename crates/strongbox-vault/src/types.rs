//! Core types for the vault.
//!
//! Lookup keys, storage slots, access policies and the entry shapes that
//! flow in and out of [`crate::SecretVault`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strongbox_core::{Accessibility, SecretBytes};

use crate::error::{Result, VaultError};

/// Maximum allowed length for any lookup key component.
pub const MAX_COMPONENT_LEN: usize = 256;

/// Kind of secret, which decides the shape of its lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecretClass {
    /// Keyed by `{namespace, account}`.
    GenericPassword,
    /// Web credential keyed by `{namespace, server, account}`.
    InternetPassword,
}

impl SecretClass {
    /// Stable name, matching the serialized form.
    pub const fn as_str(self) -> &'static str {
        match self {
            SecretClass::GenericPassword => "genericPassword",
            SecretClass::InternetPassword => "internetPassword",
        }
    }
}

impl fmt::Display for SecretClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite key identifying one entry.
///
/// Unique among live entries of a namespace. Ordering is namespace, class,
/// server, account, which gives enumeration a stable order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LookupKey {
    namespace: String,
    class: SecretClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    server: Option<String>,
    account: String,
}

impl LookupKey {
    /// Key for a generic password: `{namespace, account}`.
    pub fn generic(namespace: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            class: SecretClass::GenericPassword,
            server: None,
            account: account.into(),
        }
    }

    /// Key for a network credential: `{namespace, server, account}`.
    pub fn internet(
        namespace: impl Into<String>,
        server: impl Into<String>,
        account: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            class: SecretClass::InternetPassword,
            server: Some(server.into()),
            account: account.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn class(&self) -> SecretClass {
        self.class
    }

    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Check every component and the class/server pairing.
    ///
    /// The namespace may be empty (the unprefixed namespace); server and
    /// account may not.
    pub fn validate(&self) -> Result<()> {
        validate_component("namespace", &self.namespace, true)?;
        validate_component("account", &self.account, false)?;
        match (self.class, &self.server) {
            (SecretClass::GenericPassword, None) => Ok(()),
            (SecretClass::InternetPassword, Some(server)) => {
                validate_component("server", server, false)
            }
            (SecretClass::GenericPassword, Some(_)) => Err(VaultError::InvalidKey(
                "generic passwords do not carry a server".to_string(),
            )),
            (SecretClass::InternetPassword, None) => Err(VaultError::InvalidKey(
                "internet passwords require a server".to_string(),
            )),
        }
    }

    /// The storage slot this key always maps to.
    pub fn slot_id(&self) -> SlotId {
        let mut hasher = Sha256::new();
        hasher.update(self.class.as_str().as_bytes());
        hasher.update([0u8]);
        if let Some(server) = &self.server {
            hasher.update(server.as_bytes());
        }
        hasher.update([0u8]);
        hasher.update(self.account.as_bytes());
        SlotId {
            namespace: self.namespace.clone(),
            digest: hex::encode(hasher.finalize()),
        }
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.server {
            Some(server) => write!(f, "{}/{}/{}", self.namespace, server, self.account),
            None => write!(f, "{}/{}", self.namespace, self.account),
        }
    }
}

/// Check a bare namespace as used by namespace-wide operations.
pub fn validate_namespace(namespace: &str) -> Result<()> {
    validate_component("namespace", namespace, true)
}

fn validate_component(field: &str, value: &str, allow_empty: bool) -> Result<()> {
    if value.is_empty() && !allow_empty {
        return Err(VaultError::InvalidKey(format!("{field} must not be empty")));
    }
    if value.len() > MAX_COMPONENT_LEN {
        return Err(VaultError::InvalidKey(format!(
            "{field} exceeds maximum length of {MAX_COMPONENT_LEN} bytes"
        )));
    }
    if value.chars().any(|c| c.is_ascii_control()) {
        return Err(VaultError::InvalidKey(format!(
            "{field} contains control characters"
        )));
    }
    Ok(())
}

/// Identifier of a storage slot in a [`crate::SecretBackend`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId {
    namespace: String,
    digest: String,
}

impl SlotId {
    /// Rebuild a slot id from parts reported by a backend.
    pub fn new(namespace: impl Into<String>, digest: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            digest: digest.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Hex SHA-256 of the key's class, server and account.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.namespace, self.digest)
    }
}

/// Accessibility plus optional sharing group, bound to an entry at creation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessPolicy {
    pub accessibility: Accessibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_group: Option<String>,
}

impl AccessPolicy {
    pub fn new(accessibility: Accessibility) -> Self {
        Self {
            accessibility,
            access_group: None,
        }
    }

    pub fn with_access_group(mut self, group: impl Into<String>) -> Self {
        self.access_group = Some(group.into());
        self
    }
}

/// Parameters for adding a secret.
#[derive(Debug)]
pub struct NewSecret {
    pub key: LookupKey,
    pub payload: SecretBytes,
    /// `None` falls back to [`Accessibility::most_restrictive`].
    pub accessibility: Option<Accessibility>,
    pub access_group: Option<String>,
    pub sync_enabled: bool,
}

impl NewSecret {
    pub fn new(key: LookupKey, payload: impl Into<SecretBytes>) -> Self {
        Self {
            key,
            payload: payload.into(),
            accessibility: None,
            access_group: None,
            sync_enabled: false,
        }
    }

    pub fn accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = Some(accessibility);
        self
    }

    pub fn access_group(mut self, group: impl Into<String>) -> Self {
        self.access_group = Some(group.into());
        self
    }

    pub fn synchronizable(mut self, enabled: bool) -> Self {
        self.sync_enabled = enabled;
        self
    }

    /// The policy this secret will be stored under.
    pub fn policy(&self) -> AccessPolicy {
        AccessPolicy {
            accessibility: self.accessibility.unwrap_or_else(Accessibility::most_restrictive),
            access_group: self.access_group.clone(),
        }
    }
}

/// A decrypted entry handed to the caller.
///
/// The payload is zeroed when the entry is dropped.
#[derive(Debug, Clone)]
pub struct SecretEntry {
    pub lookup_key: LookupKey,
    pub payload: SecretBytes,
    pub access_policy: AccessPolicy,
    pub sync_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
