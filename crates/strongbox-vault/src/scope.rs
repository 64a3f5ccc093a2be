//! Scoped access.
//!
//! A [`ScopedVault`] binds a namespace and a default policy to a
//! [`SecretVault`] so call sites pass only an account name. Options are
//! always explicit: a scope is built from [`ScopeOptions`] or from the
//! `defaults` section of a [`strongbox_core::VaultConfig`], never from
//! process-wide state.

use serde::de::DeserializeOwned;
use serde::Serialize;
use strongbox_core::config::ScopeDefaults;
use strongbox_core::{Accessibility, SecretBytes, SecretString};

use crate::codec::{self, JsonSerializer, Serializer};
use crate::error::{Result, VaultError};
use crate::store::SecretVault;
use crate::types::{LookupKey, NewSecret, SecretClass};

/// Namespace and policy applied by a [`ScopedVault`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeOptions {
    pub namespace: String,
    pub access_group: Option<String>,
    pub synchronizable: bool,
    pub accessibility: Accessibility,
}

impl ScopeOptions {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    pub fn access_group(mut self, group: impl Into<String>) -> Self {
        self.access_group = Some(group.into());
        self
    }

    pub fn synchronizable(mut self, enabled: bool) -> Self {
        self.synchronizable = enabled;
        self
    }

    pub fn accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = accessibility;
        self
    }
}

impl From<&ScopeDefaults> for ScopeOptions {
    fn from(defaults: &ScopeDefaults) -> Self {
        Self {
            namespace: defaults.namespace.clone(),
            access_group: defaults.access_group.clone(),
            synchronizable: defaults.synchronizable,
            accessibility: defaults.accessibility,
        }
    }
}

/// A vault handle bound to one namespace.
pub struct ScopedVault<'a, S = JsonSerializer> {
    vault: &'a SecretVault,
    options: ScopeOptions,
    serializer: S,
}

impl<'a> ScopedVault<'a> {
    pub(crate) fn new(vault: &'a SecretVault, options: ScopeOptions) -> Self {
        Self {
            vault,
            options,
            serializer: JsonSerializer,
        }
    }
}

impl<'a, S: Serializer> ScopedVault<'a, S> {
    /// Swap the serializer used by the object accessors.
    pub fn with_serializer<T: Serializer>(self, serializer: T) -> ScopedVault<'a, T> {
        ScopedVault {
            vault: self.vault,
            options: self.options,
            serializer,
        }
    }

    pub fn options(&self) -> &ScopeOptions {
        &self.options
    }

    /// Generic password key for `account` in this scope.
    pub fn key(&self, account: &str) -> LookupKey {
        LookupKey::generic(&self.options.namespace, account)
    }

    /// Internet password key for `server`/`account` in this scope.
    pub fn internet_key(&self, server: &str, account: &str) -> LookupKey {
        LookupKey::internet(&self.options.namespace, server, account)
    }

    fn new_secret(&self, key: LookupKey, payload: SecretBytes) -> NewSecret {
        let mut secret = NewSecret::new(key, payload)
            .accessibility(self.options.accessibility)
            .synchronizable(self.options.synchronizable);
        secret.access_group = self.options.access_group.clone();
        secret
    }

    // ------------------------------------------------------------------
    // Raw bytes
    // ------------------------------------------------------------------

    pub async fn set_bytes(&self, account: &str, value: impl Into<SecretBytes>) -> Result<()> {
        let secret = self.new_secret(self.key(account), value.into());
        self.vault.add(secret).await
    }

    pub async fn get_bytes(&self, account: &str) -> Result<SecretBytes> {
        Ok(self.vault.get(&self.key(account)).await?.payload)
    }

    pub async fn update_bytes(&self, account: &str, value: impl Into<SecretBytes>) -> Result<()> {
        self.vault.update(&self.key(account), value).await
    }

    // ------------------------------------------------------------------
    // Text
    // ------------------------------------------------------------------

    pub async fn set_string(&self, account: &str, value: &str) -> Result<()> {
        self.set_bytes(account, codec::encode_text(value)).await
    }

    /// `Codec` when the stored bytes are not UTF-8.
    pub async fn get_string(&self, account: &str) -> Result<SecretString> {
        codec::decode_text(self.get_bytes(account).await?)
    }

    pub async fn update_string(&self, account: &str, value: &str) -> Result<()> {
        self.update_bytes(account, codec::encode_text(value)).await
    }

    // ------------------------------------------------------------------
    // Flags
    // ------------------------------------------------------------------

    pub async fn set_bool(&self, account: &str, value: bool) -> Result<()> {
        self.set_bytes(account, codec::encode_bool(value)).await
    }

    /// `false` unless a readable entry's first byte is `1`.
    pub async fn get_bool(&self, account: &str) -> bool {
        self.vault.get_bool(&self.key(account)).await
    }

    pub async fn update_bool(&self, account: &str, value: bool) -> Result<()> {
        self.update_bytes(account, codec::encode_bool(value)).await
    }

    // ------------------------------------------------------------------
    // Structured values
    // ------------------------------------------------------------------

    pub async fn set_object<T: Serialize + ?Sized>(&self, account: &str, value: &T) -> Result<()> {
        let payload = self.serializer.encode(value)?;
        self.set_bytes(account, payload).await
    }

    /// `None` when the entry is absent or does not decode as `T`.
    pub async fn get_object<T: DeserializeOwned>(&self, account: &str) -> Result<Option<T>> {
        match self.get_bytes(account).await {
            Ok(payload) => Ok(self.serializer.decode(payload.expose_secret())),
            Err(VaultError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn update_object<T: Serialize + ?Sized>(&self, account: &str, value: &T) -> Result<()> {
        let payload = self.serializer.encode(value)?;
        self.update_bytes(account, payload).await
    }

    // ------------------------------------------------------------------
    // Internet passwords
    // ------------------------------------------------------------------

    pub async fn set_internet_password(
        &self,
        server: &str,
        account: &str,
        password: &str,
    ) -> Result<()> {
        let secret = self.new_secret(self.internet_key(server, account), codec::encode_text(password));
        self.vault.add(secret).await
    }

    pub async fn get_internet_password(&self, server: &str, account: &str) -> Result<SecretString> {
        let entry = self.vault.get(&self.internet_key(server, account)).await?;
        codec::decode_text(entry.payload)
    }

    pub async fn update_internet_password(
        &self,
        server: &str,
        account: &str,
        password: &str,
    ) -> Result<()> {
        self.vault
            .update(&self.internet_key(server, account), codec::encode_text(password))
            .await
    }

    pub async fn delete_internet_password(&self, server: &str, account: &str) -> Result<()> {
        self.vault.delete(&self.internet_key(server, account)).await
    }

    // ------------------------------------------------------------------
    // Namespace-wide
    // ------------------------------------------------------------------

    pub async fn contains(&self, account: &str) -> Result<bool> {
        self.vault.contains(&self.key(account)).await
    }

    pub async fn delete(&self, account: &str) -> Result<()> {
        self.vault.delete(&self.key(account)).await
    }

    /// Every entry of `class` in this scope.
    pub async fn list(&self, class: SecretClass) -> Result<Vec<(LookupKey, SecretBytes)>> {
        self.vault.list(&self.options.namespace, class).await
    }

    /// Every entry in this scope, both classes.
    pub async fn clear(&self) -> Result<()> {
        self.vault.clear(&self.options.namespace).await
    }
}
