//! The secret vault.
//!
//! [`SecretVault`] orchestrates every operation: it validates keys, asks the
//! [`PolicyEvaluator`] for permission, seals entries through the codec and
//! cipher, and persists them through a [`SecretBackend`].
//!
//! Each namespace has its own lock around a lazily built [`KeyIndex`].
//! Mutations (`add`, `update`, `rewrap`, `delete`, `clear`) hold the write
//! side for their whole duration, so writers to the same namespace serialize
//! and each write is fully applied. Reads share the read side and therefore
//! never observe a write in flight.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use strongbox_core::config::BackendKind;
use strongbox_core::{SecretBytes, VaultConfig};
use tokio::sync::{OwnedRwLockMappedWriteGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::backend::{FileBackend, MemoryBackend, SecretBackend};
use crate::cipher::{self, AesGcmCipher, Cipher};
use crate::codec;
use crate::error::{Result, VaultError};
use crate::index::KeyIndex;
use crate::keychain;
use crate::policy::{DeviceState, PolicyEvaluator};
use crate::scope::{ScopeOptions, ScopedVault};
use crate::types::{validate_namespace, AccessPolicy, LookupKey, NewSecret, SecretClass, SecretEntry, SlotId};

/// Per-namespace state guarded by one lock.
#[derive(Debug, Default)]
struct Namespace {
    loaded: bool,
    index: KeyIndex,
}

type IndexRead = OwnedRwLockReadGuard<Namespace, KeyIndex>;
type IndexWrite = OwnedRwLockMappedWriteGuard<Namespace, KeyIndex>;

/// Encrypted secret store.
pub struct SecretVault {
    backend: Arc<dyn SecretBackend>,
    cipher: Arc<dyn Cipher>,
    master_key: Zeroizing<Vec<u8>>,
    evaluator: PolicyEvaluator,
    namespaces: DashMap<String, Arc<RwLock<Namespace>>>,
}

impl SecretVault {
    /// Create a vault over explicit collaborators.
    pub fn new(
        backend: impl SecretBackend + 'static,
        cipher: impl Cipher + 'static,
        master_key: Zeroizing<Vec<u8>>,
    ) -> Self {
        Self {
            backend: Arc::new(backend),
            cipher: Arc::new(cipher),
            master_key,
            evaluator: PolicyEvaluator::default(),
            namespaces: DashMap::new(),
        }
    }

    /// An ephemeral vault: in-memory backend, AES-256-GCM, fresh random key.
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new(), AesGcmCipher::new(), cipher::generate_master_key())
    }

    /// Build a vault from configuration, resolving the master key through
    /// the configured environment variable or the OS keychain.
    ///
    /// The memory backend falls back to a throwaway key. The file backend
    /// needs a key that outlives the process and fails with
    /// [`VaultError::Keychain`] when none can be found or persisted.
    pub fn from_config(config: &VaultConfig) -> Result<Self> {
        config.validate()?;
        let env_var = &config.master_key_env;
        let vault = match config.storage.backend {
            BackendKind::Memory => {
                let master_key = keychain::lookup_master_key(env_var)?
                    .unwrap_or_else(cipher::generate_master_key);
                Self::new(MemoryBackend::new(), AesGcmCipher::new(), master_key)
            }
            BackendKind::File => {
                let master_key = keychain::get_or_create_master_key(env_var)?;
                let root = config.storage_dir()?;
                debug!(root = %root.display(), "opening file-backed vault");
                Self::new(FileBackend::new(root), AesGcmCipher::new(), master_key)
            }
        };
        Ok(vault)
    }

    /// Replace the device state consulted by access checks.
    pub fn with_device_state(mut self, device: Arc<dyn DeviceState>) -> Self {
        self.evaluator = PolicyEvaluator::new(device);
        self
    }

    /// A handle bound to explicit namespace and policy options.
    pub fn scope(&self, options: ScopeOptions) -> ScopedVault<'_> {
        ScopedVault::new(self, options)
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Store a new entry. Never overwrites: an existing key is `DuplicateEntry`.
    pub async fn add(&self, secret: NewSecret) -> Result<()> {
        secret.key.validate()?;
        if secret.payload.is_empty() {
            return Err(VaultError::EmptyPayload);
        }
        let policy = secret.policy();
        self.evaluator.check_creation(&secret.key, &policy, secret.sync_enabled)?;

        let mut index = self.write_index(secret.key.namespace()).await?;
        let slot = secret.key.slot_id();
        ensure_readable(&index, &secret.key, &slot)?;
        if index.contains(&secret.key) {
            warn!(key = %secret.key, "refusing to overwrite existing entry");
            return Err(VaultError::DuplicateEntry(secret.key.to_string()));
        }

        let now = Utc::now();
        let entry = SecretEntry {
            lookup_key: secret.key,
            payload: secret.payload,
            access_policy: policy,
            sync_enabled: secret.sync_enabled,
            created_at: now,
            updated_at: now,
        };
        self.persist(&slot, &entry).await?;
        index.insert(entry.lookup_key.clone())?;

        debug!(
            key = %entry.lookup_key,
            slot = %slot,
            accessibility = %entry.access_policy.accessibility,
            sync = entry.sync_enabled,
            "added entry"
        );
        Ok(())
    }

    /// Fetch and decrypt an entry.
    ///
    /// `NotFound` when absent; `CorruptedEntry` when the stored blob fails
    /// authentication or does not belong to `key`.
    pub async fn get(&self, key: &LookupKey) -> Result<SecretEntry> {
        key.validate()?;
        let index = self.read_index(key.namespace()).await?;
        let slot = live_slot(&index, key)?;
        let entry = self.fetch(key, &slot).await?;
        self.evaluator.check_access(key, &entry.access_policy)?;
        Ok(entry)
    }

    /// Boolean projection of an entry.
    ///
    /// Returns `false` when the entry is absent, unreadable, or its first
    /// byte is anything but `1`. Callers that must tell "unset" from
    /// "false" should use [`SecretVault::get`] or [`SecretVault::try_get_bool`].
    pub async fn get_bool(&self, key: &LookupKey) -> bool {
        match self.try_get_bool(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "boolean lookup failed, reporting false");
                false
            }
        }
    }

    /// Like [`SecretVault::get_bool`] but only absence maps to `false`;
    /// every other failure is returned.
    pub async fn try_get_bool(&self, key: &LookupKey) -> Result<bool> {
        match self.get(key).await {
            Ok(entry) => Ok(codec::decode_bool(&entry.payload)),
            Err(VaultError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Replace the payload of an existing entry. Never creates.
    pub async fn update(&self, key: &LookupKey, payload: impl Into<SecretBytes>) -> Result<()> {
        let payload = payload.into();
        key.validate()?;
        if payload.is_empty() {
            return Err(VaultError::EmptyPayload);
        }

        let index = self.write_index(key.namespace()).await?;
        let slot = live_slot(&index, key)?;
        let existing = self.fetch(key, &slot).await?;
        self.evaluator.check_access(key, &existing.access_policy)?;

        let updated_at = Utc::now().max(existing.updated_at);
        let entry = SecretEntry {
            payload,
            updated_at,
            ..existing
        };
        self.persist(&slot, &entry).await?;
        drop(index);

        debug!(key = %key, slot = %slot, "updated entry");
        Ok(())
    }

    /// Change an entry's access policy by recreating it with the same payload.
    ///
    /// The recreated entry gets a fresh `created_at`. The replacement is
    /// written to the key's slot in a single put, so a failure leaves the
    /// old entry intact.
    pub async fn rewrap(
        &self,
        key: &LookupKey,
        policy: AccessPolicy,
        sync_enabled: bool,
    ) -> Result<()> {
        key.validate()?;
        self.evaluator.check_creation(key, &policy, sync_enabled)?;

        let index = self.write_index(key.namespace()).await?;
        let slot = live_slot(&index, key)?;
        let existing = self.fetch(key, &slot).await?;
        self.evaluator.check_access(key, &existing.access_policy)?;

        let now = Utc::now();
        let entry = SecretEntry {
            lookup_key: existing.lookup_key,
            payload: existing.payload,
            access_policy: policy,
            sync_enabled,
            created_at: now,
            updated_at: now,
        };
        self.persist(&slot, &entry).await?;
        drop(index);

        debug!(
            key = %key,
            accessibility = %entry.access_policy.accessibility,
            sync = sync_enabled,
            "rewrapped entry"
        );
        Ok(())
    }

    /// Remove an entry. Removing an absent key succeeds.
    pub async fn delete(&self, key: &LookupKey) -> Result<()> {
        key.validate()?;
        let mut index = self.write_index(key.namespace()).await?;
        let slot = key.slot_id();

        self.backend.delete(&slot).await?;
        let existed = index.remove(key).is_some() | index.clear_unreadable(&slot);

        debug!(key = %key, existed, "deleted entry");
        Ok(())
    }

    /// Whether a live entry exists for `key`. Does not decrypt.
    pub async fn contains(&self, key: &LookupKey) -> Result<bool> {
        key.validate()?;
        let index = self.read_index(key.namespace()).await?;
        Ok(index.contains(key))
    }

    /// Keys of every live entry of `class`, in key order. Does not decrypt.
    pub async fn list_keys(&self, namespace: &str, class: SecretClass) -> Result<Vec<LookupKey>> {
        validate_namespace(namespace)?;
        let index = self.read_index(namespace).await?;
        Ok(index.iter_class(class).map(|(key, _)| key.clone()).collect())
    }

    /// Decrypt every live entry of `class` in `namespace`.
    ///
    /// The namespace read lock is held for the whole call, so the result is
    /// one consistent snapshot. Any unreadable slot in the namespace fails
    /// the call, since its class cannot be known.
    pub async fn list(
        &self,
        namespace: &str,
        class: SecretClass,
    ) -> Result<Vec<(LookupKey, SecretBytes)>> {
        validate_namespace(namespace)?;
        let index = self.read_index(namespace).await?;
        if let Some(slot) = index.unreadable().next() {
            return Err(VaultError::corrupted(slot, "unreadable slot in namespace"));
        }

        let mut out = Vec::new();
        for (key, slot) in index.iter_class(class) {
            let entry = self.fetch(key, slot).await?;
            self.evaluator.check_access(key, &entry.access_policy)?;
            out.push((entry.lookup_key, entry.payload));
        }
        Ok(out)
    }

    /// Remove every entry in `namespace`, including unreadable slots.
    pub async fn clear(&self, namespace: &str) -> Result<()> {
        validate_namespace(namespace)?;
        let mut index = self.write_index(namespace).await?;

        let keys: Vec<LookupKey> = index.iter().map(|(key, _)| key.clone()).collect();
        for key in &keys {
            self.backend.delete(&key.slot_id()).await?;
            index.remove(key);
        }

        // Slots the index could not attribute to a key.
        for slot in self.backend.list_slots(namespace).await? {
            self.backend.delete(&slot).await?;
            index.clear_unreadable(&slot);
        }
        index.clear();
        drop(index);

        // Forget the lock unless another caller already holds a handle to it.
        // The predicate runs under the map's shard lock, which also guards
        // `namespace_lock`, so no handle can be taken concurrently.
        self.namespaces
            .remove_if(namespace, |_, lock| Arc::strong_count(lock) == 1);

        debug!(namespace, removed = keys.len(), "cleared namespace");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn namespace_lock(&self, namespace: &str) -> Arc<RwLock<Namespace>> {
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .clone()
    }

    async fn read_index(&self, namespace: &str) -> Result<IndexRead> {
        let lock = self.namespace_lock(namespace);

        let guard = lock.clone().read_owned().await;
        if guard.loaded {
            return Ok(OwnedRwLockReadGuard::map(guard, |ns| &ns.index));
        }
        drop(guard);

        let mut guard = lock.write_owned().await;
        self.ensure_loaded(namespace, &mut guard).await?;
        Ok(OwnedRwLockReadGuard::map(guard.downgrade(), |ns| &ns.index))
    }

    async fn write_index(&self, namespace: &str) -> Result<IndexWrite> {
        let mut guard = self.namespace_lock(namespace).write_owned().await;
        self.ensure_loaded(namespace, &mut guard).await?;
        Ok(OwnedRwLockWriteGuard::map(guard, |ns| &mut ns.index))
    }

    /// Build the namespace index from slot headers on first use.
    async fn ensure_loaded(
        &self,
        namespace: &str,
        guard: &mut OwnedRwLockWriteGuard<Namespace>,
    ) -> Result<()> {
        if guard.loaded {
            return Ok(());
        }

        let mut index = KeyIndex::new();
        for slot in self.backend.list_slots(namespace).await? {
            let Some(blob) = self.backend.get(&slot).await? else {
                continue;
            };
            match codec::peek_header(&blob) {
                Ok(header) if header.key.slot_id() == slot => {
                    index.insert(header.key)?;
                }
                Ok(header) => {
                    warn!(slot = %slot, key = %header.key, "slot holds a blob for another key");
                    index.mark_unreadable(slot);
                }
                Err(e) => {
                    warn!(slot = %slot, error = %e, "slot header unreadable");
                    index.mark_unreadable(slot);
                }
            }
        }

        debug!(namespace, entries = index.len(), "loaded key index");
        guard.index = index;
        guard.loaded = true;
        Ok(())
    }

    async fn fetch(&self, key: &LookupKey, slot: &SlotId) -> Result<SecretEntry> {
        let blob = self
            .backend
            .get(slot)
            .await?
            .ok_or_else(|| VaultError::NotFound(key.to_string()))?;
        codec::open(self.cipher.as_ref(), &self.master_key, key, &blob)
    }

    async fn persist(&self, slot: &SlotId, entry: &SecretEntry) -> Result<()> {
        let blob = codec::seal(self.cipher.as_ref(), &self.master_key, entry)?;
        self.backend.put(slot, &blob).await?;
        Ok(())
    }
}

fn ensure_readable(index: &KeyIndex, key: &LookupKey, slot: &SlotId) -> Result<()> {
    if index.is_unreadable(slot) {
        return Err(VaultError::corrupted(key, "stored slot is unreadable"));
    }
    Ok(())
}

/// The slot of a live entry, or the reason there is none.
fn live_slot(index: &KeyIndex, key: &LookupKey) -> Result<SlotId> {
    let slot = key.slot_id();
    ensure_readable(index, key, &slot)?;
    match index.get(key) {
        Some(slot) => Ok(slot.clone()),
        None => Err(VaultError::NotFound(key.to_string())),
    }
}
