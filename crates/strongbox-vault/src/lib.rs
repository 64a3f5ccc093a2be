//! Encrypted secret vault for Strongbox.
//!
//! Stores small secrets (passwords, tokens, arbitrary byte blobs) encrypted
//! at rest, keyed by a composite lookup key and guarded by an access policy.
//! Encryption, persistence and structured-object serialization are pluggable
//! collaborators; AES-256-GCM, file and in-memory implementations ship here.

pub mod backend;
pub mod cipher;
pub mod codec;
pub mod error;
pub mod index;
pub mod keychain;
pub mod policy;
pub mod scope;
pub mod store;
pub mod types;

pub use backend::{BackendError, FileBackend, MemoryBackend, SecretBackend};
pub use cipher::{AesGcmCipher, Cipher, CipherError};
pub use codec::{JsonSerializer, Serializer};
pub use error::{Result, VaultError};
pub use policy::{DeviceState, DeviceStatus, PolicyEvaluator, UnlockedDevice};
pub use scope::{ScopeOptions, ScopedVault};
pub use store::SecretVault;
pub use types::{AccessPolicy, LookupKey, NewSecret, SecretClass, SecretEntry, SlotId};

pub use strongbox_core::{Accessibility, SecretBytes, SecretString};
