//! Entry codec.
//!
//! Two layers live here:
//!
//! - **Payload shapes**: raw bytes, UTF-8 text, booleans (one byte, `1` for
//!   true) and structured objects through a pluggable [`Serializer`].
//! - **Stored blobs**: a [`SecretEntry`] sealed for a backend slot. The blob
//!   is JSON with a plaintext header (format version, lookup key, sync tag)
//!   and a base64 `sealed` field holding the encrypted record. The header
//!   lets the vault rebuild its index without decrypting anything; the
//!   sealed record repeats the key so a blob moved between slots is caught.

use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strongbox_core::{SecretBytes, SecretString};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::cipher::Cipher;
use crate::error::{Result, VaultError};
use crate::types::{AccessPolicy, LookupKey, SecretEntry};

/// Current stored blob format.
pub const BLOB_FORMAT_VERSION: u8 = 1;

/// Encoder/decoder for structured payloads.
///
/// Decoding is lenient: anything that does not fit the requested type
/// yields `None`, never an error.
pub trait Serializer: Send + Sync {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<SecretBytes>;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Option<T>;
}

/// JSON encoding via `serde_json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<SecretBytes> {
        serde_json::to_vec(value)
            .map(SecretBytes::new)
            .map_err(|e| VaultError::Codec(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Option<T> {
        serde_json::from_slice(bytes).ok()
    }
}

/// Encode a flag as a single byte.
pub fn encode_bool(value: bool) -> SecretBytes {
    SecretBytes::new(vec![u8::from(value)])
}

/// `true` only when the first byte is exactly `1`.
pub fn decode_bool(payload: &SecretBytes) -> bool {
    payload.first() == Some(1)
}

pub fn encode_text(value: &str) -> SecretBytes {
    SecretBytes::from(value)
}

/// Decode UTF-8 text, consuming the buffer.
pub fn decode_text(payload: SecretBytes) -> Result<SecretString> {
    SecretString::try_from(payload)
        .map_err(|e| VaultError::Codec(format!("payload is not valid UTF-8: {e}")))
}

/// Plaintext part of a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobHeader {
    pub version: u8,
    pub key: LookupKey,
    /// Tag for backends that replicate across devices.
    pub synchronizable: bool,
}

#[derive(Serialize, Deserialize)]
struct StoredBlob {
    #[serde(flatten)]
    header: BlobHeader,
    /// Cipher output, base64-encoded.
    sealed: String,
}

/// The encrypted part of a blob.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct StoredRecord {
    #[zeroize(skip)]
    key: LookupKey,
    /// Payload bytes, base64-encoded.
    payload: String,
    #[zeroize(skip)]
    policy: AccessPolicy,
    #[zeroize(skip)]
    sync_enabled: bool,
    #[zeroize(skip)]
    created_at: DateTime<Utc>,
    #[zeroize(skip)]
    updated_at: DateTime<Utc>,
}

impl StoredRecord {
    /// Fixed JSON overhead: field names, enum tags, flags and timestamps.
    const FIXED_OVERHEAD: usize = 512;

    fn from_entry(entry: &SecretEntry) -> Self {
        Self {
            key: entry.lookup_key.clone(),
            payload: base64::Engine::encode(&STANDARD, entry.payload.expose_secret()),
            policy: entry.access_policy.clone(),
            sync_enabled: entry.sync_enabled,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }

    /// Upper bound on the serialized length. Free-form strings are counted
    /// at six bytes per input byte, the widest JSON escape (`\u00XX`).
    fn encoded_len_bound(&self) -> usize {
        let free_form = self.key.namespace().len()
            + self.key.server().map_or(0, str::len)
            + self.key.account().len()
            + self.policy.access_group.as_deref().map_or(0, str::len);
        Self::FIXED_OVERHEAD + self.payload.len() + 6 * free_form
    }
}

/// Read the plaintext header of a stored blob.
pub fn peek_header(blob: &[u8]) -> Result<BlobHeader> {
    let header: BlobHeader = serde_json::from_slice(blob)
        .map_err(|e| VaultError::corrupted("<unknown>", format!("unreadable header: {e}")))?;
    if header.version != BLOB_FORMAT_VERSION {
        return Err(VaultError::corrupted(
            &header.key,
            format!("unsupported blob format version {}", header.version),
        ));
    }
    Ok(header)
}

/// Encrypt `entry` into a blob ready for its slot.
pub fn seal(cipher: &dyn Cipher, key_material: &[u8], entry: &SecretEntry) -> Result<Vec<u8>> {
    let record = StoredRecord::from_entry(entry);

    // Sized up front so the buffer never reallocates and strands a copy.
    let mut plaintext = Zeroizing::new(Vec::with_capacity(record.encoded_len_bound()));
    serde_json::to_writer(&mut *plaintext, &record)
        .map_err(|e| VaultError::Codec(e.to_string()))?;
    drop(record);

    let sealed = cipher
        .encrypt(key_material, &plaintext)
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

    let blob = StoredBlob {
        header: BlobHeader {
            version: BLOB_FORMAT_VERSION,
            key: entry.lookup_key.clone(),
            synchronizable: entry.sync_enabled,
        },
        sealed: base64::Engine::encode(&STANDARD, &sealed),
    };
    serde_json::to_vec(&blob).map_err(|e| VaultError::Codec(e.to_string()))
}

/// Decrypt a blob read from the slot of `expected`.
///
/// Any failure, including a blob that belongs to a different key, is a
/// [`VaultError::CorruptedEntry`].
pub fn open(
    cipher: &dyn Cipher,
    key_material: &[u8],
    expected: &LookupKey,
    blob: &[u8],
) -> Result<SecretEntry> {
    let stored: StoredBlob = serde_json::from_slice(blob)
        .map_err(|e| VaultError::corrupted(expected, format!("unreadable blob: {e}")))?;
    if stored.header.version != BLOB_FORMAT_VERSION {
        return Err(VaultError::corrupted(
            expected,
            format!("unsupported blob format version {}", stored.header.version),
        ));
    }
    if &stored.header.key != expected {
        return Err(VaultError::corrupted(expected, "blob header names another key"));
    }

    let sealed = base64::Engine::decode(&STANDARD, &stored.sealed)
        .map_err(|e| VaultError::corrupted(expected, format!("base64 decode failed: {e}")))?;
    let plaintext = cipher.decrypt(key_material, &sealed).map_err(|e| {
        VaultError::corrupted(expected, format!("{e} (wrong key or tampered data)"))
    })?;

    let record: StoredRecord = serde_json::from_slice(&plaintext)
        .map_err(|e| VaultError::corrupted(expected, format!("unreadable record: {e}")))?;
    if &record.key != expected {
        return Err(VaultError::corrupted(expected, "sealed record names another key"));
    }

    let payload = base64::Engine::decode(&STANDARD, &record.payload)
        .map_err(|e| VaultError::corrupted(expected, format!("base64 decode failed: {e}")))?;

    Ok(SecretEntry {
        lookup_key: record.key.clone(),
        payload: SecretBytes::new(payload),
        access_policy: record.policy.clone(),
        sync_enabled: record.sync_enabled,
        created_at: record.created_at,
        updated_at: record.updated_at,
    })
}
