//! Authenticated encryption collaborator.
//!
//! The vault never implements cryptography itself; it calls a [`Cipher`].
//! [`AesGcmCipher`] is the default: AES-256-GCM with a per-blob key derived
//! from the master key via HKDF-SHA256 and a random salt. The master key is
//! never used directly as a cipher key.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

const NONCE_SIZE: usize = 12;
const SALT_SIZE: usize = 32;
const KEY_SIZE: usize = 32;

/// HKDF info string used to domain-separate derived keys.
const HKDF_INFO: &[u8] = b"strongbox-vault-v1";

/// Failures reported by a [`Cipher`].
#[derive(Debug, Error)]
pub enum CipherError {
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Wrong key or tampered ciphertext.
    #[error("authentication failed")]
    AuthenticationFailure,
}

/// Authenticated encryption of byte blobs under a caller-supplied key.
pub trait Cipher: Send + Sync {
    /// Encrypt `plaintext`; the output must be self-contained for [`Cipher::decrypt`].
    fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CipherError>;

    /// Decrypt and authenticate. Never returns partial plaintext.
    fn decrypt(&self, key: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, CipherError>;
}

/// AES-256-GCM with HKDF-SHA256 key derivation.
///
/// Output layout is `salt || nonce || ciphertext_with_tag`, so the same
/// plaintext encrypted twice produces different output.
#[derive(Debug, Default, Clone, Copy)]
pub struct AesGcmCipher;

impl AesGcmCipher {
    pub fn new() -> Self {
        Self
    }
}

/// Derive a 256-bit encryption key from `master_key` and `salt` via HKDF-SHA256.
fn derive_key(
    master_key: &[u8],
    salt: &[u8],
) -> Result<Zeroizing<[u8; KEY_SIZE]>, hkdf::InvalidLength> {
    let hk = Hkdf::<Sha256>::new(Some(salt), master_key);
    let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
    hk.expand(HKDF_INFO, &mut okm[..])?;
    Ok(okm)
}

impl Cipher for AesGcmCipher {
    fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let mut salt = [0u8; SALT_SIZE];
        rand::thread_rng().fill_bytes(&mut salt);

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let derived =
            derive_key(key, &salt).map_err(|e| CipherError::Encryption(e.to_string()))?;
        let cipher = Aes256Gcm::new_from_slice(&derived[..])
            .map_err(|e| CipherError::Encryption(e.to_string()))?;

        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CipherError::Encryption(e.to_string()))?;

        let mut result = Vec::with_capacity(SALT_SIZE + NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&salt);
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    fn decrypt(&self, key: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, CipherError> {
        if ciphertext.len() < SALT_SIZE + NONCE_SIZE {
            return Err(CipherError::AuthenticationFailure);
        }

        let (salt, rest) = ciphertext.split_at(SALT_SIZE);
        let (nonce_bytes, sealed) = rest.split_at(NONCE_SIZE);

        let derived = derive_key(key, salt).map_err(|_| CipherError::AuthenticationFailure)?;
        let cipher = Aes256Gcm::new_from_slice(&derived[..])
            .map_err(|_| CipherError::AuthenticationFailure)?;

        let nonce = Nonce::from_slice(nonce_bytes);
        cipher
            .decrypt(nonce, sealed)
            .map(Zeroizing::new)
            .map_err(|_| CipherError::AuthenticationFailure)
    }
}

/// Generate a new random 256-bit master key.
pub fn generate_master_key() -> Zeroizing<Vec<u8>> {
    let mut key = Zeroizing::new(vec![0u8; KEY_SIZE]);
    rand::thread_rng().fill_bytes(key.as_mut_slice());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_encrypt_decrypt() {
        let cipher = AesGcmCipher::new();
        let master_key = generate_master_key();
        let plaintext = b"hello, secret world!";

        let encrypted = cipher.encrypt(&master_key, plaintext).unwrap();
        let decrypted = cipher.decrypt(&master_key, &encrypted).unwrap();

        assert_eq!(decrypted.as_slice(), plaintext);
    }

    #[test]
    fn test_wrong_key_fails() {
        let cipher = AesGcmCipher::new();
        let key_a = generate_master_key();
        let key_b = generate_master_key();

        let encrypted = cipher.encrypt(&key_a, b"sensitive data").unwrap();
        let result = cipher.decrypt(&key_b, &encrypted);

        assert!(matches!(result, Err(CipherError::AuthenticationFailure)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let cipher = AesGcmCipher::new();
        let master_key = generate_master_key();

        let mut encrypted = cipher.encrypt(&master_key, b"important secret").unwrap();

        // Flip a byte past the salt and nonce.
        let idx = SALT_SIZE + NONCE_SIZE + 1;
        encrypted[idx] ^= 0xff;

        let result = cipher.decrypt(&master_key, &encrypted);
        assert!(matches!(result, Err(CipherError::AuthenticationFailure)));
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let cipher = AesGcmCipher::new();
        let master_key = generate_master_key();
        let result = cipher.decrypt(&master_key, &[0u8; SALT_SIZE]);
        assert!(matches!(result, Err(CipherError::AuthenticationFailure)));
    }

    #[test]
    fn test_same_plaintext_produces_different_ciphertexts() {
        let cipher = AesGcmCipher::new();
        let master_key = generate_master_key();

        let enc_a = cipher.encrypt(&master_key, b"same plaintext").unwrap();
        let enc_b = cipher.encrypt(&master_key, b"same plaintext").unwrap();

        assert_ne!(enc_a, enc_b);
        assert_ne!(enc_a[..SALT_SIZE], enc_b[..SALT_SIZE]);
    }

    #[test]
    fn test_generated_keys_differ() {
        let a = generate_master_key();
        let b = generate_master_key();
        assert_eq!(a.len(), KEY_SIZE);
        assert_ne!(a.as_slice(), b.as_slice());
    }
}
