//! Shared fixtures for the integration tests.

use std::path::Path;

use strongbox_vault::cipher::generate_master_key;
use strongbox_vault::{AesGcmCipher, FileBackend, SecretVault};
use zeroize::Zeroizing;

/// A fresh random master key.
pub fn master_key() -> Zeroizing<Vec<u8>> {
    generate_master_key()
}

/// A file-backed vault rooted at `root`.
pub fn file_vault(root: &Path, key: &Zeroizing<Vec<u8>>) -> SecretVault {
    SecretVault::new(FileBackend::new(root), AesGcmCipher::new(), key.clone())
}
