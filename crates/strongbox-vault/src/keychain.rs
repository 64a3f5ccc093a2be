//! Master key resolution.
//!
//! The vault's master key is resolved in priority order:
//! 1. The configured environment variable (hex-encoded, 32 bytes)
//! 2. OS keychain (macOS Keychain via Security.framework)
//! 3. Generate a new key and store it in the keychain
//!
//! On Linux and other platforms the keychain path is not implemented, so a
//! generated key cannot be persisted. [`get_or_create_master_key`] fails there
//! instead of handing out a key that dies with the process; callers that only
//! need an ephemeral key use [`lookup_master_key`] and generate one themselves.

use strongbox_core::env;
use tracing::debug;
#[cfg(not(target_os = "macos"))]
use tracing::warn;
use zeroize::Zeroizing;

use crate::cipher;
use crate::error::{Result, VaultError};

#[cfg(target_os = "macos")]
const SERVICE_NAME: &str = "strongbox";
#[cfg(target_os = "macos")]
const ACCOUNT_NAME: &str = "master_key";

/// Required master key length in bytes.
pub const MASTER_KEY_LEN: usize = 32;

/// Retrieve the master key, creating and persisting one if none exists yet.
///
/// Fails with [`VaultError::Keychain`] when a generated key could not be
/// persisted anywhere.
pub fn get_or_create_master_key(env_var: &str) -> Result<Zeroizing<Vec<u8>>> {
    if let Some(key) = lookup_master_key(env_var)? {
        return Ok(key);
    }

    debug!("generating new master key");
    let key = cipher::generate_master_key();
    store_in_keychain(&key, env_var)?;
    Ok(key)
}

/// Find an existing master key in `env_var` or the OS keychain.
pub fn lookup_master_key(env_var: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
    if let Some(key) = master_key_from_env(env_var)? {
        debug!(env_var, "using master key from environment variable");
        return Ok(Some(key));
    }

    if let Some(key) = get_from_keychain()? {
        debug!("using master key from OS keychain");
        return Ok(Some(key));
    }

    Ok(None)
}

/// Read a hex-encoded master key from `env_var`, if set.
pub fn master_key_from_env(env_var: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
    let Some(hex_key) = env::get_var(env_var).map(Zeroizing::new) else {
        return Ok(None);
    };
    let key = Zeroizing::new(
        hex::decode(hex_key.trim())
            .map_err(|e| VaultError::Keychain(format!("invalid hex in {env_var}: {e}")))?,
    );
    if key.len() != MASTER_KEY_LEN {
        return Err(VaultError::Keychain(format!(
            "{env_var} must decode to exactly {MASTER_KEY_LEN} bytes, got {}",
            key.len()
        )));
    }
    Ok(Some(key))
}

/// Delete the master key from the OS keychain (for reset workflows).
pub fn delete_master_key() -> Result<()> {
    delete_from_keychain()
}

// ---------------------------------------------------------------------------
// macOS keychain implementation
// ---------------------------------------------------------------------------

#[cfg(target_os = "macos")]
fn is_not_found(e: &security_framework::base::Error) -> bool {
    // errSecItemNotFound
    e.code() == -25300
}

#[cfg(target_os = "macos")]
fn get_from_keychain() -> Result<Option<Zeroizing<Vec<u8>>>> {
    use security_framework::passwords::get_generic_password;

    match get_generic_password(SERVICE_NAME, ACCOUNT_NAME) {
        Ok(data) => {
            let data = Zeroizing::new(data);
            let hex_str = std::str::from_utf8(&data).map_err(|e| {
                VaultError::Keychain(format!("keychain data is not valid UTF-8: {e}"))
            })?;
            let key = Zeroizing::new(hex::decode(hex_str.trim()).map_err(|e| {
                VaultError::Keychain(format!("keychain data is not valid hex: {e}"))
            })?);
            if key.len() != MASTER_KEY_LEN {
                return Err(VaultError::Keychain(format!(
                    "keychain key has wrong length: {} (expected {MASTER_KEY_LEN})",
                    key.len()
                )));
            }
            Ok(Some(key))
        }
        Err(e) if is_not_found(&e) => Ok(None),
        Err(e) => Err(VaultError::Keychain(format!("keychain read failed: {e}"))),
    }
}

#[cfg(target_os = "macos")]
fn store_in_keychain(key: &[u8], _env_var: &str) -> Result<()> {
    use security_framework::passwords::set_generic_password;

    let hex_key = Zeroizing::new(hex::encode(key));
    set_generic_password(SERVICE_NAME, ACCOUNT_NAME, hex_key.as_bytes())
        .map_err(|e| VaultError::Keychain(format!("keychain write failed: {e}")))
}

#[cfg(target_os = "macos")]
fn delete_from_keychain() -> Result<()> {
    use security_framework::passwords::delete_generic_password;

    match delete_generic_password(SERVICE_NAME, ACCOUNT_NAME) {
        Ok(()) => Ok(()),
        // Nothing stored, nothing to delete.
        Err(e) if is_not_found(&e) => Ok(()),
        Err(e) => Err(VaultError::Keychain(format!("keychain delete failed: {e}"))),
    }
}

// ---------------------------------------------------------------------------
// Other platforms -- env-var only
// ---------------------------------------------------------------------------

#[cfg(not(target_os = "macos"))]
fn get_from_keychain() -> Result<Option<Zeroizing<Vec<u8>>>> {
    // TODO: Secret Service (D-Bus) lookup for Linux desktops.
    Ok(None)
}

#[cfg(not(target_os = "macos"))]
fn store_in_keychain(_key: &[u8], env_var: &str) -> Result<()> {
    warn!(env_var, "no OS keychain to persist a generated master key");
    Err(VaultError::Keychain(format!(
        "no OS keychain on this platform; set {env_var} to a hex-encoded \
         {MASTER_KEY_LEN}-byte key"
    )))
}

#[cfg(not(target_os = "macos"))]
fn delete_from_keychain() -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_key_from_env_var() {
        let var = "STRONGBOX_TEST_MASTER_KEY_OK";
        let key = cipher::generate_master_key();
        std::env::set_var(var, hex::encode(key.as_slice()));

        let result = get_or_create_master_key(var).unwrap();
        assert_eq!(result.as_slice(), key.as_slice());

        std::env::remove_var(var);
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_generated_key_without_keychain_is_refused() {
        let var = "STRONGBOX_TEST_MASTER_KEY_NEVER_SET";
        assert!(lookup_master_key(var).unwrap().is_none());
        assert!(matches!(
            get_or_create_master_key(var),
            Err(VaultError::Keychain(_))
        ));
    }

    #[test]
    fn test_unset_env_var_is_none() {
        let result = master_key_from_env("STRONGBOX_TEST_MASTER_KEY_UNSET").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_invalid_hex_in_env_var() {
        let var = "STRONGBOX_TEST_MASTER_KEY_BAD_HEX";
        std::env::set_var(var, "not-valid-hex!");
        let result = master_key_from_env(var);
        assert!(matches!(result, Err(VaultError::Keychain(_))));
        std::env::remove_var(var);
    }

    #[test]
    fn test_wrong_length_key_in_env_var() {
        let var = "STRONGBOX_TEST_MASTER_KEY_SHORT";
        std::env::set_var(var, hex::encode([0u8; 16]));
        let result = master_key_from_env(var);
        assert!(matches!(result, Err(VaultError::Keychain(_))));
        std::env::remove_var(var);
    }
}
