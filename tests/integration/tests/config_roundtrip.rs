//! Config save/load roundtrip and config-driven vault construction.

use std::path::Path;

use strongbox_core::config::{BackendKind, ScopeDefaults};
use strongbox_core::{Accessibility, VaultConfig};
use strongbox_vault::{ScopeOptions, SecretVault, VaultError};
use tempfile::TempDir;

const HEX_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

#[test]
fn test_config_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("strongbox.json5");

    let mut config = VaultConfig::default();
    config.storage.backend = BackendKind::Memory;
    config.defaults = ScopeDefaults {
        namespace: "svc1".into(),
        access_group: None,
        synchronizable: true,
        accessibility: Accessibility::AfterFirstUnlock,
    };
    config.save(&path).unwrap();

    let loaded = VaultConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_config_load_nonexistent() {
    let result = VaultConfig::load(Path::new("/nonexistent/strongbox.json5"));
    assert!(result.is_err());
}

#[tokio::test]
async fn test_vault_from_config_memory() {
    let env_var = "STRONGBOX_IT_MEMORY_KEY";
    std::env::set_var(env_var, HEX_KEY);

    let config = VaultConfig::parse(&format!(
        r#"{{
            storage: {{ backend: "memory" }},
            master_key_env: "{env_var}",
            defaults: {{ namespace: "svc1", accessibility: "whenUnlocked" }},
        }}"#
    ))
    .unwrap();

    let vault = SecretVault::from_config(&config).unwrap();
    let scope = vault.scope(ScopeOptions::from(&config.defaults));
    scope.set_string("alice", "secret123").await.unwrap();
    assert_eq!(scope.get_string("alice").await.unwrap().expose_secret(), "secret123");

    std::env::remove_var(env_var);
}

#[tokio::test]
async fn test_vault_from_config_file_backend_reopens() {
    let env_var = "STRONGBOX_IT_FILE_KEY";
    std::env::set_var(env_var, HEX_KEY);

    let dir = TempDir::new().unwrap();
    let mut config = VaultConfig::default();
    config.master_key_env = env_var.to_string();
    config.storage.path = Some(dir.path().join("vault"));
    config.defaults.namespace = "app".into();
    config.defaults.accessibility = Accessibility::WhenUnlocked;

    {
        let vault = SecretVault::from_config(&config).unwrap();
        vault
            .scope(ScopeOptions::from(&config.defaults))
            .set_bool("onboarded", true)
            .await
            .unwrap();
    }

    let vault = SecretVault::from_config(&config).unwrap();
    assert!(vault.scope(ScopeOptions::from(&config.defaults)).get_bool("onboarded").await);

    std::env::remove_var(env_var);
}

#[test]
fn test_from_config_rejects_conflicting_defaults() {
    let mut config = VaultConfig::default();
    config.storage.backend = BackendKind::Memory;
    config.defaults.accessibility = Accessibility::WhenUnlockedDeviceOnly;
    config.defaults.synchronizable = true;

    assert!(matches!(
        SecretVault::from_config(&config),
        Err(VaultError::Config(_))
    ));
}

#[test]
fn test_from_config_rejects_malformed_key() {
    let env_var = "STRONGBOX_IT_BAD_KEY";
    std::env::set_var(env_var, "not-hex");

    let mut config = VaultConfig::default();
    config.storage.backend = BackendKind::Memory;
    config.master_key_env = env_var.to_string();

    assert!(matches!(
        SecretVault::from_config(&config),
        Err(VaultError::Keychain(_))
    ));
    std::env::remove_var(env_var);
}

#[cfg(not(target_os = "macos"))]
#[test]
fn test_file_vault_without_persistent_key_is_refused() {
    let env_var = "STRONGBOX_IT_UNSET_KEY";
    std::env::remove_var(env_var);

    let dir = TempDir::new().unwrap();
    let root = dir.path().join("vault");
    let mut config = VaultConfig::default();
    config.master_key_env = env_var.to_string();
    config.storage.path = Some(root.clone());

    // A throwaway key would make every write unreadable after a restart.
    assert!(matches!(
        SecretVault::from_config(&config),
        Err(VaultError::Keychain(_))
    ));
    assert!(!root.exists());
}

#[tokio::test]
async fn test_memory_vault_without_key_uses_ephemeral_key() {
    let env_var = "STRONGBOX_IT_UNSET_MEMORY_KEY";
    std::env::remove_var(env_var);

    let mut config = VaultConfig::default();
    config.master_key_env = env_var.to_string();
    config.storage.backend = BackendKind::Memory;

    let vault = SecretVault::from_config(&config).unwrap();
    let scope = vault.scope(ScopeOptions::new("app"));
    scope.set_string("token", "s3cret").await.unwrap();
    assert_eq!(scope.get_string("token").await.unwrap().expose_secret(), "s3cret");
}
