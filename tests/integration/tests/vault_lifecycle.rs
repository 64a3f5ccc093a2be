//! End-to-end vault behaviour over the file backend.

use std::sync::Arc;

use strongbox_integration_tests::{file_vault, master_key};
use strongbox_vault::{
    Accessibility, LookupKey, NewSecret, ScopeOptions, SecretClass, VaultError,
};
use tempfile::TempDir;

#[tokio::test]
async fn test_add_get_update_delete() {
    let dir = TempDir::new().unwrap();
    let vault = file_vault(dir.path(), &master_key());
    let key = LookupKey::generic("svc1", "alice");

    vault.add(NewSecret::new(key.clone(), "secret123")).await.unwrap();
    assert_eq!(vault.get(&key).await.unwrap().payload.expose_secret(), b"secret123");

    vault.update(&key, "newpass").await.unwrap();
    assert_eq!(vault.get(&key).await.unwrap().payload.expose_secret(), b"newpass");

    vault.delete(&key).await.unwrap();
    assert!(matches!(vault.get(&key).await, Err(VaultError::NotFound(_))));
}

#[tokio::test]
async fn test_entries_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let key = master_key();
    {
        let vault = file_vault(dir.path(), &key);
        let scope = vault.scope(ScopeOptions::new("app").accessibility(Accessibility::AfterFirstUnlock));
        scope.set_string("token", "abc").await.unwrap();
        scope
            .set_internet_password("example.com", "bob", "hunter2")
            .await
            .unwrap();
    }

    let vault = file_vault(dir.path(), &key);
    let scope = vault.scope(ScopeOptions::new("app"));
    assert_eq!(scope.get_string("token").await.unwrap().expose_secret(), "abc");
    assert_eq!(
        scope
            .get_internet_password("example.com", "bob")
            .await
            .unwrap()
            .expose_secret(),
        "hunter2"
    );

    let entry = vault.get(&LookupKey::generic("app", "token")).await.unwrap();
    assert_eq!(entry.access_policy.accessibility, Accessibility::AfterFirstUnlock);
}

#[tokio::test]
async fn test_wrong_master_key_reports_corruption() {
    let dir = TempDir::new().unwrap();
    let key = LookupKey::generic("svc1", "alice");
    file_vault(dir.path(), &master_key())
        .add(NewSecret::new(key.clone(), "x"))
        .await
        .unwrap();

    let vault = file_vault(dir.path(), &master_key());
    assert!(vault.contains(&key).await.unwrap());
    assert!(matches!(
        vault.get(&key).await,
        Err(VaultError::CorruptedEntry { .. })
    ));
    assert!(!vault.get_bool(&key).await);
}

#[tokio::test]
async fn test_truncated_blob_reports_corruption() {
    let dir = TempDir::new().unwrap();
    let master = master_key();
    let key = LookupKey::generic("svc1", "alice");
    file_vault(dir.path(), &master)
        .add(NewSecret::new(key.clone(), "x"))
        .await
        .unwrap();

    let ns_dir = std::fs::read_dir(dir.path()).unwrap().next().unwrap().unwrap().path();
    let blob_path = std::fs::read_dir(&ns_dir).unwrap().next().unwrap().unwrap().path();
    let content = std::fs::read(&blob_path).unwrap();
    std::fs::write(&blob_path, &content[..content.len() / 2]).unwrap();

    let vault = file_vault(dir.path(), &master);
    assert!(matches!(
        vault.get(&key).await,
        Err(VaultError::CorruptedEntry { .. })
    ));

    // The slot can be removed and reused.
    vault.delete(&key).await.unwrap();
    vault.add(NewSecret::new(key.clone(), "y")).await.unwrap();
    assert_eq!(vault.get(&key).await.unwrap().payload.expose_secret(), b"y");
}

#[tokio::test]
async fn test_clear_removes_every_class() {
    let dir = TempDir::new().unwrap();
    let vault = file_vault(dir.path(), &master_key());
    let scope = vault.scope(ScopeOptions::new("app").accessibility(Accessibility::WhenUnlocked));
    scope.set_string("a", "1").await.unwrap();
    scope.set_bool("b", true).await.unwrap();
    scope.set_internet_password("h", "c", "3").await.unwrap();

    scope.clear().await.unwrap();

    assert!(scope.list(SecretClass::GenericPassword).await.unwrap().is_empty());
    assert!(scope.list(SecretClass::InternetPassword).await.unwrap().is_empty());
    assert!(!scope.get_bool("b").await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_on_disk() {
    let dir = TempDir::new().unwrap();
    let vault = Arc::new(file_vault(dir.path(), &master_key()));
    let key = LookupKey::generic("svc1", "counter");
    vault.add(NewSecret::new(key.clone(), "start")).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..16u8 {
        let vault = vault.clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            vault.update(&key, vec![i; 256]).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let payload = vault.get(&key).await.unwrap().payload;
    let bytes = payload.expose_secret();
    assert_eq!(bytes.len(), 256);
    assert!(bytes.iter().all(|b| *b == bytes[0]));
    assert!(bytes[0] < 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_of_distinct_keys() {
    let dir = TempDir::new().unwrap();
    let vault = Arc::new(file_vault(dir.path(), &master_key()));

    let mut handles = Vec::new();
    for i in 0..20 {
        let vault = vault.clone();
        handles.push(tokio::spawn(async move {
            let key = LookupKey::generic("bulk", format!("user-{i:02}"));
            vault.add(NewSecret::new(key, format!("pw-{i}"))).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let all = vault.list("bulk", SecretClass::GenericPassword).await.unwrap();
    assert_eq!(all.len(), 20);
    assert_eq!(all[0].0.account(), "user-00");
    assert_eq!(all[19].1.expose_secret(), b"pw-19");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_adds_yield_one_winner() {
    let dir = TempDir::new().unwrap();
    let vault = Arc::new(file_vault(dir.path(), &master_key()));
    let key = LookupKey::generic("svc1", "contested");

    let mut handles = Vec::new();
    for i in 0..8 {
        let vault = vault.clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            vault.add(NewSecret::new(key, format!("writer-{i}"))).await
        }));
    }

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => ok += 1,
            Err(VaultError::DuplicateEntry(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(ok, 1);
}
