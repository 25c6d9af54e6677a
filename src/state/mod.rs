//! # Operator State Backup
//!
//! Key directories are persisted as tar+gzip blobs inside one backup object
//! per CR (`<cr-name>-operator-state-backup`), one data key per directory.
//!
//! - [`backup`] packs every entry and upserts the object. An existing object
//!   has its whole data map replaced.
//! - [`restore`] unpacks the requested entries. A missing object or a missing
//!   key is [`OperatorError::NotFound`], which callers treat as "nothing was
//!   backed up yet".

pub mod archive;
mod store;

pub use store::{BackupObject, BackupStore, InMemoryBackupStore, KubeSecretStore};

use crate::constants::{DEFAULT_RELEASE_NAME, RELEASE_LABEL};
use crate::error::{OperatorError, Result};
use crate::observability::metrics;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

/// One directory stored under `key` in the backup object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub key: String,
    pub directory: PathBuf,
}

impl BackupEntry {
    pub fn new(key: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            key: key.into(),
            directory: directory.into(),
        }
    }
}

/// Archive every entry into `object_name`, creating the object if absent
pub async fn backup(
    store: &dyn BackupStore,
    object_name: &str,
    release_label: &str,
    entries: &[BackupEntry],
) -> Result<()> {
    let mut data = BTreeMap::new();
    for entry in entries {
        data.insert(entry.key.clone(), archive::pack(&entry.directory)?);
        debug!(key = %entry.key, directory = %entry.directory.display(), "Packed backup entry");
    }

    let release_label = if release_label.is_empty() {
        DEFAULT_RELEASE_NAME
    } else {
        release_label
    };
    let object = BackupObject {
        name: object_name.to_string(),
        labels: BTreeMap::from([(RELEASE_LABEL.to_string(), release_label.to_string())]),
        data,
    };

    match store.get(object_name).await {
        Ok(_) => {
            store.update(&object).await?;
            metrics::increment_backup_operations("update");
        }
        Err(e) if e.is_not_found() => {
            store.create(&object).await?;
            metrics::increment_backup_operations("create");
        }
        Err(e) => return Err(e),
    }
    info!(object = %object_name, entries = entries.len(), "Backed up operator state");
    Ok(())
}

/// Unpack the requested entries of `object_name` into their directories
pub async fn restore(store: &dyn BackupStore, object_name: &str, entries: &[BackupEntry]) -> Result<()> {
    let object = store.get(object_name).await?;
    for entry in entries {
        let blob = object.data.get(&entry.key).ok_or_else(|| {
            OperatorError::NotFound(format!("key: {} not found in object: {object_name}", entry.key))
        })?;
        archive::unpack(blob, &entry.directory)?;
        debug!(key = %entry.key, directory = %entry.directory.display(), "Restored backup entry");
    }
    metrics::increment_backup_operations("restore");
    info!(object = %object_name, entries = entries.len(), "Restored operator state");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    mod backup_tests {
        use super::*;

        #[tokio::test]
        async fn test_backup_creates_object_with_label() {
            let dir = TempDir::new().expect("dir");
            std::fs::write(dir.path().join("pub"), "priv").expect("write");
            let store = InMemoryBackupStore::new();

            backup(&store, "cr-operator-state-backup", "cr", &[BackupEntry::new("ejson-keys", dir.path())])
                .await
                .expect("backup");

            let object = store.object("cr-operator-state-backup").await.expect("object");
            assert_eq!(object.labels["release"], "cr");
            assert!(object.data.contains_key("ejson-keys"));
        }

        #[tokio::test]
        async fn test_empty_release_label_defaults() {
            let dir = TempDir::new().expect("dir");
            let store = InMemoryBackupStore::new();
            backup(&store, "b", "", &[BackupEntry::new("k", dir.path())])
                .await
                .expect("backup");
            assert_eq!(store.object("b").await.expect("object").labels["release"], "qliksense");
        }

        #[tokio::test]
        async fn test_second_backup_replaces_all_keys() {
            let dir = TempDir::new().expect("dir");
            let store = InMemoryBackupStore::new();
            backup(&store, "b", "cr", &[BackupEntry::new("ejson-keys", dir.path())])
                .await
                .expect("first");
            backup(&store, "b", "cr", &[BackupEntry::new("operator-keys", dir.path())])
                .await
                .expect("second");

            let object = store.object("b").await.expect("object");
            assert_eq!(object.data.keys().collect::<Vec<_>>(), vec!["operator-keys"]);
            assert_eq!(store.write_calls(), 2);
        }
    }

    mod restore_tests {
        use super::*;

        #[tokio::test]
        async fn test_round_trip() {
            let src = TempDir::new().expect("src");
            std::fs::write(src.path().join("a.txt"), "1").expect("a");
            std::fs::write(src.path().join("b.txt"), "2").expect("b");
            let store = InMemoryBackupStore::new();
            backup(&store, "b", "cr", &[BackupEntry::new("dir", src.path())])
                .await
                .expect("backup");

            let dst = TempDir::new().expect("dst");
            restore(&store, "b", &[BackupEntry::new("dir", dst.path())])
                .await
                .expect("restore");
            assert_eq!(std::fs::read_to_string(dst.path().join("a.txt")).expect("a"), "1");
            assert_eq!(std::fs::read_to_string(dst.path().join("b.txt")).expect("b"), "2");
        }

        #[tokio::test]
        async fn test_missing_object_is_not_found() {
            let dst = TempDir::new().expect("dst");
            let err = restore(&InMemoryBackupStore::new(), "b", &[BackupEntry::new("dir", dst.path())])
                .await
                .unwrap_err();
            assert!(err.is_not_found());
        }

        #[tokio::test]
        async fn test_missing_key_is_not_found() {
            let store = InMemoryBackupStore::new().with_object(BackupObject {
                name: "b".to_string(),
                ..BackupObject::default()
            });
            let dst = TempDir::new().expect("dst");
            let err = restore(&store, "b", &[BackupEntry::new("operator-keys", dst.path())])
                .await
                .unwrap_err();
            assert!(err.is_not_found());
            assert!(err.to_string().contains("operator-keys"));
        }
    }
}
