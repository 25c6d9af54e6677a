//! # Backup Object Store
//!
//! The backup object is a single named object holding a `key -> bytes` map
//! and a release label. In a cluster it is a Kubernetes `Secret`.

use crate::error::{OperatorError, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::{DeleteParams, PostParams};
use kube::{Api, Client};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupObject {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub data: BTreeMap<String, Vec<u8>>,
}

/// Storage for backup objects, scoped to one namespace.
///
/// `get` and `delete` report a missing object as [`OperatorError::NotFound`].
#[async_trait]
pub trait BackupStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<BackupObject>;

    async fn create(&self, object: &BackupObject) -> Result<()>;

    /// Replace labels and the whole data map of an existing object
    async fn update(&self, object: &BackupObject) -> Result<()>;

    async fn delete(&self, name: &str) -> Result<()>;
}

/// Backup objects as Kubernetes Secrets
#[derive(Clone)]
pub struct KubeSecretStore {
    api: Api<Secret>,
    namespace: String,
}

impl std::fmt::Debug for KubeSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl KubeSecretStore {
    #[must_use]
    pub fn new(client: &Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client.clone(), namespace),
            namespace: namespace.to_string(),
        }
    }

    fn to_secret(&self, object: &BackupObject) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(object.name.clone()),
                namespace: Some(self.namespace.clone()),
                labels: Some(object.labels.clone()),
                ..ObjectMeta::default()
            },
            data: Some(
                object
                    .data
                    .iter()
                    .map(|(k, v)| (k.clone(), ByteString(v.clone())))
                    .collect(),
            ),
            ..Secret::default()
        }
    }

    fn store_err(&self, op: &str, name: &str, e: &kube::Error) -> OperatorError {
        OperatorError::Store(format!("{op} secret {}/{name}: {e}", self.namespace))
    }
}

#[async_trait]
impl BackupStore for KubeSecretStore {
    async fn get(&self, name: &str) -> Result<BackupObject> {
        match self.api.get(name).await {
            Ok(secret) => Ok(BackupObject {
                name: name.to_string(),
                labels: secret.metadata.labels.unwrap_or_default(),
                data: secret
                    .data
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(k, v)| (k, v.0))
                    .collect(),
            }),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Err(OperatorError::NotFound(
                format!("secret {}/{name}", self.namespace),
            )),
            Err(e) => Err(self.store_err("getting", name, &e)),
        }
    }

    async fn create(&self, object: &BackupObject) -> Result<()> {
        self.api
            .create(&PostParams::default(), &self.to_secret(object))
            .await
            .map_err(|e| self.store_err("creating", &object.name, &e))?;
        debug!(namespace = %self.namespace, name = %object.name, "Created backup secret");
        Ok(())
    }

    async fn update(&self, object: &BackupObject) -> Result<()> {
        // no resourceVersion: unconditional replace, last writer wins
        self.api
            .replace(&object.name, &PostParams::default(), &self.to_secret(object))
            .await
            .map_err(|e| self.store_err("updating", &object.name, &e))?;
        debug!(namespace = %self.namespace, name = %object.name, "Updated backup secret");
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        match self.api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Err(OperatorError::NotFound(
                format!("secret {}/{name}", self.namespace),
            )),
            Err(e) => Err(self.store_err("deleting", name, &e)),
        }
    }
}

/// Process-local store, counting calls per operation
#[derive(Debug, Default)]
pub struct InMemoryBackupStore {
    objects: Mutex<BTreeMap<String, BackupObject>>,
    gets: AtomicUsize,
    creates: AtomicUsize,
    updates: AtomicUsize,
    deletes: AtomicUsize,
}

impl InMemoryBackupStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without counting a call
    #[must_use]
    pub fn with_object(mut self, object: BackupObject) -> Self {
        self.objects.get_mut().insert(object.name.clone(), object);
        self
    }

    pub async fn object(&self, name: &str) -> Option<BackupObject> {
        self.objects.lock().await.get(name).cloned()
    }

    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of create plus update calls
    pub fn write_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst) + self.updates.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Calls of any kind
    pub fn total_calls(&self) -> usize {
        self.get_calls() + self.write_calls() + self.delete_calls()
    }
}

#[async_trait]
impl BackupStore for InMemoryBackupStore {
    async fn get(&self, name: &str) -> Result<BackupObject> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| OperatorError::NotFound(format!("object {name}")))
    }

    async fn create(&self, object: &BackupObject) -> Result<()> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let mut objects = self.objects.lock().await;
        if objects.contains_key(&object.name) {
            return Err(OperatorError::Store(format!("object {} already exists", object.name)));
        }
        objects.insert(object.name.clone(), object.clone());
        Ok(())
    }

    async fn update(&self, object: &BackupObject) -> Result<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mut objects = self.objects.lock().await;
        match objects.get_mut(&object.name) {
            Some(existing) => {
                *existing = object.clone();
                Ok(())
            }
            None => Err(OperatorError::NotFound(format!("object {}", object.name))),
        }
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| OperatorError::NotFound(format!("object {name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(name: &str) -> BackupObject {
        BackupObject {
            name: name.to_string(),
            labels: BTreeMap::from([("release".to_string(), "qliksense".to_string())]),
            data: BTreeMap::from([("ejson-keys".to_string(), vec![1, 2, 3])]),
        }
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = InMemoryBackupStore::new();
        let err = store.get("absent").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.get_calls(), 1);
    }

    #[tokio::test]
    async fn test_create_then_update_replaces_data() {
        let store = InMemoryBackupStore::new();
        store.create(&object("backup")).await.expect("create");

        let mut replaced = object("backup");
        replaced.data = BTreeMap::from([("operator-keys".to_string(), vec![9])]);
        store.update(&replaced).await.expect("update");

        let stored = store.get("backup").await.expect("get");
        assert_eq!(stored.data.len(), 1);
        assert_eq!(stored.data["operator-keys"], vec![9]);
        assert_eq!(store.write_calls(), 2);
    }

    #[tokio::test]
    async fn test_create_existing_fails() {
        let store = InMemoryBackupStore::new().with_object(object("backup"));
        let err = store.create(&object("backup")).await.unwrap_err();
        assert!(matches!(err, OperatorError::Store(_)));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryBackupStore::new().with_object(object("backup"));
        store.delete("backup").await.expect("delete");
        assert!(store.object("backup").await.is_none());
        assert!(store.delete("backup").await.unwrap_err().is_not_found());
        assert_eq!(store.total_calls(), 2);
    }
}
