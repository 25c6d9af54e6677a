//! # Qliksense Custom Resource
//!
//! The declarative input of a render pass: configs, secrets, namespace,
//! storage class, release name and key rotation policy.

use super::keys::KeysAction;
use crate::constants::DEFAULT_RELEASE_NAME;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Qliksense Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: qlik.com/v1
/// kind: Qliksense
/// metadata:
///   name: qliksense
///   namespace: default
/// spec:
///   profile: docker-desktop
///   manifestsRoot: /cnab/app/manifests
///   rotateKeys: "no"
///   configs:
///     qliksense:
///       - name: acceptEULA
///         value: "yes"
///   secrets:
///     qliksense:
///       - name: mongoDbUri
///         valueFrom:
///           secretKeyRef:
///             name: mongo-credentials
///             key: uri
/// ```
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "Qliksense",
    group = "qlik.com",
    version = "v1",
    namespaced,
    printcolumn = r#"{"name":"Profile", "type":"string", "jsonPath":".spec.profile"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CrSpec {
    /// Profile directory under `manifests/`, ex. `docker-desktop`
    #[serde(default)]
    pub profile: String,
    /// Service name to secret values
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secrets: BTreeMap<String, NameValues>,
    /// Service name to config values
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub configs: BTreeMap<String, NameValues>,
    /// Root of the checked out manifest repository
    #[serde(default)]
    pub manifests_root: String,
    /// Key rotation policy (`yes`, `no`, `None`, `ForceRotate`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate_keys: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,
    /// Target namespace for every rendered object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Value of the `release` label; `qliksense` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_name: Option<String>,
    /// Host of the self-signed certificate issued to the TLS service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_cert_host: Option<String>,
    /// Organization of the self-signed certificate issued to the TLS service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_cert_org: Option<String>,
}

/// One config or secret entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NameValue {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    /// Indirection to an existing cluster secret; wins over `value`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<ValueFrom>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValueFrom {
    pub secret_key_ref: SecretKeyRef,
}

/// Reference to one key of a cluster secret
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct SecretKeyRef {
    pub name: String,
    pub key: String,
}

impl NameValue {
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            value_from: None,
        }
    }

    /// Entry resolved from `secret_name[name]` at render time
    pub fn from_secret(name: impl Into<String>, secret_name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            value: String::new(),
            value_from: Some(ValueFrom {
                secret_key_ref: SecretKeyRef {
                    name: secret_name.into(),
                    key: name.clone(),
                },
            }),
            name,
        }
    }

    #[must_use]
    pub fn secret_key_ref(&self) -> Option<&SecretKeyRef> {
        self.value_from.as_ref().map(|v| &v.secret_key_ref)
    }
}

/// Ordered name/value entries of one service. Names are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct NameValues(pub Vec<NameValue>);

impl NameValues {
    /// Replace the entry with the same name in place, or append
    pub fn upsert(&mut self, nv: NameValue) {
        match self.0.iter_mut().find(|existing| existing.name == nv.name) {
            Some(existing) => *existing = nv,
            None => self.0.push(nv),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&NameValue> {
        self.0.iter().find(|nv| nv.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NameValue> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<NameValue>> for NameValues {
    fn from(v: Vec<NameValue>) -> Self {
        Self(v)
    }
}

impl<'a> IntoIterator for &'a NameValues {
    type Item = &'a NameValue;
    type IntoIter = std::slice::Iter<'a, NameValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl CrSpec {
    pub fn manifests_root(&self) -> &Path {
        Path::new(&self.manifests_root)
    }

    /// `manifests/<profile>` relative to the manifests root
    #[must_use]
    pub fn profile_dir(&self) -> PathBuf {
        Path::new("manifests").join(&self.profile)
    }

    /// Upsert a literal config value
    pub fn add_to_configs(&mut self, svc: &str, name: &str, value: &str) {
        self.configs
            .entry(svc.to_string())
            .or_default()
            .upsert(NameValue::literal(name, value));
    }

    /// Upsert a secret value. With a non-empty `secret_name` the value is
    /// ignored and the entry points at `secret_name[name]` instead.
    pub fn add_to_secrets(&mut self, svc: &str, name: &str, value: &str, secret_name: &str) {
        let nv = if secret_name.is_empty() {
            NameValue::literal(name, value)
        } else {
            NameValue::from_secret(name, secret_name)
        };
        self.secrets.entry(svc.to_string()).or_default().upsert(nv);
    }

    /// Raw entry of a service secret, unresolved
    #[must_use]
    pub fn get_from_secrets(&self, svc: &str, name: &str) -> Option<&NameValue> {
        self.secrets.get(svc).and_then(|nvs| nvs.get(name))
    }

    #[must_use]
    pub fn keys_action(&self) -> KeysAction {
        KeysAction::parse_lenient(self.rotate_keys.as_deref().unwrap_or_default())
    }

    #[must_use]
    pub fn storage_class_name(&self) -> Option<&str> {
        non_empty(self.storage_class_name.as_deref())
    }

    #[must_use]
    pub fn release_name(&self) -> Option<&str> {
        non_empty(self.release_name.as_deref())
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        non_empty(self.namespace.as_deref())
    }
}

impl Qliksense {
    /// Name of the backup object holding this release's key material
    #[must_use]
    pub fn backup_object_name(&self) -> String {
        format!(
            "{}{}",
            self.metadata.name.as_deref().unwrap_or(DEFAULT_RELEASE_NAME),
            crate::constants::BACKUP_NAME_SUFFIX
        )
    }

    /// Namespace the backup object lives in; the metadata namespace wins
    #[must_use]
    pub fn backup_namespace(&self) -> Option<&str> {
        non_empty(self.metadata.namespace.as_deref()).or_else(|| self.spec.namespace())
    }

    /// Target namespace of rendered objects; the spec namespace wins
    #[must_use]
    pub fn target_namespace(&self) -> Option<&str> {
        self.spec
            .namespace()
            .or_else(|| non_empty(self.metadata.namespace.as_deref()))
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}
