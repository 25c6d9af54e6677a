//! # Secret Value Resolution
//!
//! Secret entries may point at a key of an existing cluster Secret instead
//! of carrying a literal value. The renderer reveals them through the
//! [`SecretResolver`] capability so that it never depends on a particular
//! cluster client.

use crate::crd::NameValue;
use crate::error::{OperatorError, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("secret {secret} has no key {key}")]
    KeyNotFound { secret: String, key: String },

    #[error("secret {0} not found")]
    SecretNotFound(String),

    #[error("secret value is not valid UTF-8: {0}")]
    Decode(#[from] std::string::FromUtf8Error),

    #[error("kubernetes API error: {0}")]
    Client(#[from] kube::Error),
}

#[async_trait]
pub trait SecretResolver: Send + Sync {
    /// Reveal the plaintext value of `secret_name[key]`
    async fn reveal(&self, secret_name: &str, key: &str) -> Result<String, ResolveError>;
}

/// Effective value of a secret entry: the literal, or the revealed reference
pub async fn resolve_value(resolver: &dyn SecretResolver, nv: &NameValue) -> Result<String> {
    let Some(key_ref) = nv.secret_key_ref() else {
        return Ok(nv.value.clone());
    };
    debug!(name = %nv.name, secret = %key_ref.name, "Revealing secret reference");
    resolver
        .reveal(&key_ref.name, &key_ref.key)
        .await
        .map_err(|e| OperatorError::SecretLookup {
            secret: key_ref.name.clone(),
            key: key_ref.key.clone(),
            source: Box::new(e),
        })
}

/// Reads values from Secrets of one namespace
#[derive(Clone)]
pub struct KubeSecretResolver {
    secrets: Api<Secret>,
}

impl std::fmt::Debug for KubeSecretResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretResolver").finish_non_exhaustive()
    }
}

impl KubeSecretResolver {
    pub fn new(client: &Client, namespace: &str) -> Self {
        Self {
            secrets: Api::namespaced(client.clone(), namespace),
        }
    }
}

#[async_trait]
impl SecretResolver for KubeSecretResolver {
    async fn reveal(&self, secret_name: &str, key: &str) -> Result<String, ResolveError> {
        let secret = match self.secrets.get(secret_name).await {
            Ok(secret) => secret,
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                return Err(ResolveError::SecretNotFound(secret_name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if let Some(value) = secret.data.as_ref().and_then(|data| data.get(key)) {
            return Ok(String::from_utf8(value.0.clone())?);
        }
        secret
            .string_data
            .and_then(|mut data| data.remove(key))
            .ok_or_else(|| ResolveError::KeyNotFound {
                secret: secret_name.to_string(),
                key: key.to_string(),
            })
    }
}

/// Fixed `(secret, key) -> value` table, for offline renders and tests
#[derive(Debug, Clone, Default)]
pub struct InMemorySecretResolver {
    values: BTreeMap<(String, String), String>,
}

impl InMemorySecretResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_value(mut self, secret: &str, key: &str, value: &str) -> Self {
        self.values
            .insert((secret.to_string(), key.to_string()), value.to_string());
        self
    }
}

#[async_trait]
impl SecretResolver for InMemorySecretResolver {
    async fn reveal(&self, secret_name: &str, key: &str) -> Result<String, ResolveError> {
        self.values
            .get(&(secret_name.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| ResolveError::KeyNotFound {
                secret: secret_name.to_string(),
                key: key.to_string(),
            })
    }
}
