//! # Application Key Files
//!
//! Services listed as directories under `.operator/keys/secrets` each get a
//! fresh signing key in `eprivate_key.json`. Their public JWKS documents are
//! collected into `.operator/keys/configs/keys/ejwks.json`, and the keys
//! SuperConfigMap patch is pointed at them.

use super::{operator_dir, read_file, require_dir, write_file};
use crate::constants::{EDGE_AUTH_SERVICE, JWKS_FILE, KEYS_DIR, PRIVATE_KEY_FILE, TLS_SERVICE};
use crate::crd::CrSpec;
use crate::ejson;
use crate::error::{IoContext, OperatorError, Result};
use crate::keys::{ApplicationKey, KeyGenerator};
use crate::observability::metrics;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const LOGIN_STATE_KEY_LEN: usize = 32;

fn keys_configs_dir(manifests_root: &Path) -> PathBuf {
    operator_dir(manifests_root, KEYS_DIR).join("configs").join("keys")
}

/// Service directories under `.operator/keys/secrets`, sorted
pub fn key_services(manifests_root: &Path) -> Result<Vec<String>> {
    let dir = operator_dir(manifests_root, KEYS_DIR).join("secrets");
    require_dir(&dir)?;
    let mut services = Vec::new();
    for entry in std::fs::read_dir(&dir).io_context(|| format!("listing {}", dir.display()))? {
        let entry = entry.io_context(|| format!("listing {}", dir.display()))?;
        if entry.path().is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                services.push(name.to_string());
            }
        }
    }
    services.sort();
    Ok(services)
}

/// Regenerate every service key file, the JWKS file and the keys patch
pub fn generate_application_keys(
    spec: &CrSpec,
    ejson_public_key: &str,
    generator: &dyn KeyGenerator,
) -> Result<()> {
    let root = spec.manifests_root();
    let services = key_services(root)?;
    let mut jwks = BTreeMap::new();

    for svc in &services {
        let entries = if svc == TLS_SERVICE {
            tls_entries(spec, generator)?
        } else {
            let key = generator.application_key()?;
            jwks.insert(svc.clone(), STANDARD.encode(&key.jwks));
            signing_entries(svc, &key, generator)?
        };
        let path = operator_dir(root, KEYS_DIR)
            .join("secrets")
            .join(svc)
            .join(PRIVATE_KEY_FILE);
        ejson::write_encrypted(&path, &entries, ejson_public_key)?;
        debug!(service = %svc, "Wrote application key");
    }

    let configs_dir = keys_configs_dir(root);
    require_dir(&configs_dir)?;
    ejson::write_encrypted(&configs_dir.join(JWKS_FILE), &jwks, ejson_public_key)?;

    let patch_path = configs_dir.join("selectivepatch.yaml");
    let rewritten = rewrite_keys_patch(&read_file(&patch_path)?, &services)?;
    write_file(&patch_path, rewritten)?;

    metrics::increment_patches_rendered("keys");
    info!(services = services.len(), "Generated application keys");
    Ok(())
}

fn tls_entries(spec: &CrSpec, generator: &dyn KeyGenerator) -> Result<BTreeMap<String, String>> {
    // without a host the cert names the service itself
    let host = spec
        .tls_cert_host
        .as_deref()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or(TLS_SERVICE);
    let tls = generator.self_signed_cert(host, spec.tls_cert_org.as_deref().unwrap_or_default())?;
    Ok(BTreeMap::from([
        ("tls_cert".to_string(), STANDARD.encode(tls.cert_pem.as_bytes())),
        ("tls_key".to_string(), STANDARD.encode(tls.key_pem.as_bytes())),
    ]))
}

fn signing_entries(
    svc: &str,
    key: &ApplicationKey,
    generator: &dyn KeyGenerator,
) -> Result<BTreeMap<String, String>> {
    let mut entries = BTreeMap::from([
        ("private_key".to_string(), key.private_key_pem.to_string()),
        ("kid".to_string(), key.kid.clone()),
    ]);
    if svc == EDGE_AUTH_SERVICE {
        let login_state_key = STANDARD.encode(generator.random_bytes(LOGIN_STATE_KEY_LEN)?.as_slice());
        entries.insert(
            "cookies_keys".to_string(),
            STANDARD.encode(format!(r#"["{login_state_key}"]"#)),
        );
        entries.insert("login_state_key".to_string(), login_state_key);
        entries.insert(
            "access_private_key".to_string(),
            generator.private_key_pem()?.to_string(),
        );
        entries.insert(
            "refresh_private_key".to_string(),
            generator.private_key_pem()?.to_string(),
        );
    }
    Ok(entries)
}

/// Replace the `data` key of the first patch body with one
/// `qlik.api.internal-<svc>` entry per signing service. Everything else in
/// both documents keeps its place.
fn rewrite_keys_patch(content: &str, services: &[String]) -> Result<String> {
    let mut doc: Mapping = serde_yaml::from_str(content)
        .map_err(|e| OperatorError::yaml("parsing keys selective patch", e))?;
    let first = doc
        .get_mut("patches")
        .and_then(Value::as_sequence_mut)
        .and_then(|patches| patches.first_mut())
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| OperatorError::KeyGeneration("keys selective patch has no patches".to_string()))?;
    let body = first
        .get("patch")
        .and_then(Value::as_str)
        .ok_or_else(|| OperatorError::KeyGeneration("keys selective patch has no patch body".to_string()))?;

    let mut super_config: Mapping = serde_yaml::from_str(body)
        .map_err(|e| OperatorError::yaml("parsing keys patch body", e))?;
    let mut data = Mapping::new();
    for svc in services.iter().filter(|svc| *svc != TLS_SERVICE) {
        // trailing newline keeps the value a block scalar
        data.insert(
            Value::from(format!("qlik.api.internal-{svc}")),
            Value::from(format!(r#"(( index (ds "data") "{svc}" | base64.Decode ))"#) + "\n"),
        );
    }
    super_config.insert(Value::from("data"), Value::Mapping(data));

    let body = serde_yaml::to_string(&super_config)
        .map_err(|e| OperatorError::yaml("serializing keys patch body", e))?;
    first.insert(Value::from("patch"), Value::from(body));
    serde_yaml::to_string(&doc).map_err(|e| OperatorError::yaml("serializing keys selective patch", e))
}
