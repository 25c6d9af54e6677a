//! # Secret Patches
//!
//! For each service a directory `.operator/secrets/<svc>/` holding:
//!
//! - `selectivepatch.yaml` whose SuperSecret `stringData` values are gomplate
//!   expressions reading the `data` datasource
//! - `edata.json`, the ejson-encrypted datasource with the real values
//! - `kustomization.yaml` wiring both through `../gomplate.yaml`
//!
//! Plaintext values only ever land in the encrypted file.

use super::selective_patch::{merge, Patch, SelectivePatch, Selector};
use super::{kustomization, kustomization_in, operator_dir, require_dir, write_file, SuperDocument};
use crate::constants::{SECRETS_DIR, SECRET_DATA_FILE};
use crate::crd::{CrSpec, NameValue, NameValues};
use crate::ejson;
use crate::error::{IoContext, Result};
use crate::observability::metrics;
use crate::resolver::{resolve_value, SecretResolver};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

pub const SUPER_SECRET_KIND: &str = "SuperSecret";

const SERVICE_KUSTOMIZATION_YAML: &str = "apiVersion: kustomize.config.k8s.io/v1beta1
kind: Kustomization
resources:
  - selectivepatch.yaml
transformers:
  - ../gomplate.yaml
";

const GOMPLATE_YAML: &str = "apiVersion: qlik.com/v1
kind: Gomplate
metadata:
  name: patched-secrets-gomplate
  labels:
    key: gomplate
dataSource:
  ejson:
    filePath: edata.json
";

pub fn secret_patch_name(svc: &str) -> String {
    format!("{svc}-generated-operator-secrets")
}

/// Stands in for the placeholder while the body is serialized
const VALUE_SENTINEL: &str = "__operator_secret_value__";

/// Deferred lookup of `name` in the encrypted datasource, newlines escaped.
///
/// The expression sits inside a single-quoted scalar. `strings.Squote`
/// doubles embedded quotes and the trims drop the quotes it adds, so the
/// surrounding pair from the template is what closes the scalar.
#[must_use]
pub fn placeholder(name: &str) -> String {
    format!(
        r#"'(( (ds "data").{name} | regexp.Replace "[\r\n]+" "\\n" | strings.Squote | strings.TrimPrefix "'" | strings.TrimSuffix "'" ))'"#
    )
}

/// Per-service secret patches. Bodies carry placeholders only.
pub fn secret_patches(
    secrets: &BTreeMap<String, NameValues>,
) -> Result<BTreeMap<String, SelectivePatch>> {
    let mut patches = BTreeMap::new();
    for (svc, nvs) in secrets {
        let mut acc = SelectivePatch::new(secret_patch_name(svc)).enabled(true);
        for nv in nvs {
            let sp = SelectivePatch::new(secret_patch_name(svc)).with_patch(secret_patch_body(svc, nv)?);
            acc = merge(Some(acc), Some(sp))?;
        }
        patches.insert(svc.clone(), acc);
    }
    Ok(patches)
}

fn secret_patch_body(svc: &str, nv: &NameValue) -> Result<Patch> {
    let mut doc = SuperDocument::new(SUPER_SECRET_KIND, format!("{svc}-secrets"));
    doc.string_data.insert(nv.name.clone(), VALUE_SENTINEL.to_string());
    // serde_yaml would quote the expression as a whole, so splice it in as text
    let body = doc.to_yaml()?.replace(VALUE_SENTINEL, &placeholder(&nv.name));
    Ok(Patch {
        patch: body,
        target: Some(Selector::for_service(SUPER_SECRET_KIND, svc)),
    })
}

/// Render every service's secret directory. The ejson public key must be
/// settled before this runs.
pub async fn process_secrets(
    spec: &CrSpec,
    ejson_public_key: &str,
    resolver: &dyn SecretResolver,
) -> Result<()> {
    let base = operator_dir(spec.manifests_root(), SECRETS_DIR);
    require_dir(&base)?;
    write_file(&base.join("gomplate.yaml"), GOMPLATE_YAML)?;
    let kust = kustomization_in(&base);

    for (svc, sp) in secret_patches(&spec.secrets)? {
        let mut values = BTreeMap::new();
        if let Some(nvs) = spec.secrets.get(&svc) {
            for nv in nvs {
                values.insert(nv.name.clone(), resolve_value(resolver, nv).await?);
            }
        }

        kustomization::add_resource(&svc, &kust)?;
        let dir = base.join(&svc);
        write_service_dir(&dir, &sp, &values, ejson_public_key)?;
        metrics::increment_patches_rendered("secrets");
        debug!(service = %svc, entries = values.len(), "Wrote secret patch");
    }
    info!(services = spec.secrets.len(), "Processed secrets");
    Ok(())
}

fn write_service_dir(
    dir: &Path,
    sp: &SelectivePatch,
    values: &BTreeMap<String, String>,
    ejson_public_key: &str,
) -> Result<()> {
    std::fs::create_dir_all(dir).io_context(|| format!("creating {}", dir.display()))?;
    write_file(&kustomization_in(dir), SERVICE_KUSTOMIZATION_YAML)?;
    write_file(&dir.join("selectivepatch.yaml"), sp.to_yaml()?)?;
    ejson::write_encrypted(&dir.join(SECRET_DATA_FILE), values, ejson_public_key)
}
