//! # Namespace Patch
//!
//! Points the built-in NamespaceTransformer at the CR's namespace.

use super::{kustomization, kustomization_in, operator_dir, require_dir, write_file};
use crate::constants::TRANSFORMERS_DIR;
use crate::error::Result;
use crate::observability::metrics;
use std::path::Path;
use tracing::info;

pub const NAMESPACE_PATCH_FILE: &str = "namespace.yaml";

const NAMESPACE_PLACEHOLDER: &str = "NAMESPACE_NAME";

const NAMESPACE_TEMPLATE: &str = "apiVersion: qlik.com/v1
kind: SelectivePatch
metadata:
  name: operator-patch-for-namespace
enabled: true
patches:
- target:
    kind: NamespaceTransformer
  patch: |-
    - op: replace
      path: /metadata/namespace
      value: NAMESPACE_NAME
";

/// Write `.operator/transformers/namespace.yaml`. No-op without a namespace.
pub fn process_namespace(manifests_root: &Path, namespace: Option<&str>) -> Result<bool> {
    let Some(namespace) = namespace else {
        return Ok(false);
    };
    let dir = operator_dir(manifests_root, TRANSFORMERS_DIR);
    require_dir(&dir)?;
    write_file(
        &dir.join(NAMESPACE_PATCH_FILE),
        NAMESPACE_TEMPLATE.replacen(NAMESPACE_PLACEHOLDER, namespace, 1),
    )?;
    kustomization::add_resource(NAMESPACE_PATCH_FILE, &kustomization_in(&dir))?;
    metrics::increment_patches_rendered("namespace");
    info!(namespace, "Processed namespace");
    Ok(true)
}
