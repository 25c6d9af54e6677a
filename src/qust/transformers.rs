//! # Transformer Enablement
//!
//! Transformers shipped disabled in `manifests/base/transformers` are turned
//! on for a service when one of its configs or secrets carries the
//! transformer's name. The switch is a patch appended to
//! `.operator/transformers/<svc>.yaml`:
//!
//! ```yaml
//! - target:
//!     kind: SelectivePatch
//!     name: caCertificates
//!     labelSelector: app=audit
//!   patch: |
//!     apiVersion: qlik.com/v1
//!     kind: SelectivePatch
//!     metadata:
//!       name: caCertificates
//!     enabled: true
//! ```

use super::selective_patch::{Patch, SelectivePatch, Selector, SELECTIVE_PATCH_KIND};
use super::{kustomization, kustomization_in, operator_dir, read_file, require_dir, write_file};
use crate::constants::{
    BASE_TRANSFORMERS_DIR, DEFAULT_RELEASE_NAME, STORAGE_CLASS_TRANSFORMER, TRANSFORMERS_DIR,
};
use crate::crd::CrSpec;
use crate::error::Result;
use crate::observability::metrics;
use std::path::Path;
use tracing::{debug, info, warn};

/// Enable every disabled base transformer named by a config or secret entry
pub fn process_transformers(spec: &CrSpec) -> Result<()> {
    let base = spec.manifests_root().join(BASE_TRANSFORMERS_DIR);
    let dest = operator_dir(spec.manifests_root(), TRANSFORMERS_DIR);
    require_dir(&dest)?;
    let disabled = disabled_transformers(&base)?;
    if disabled.is_empty() {
        debug!("No disabled transformers");
        return Ok(());
    }

    let mut enabled = 0usize;
    for entries in [&spec.secrets, &spec.configs] {
        for (svc, nvs) in entries {
            for nv in nvs {
                if disabled.contains(&nv.name) && write_transformer(&dest, svc, &nv.name)? {
                    enabled += 1;
                }
            }
        }
    }
    info!(enabled, "Processed transformers");
    Ok(())
}

/// Names of base transformer directories that are not switched on
pub fn disabled_transformers(base_dir: &Path) -> Result<Vec<String>> {
    let listed = kustomization::resources_list(&kustomization_in(base_dir))?;
    Ok(listed
        .into_iter()
        .filter(|name| name != STORAGE_CLASS_TRANSFORMER)
        .filter(|name| !is_transformer_enabled(&base_dir.join(name)))
        .collect())
}

/// A transformer is enabled when the first SelectivePatch listed in its
/// kustomization is `enabled` and labelled `key: <dir name>`
fn is_transformer_enabled(dir: &Path) -> bool {
    let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let resources = match kustomization::resources_list(&kustomization_in(dir)) {
        Ok(resources) => resources,
        Err(e) => {
            warn!(transformer = name, error = %e, "Cannot list transformer resources");
            return false;
        }
    };
    for resource in resources {
        let path = dir.join(&resource);
        if path.is_dir() {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(&path) else {
            return false;
        };
        if !content.contains("kind: SelectivePatch") {
            continue;
        }
        return SelectivePatch::from_yaml(&content)
            .map(|sp| sp.enabled && sp.metadata.labels.get("key").map(String::as_str) == Some(name))
            .unwrap_or(false);
    }
    false
}

/// Append the enabling patch for `transformer` to the service's file.
/// Returns false when the same patch was already there.
fn write_transformer(dest: &Path, svc: &str, transformer: &str) -> Result<bool> {
    let file_name = format!("{svc}.yaml");
    let kust = kustomization_in(dest);
    let mut sp = load_or_create(dest, svc, &file_name)?;
    let patch = transformer_patch(transformer, svc)?;
    if sp.patches.contains(&patch) {
        debug!(service = svc, transformer, "Transformer already enabled");
        return Ok(false);
    }
    sp.patches.push(patch);
    write_file(&dest.join(&file_name), sp.to_yaml()?)?;
    kustomization::add_resource(&file_name, &kust)?;
    metrics::increment_patches_rendered("transformers");
    Ok(true)
}

fn load_or_create(dest: &Path, svc: &str, file_name: &str) -> Result<SelectivePatch> {
    let kust = kustomization::Kustomization::load(&kustomization_in(dest))?;
    if kust.contains(file_name) {
        SelectivePatch::from_yaml(&read_file(&dest.join(file_name))?)
    } else {
        Ok(SelectivePatch::new(format!("{svc}-operator-generated")).enabled(true))
    }
}

fn transformer_patch(transformer: &str, svc: &str) -> Result<Patch> {
    let body = SelectivePatch::new(transformer).enabled(true);
    let mut target = if svc == DEFAULT_RELEASE_NAME {
        Selector::for_kind(SELECTIVE_PATCH_KIND)
    } else {
        Selector::for_service(SELECTIVE_PATCH_KIND, svc)
    };
    target.name = Some(transformer.to_string());
    Ok(Patch {
        patch: body.to_yaml()?,
        target: Some(target),
    })
}
