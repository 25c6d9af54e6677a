//! # Storage Class Patch
//!
//! Switches on the storage class transformer. The class name itself reaches
//! the manifests through the `qliksense` config `storageClassName`.

use super::{operator_dir, patch_from_template, require_dir};
use crate::constants::{DEFAULT_RELEASE_NAME, TRANSFORMERS_DIR};
use crate::crd::CrSpec;
use crate::error::Result;
use crate::observability::metrics;
use tracing::info;

pub const STORAGE_CLASS_TEMPLATE: &str = "storage-class.yaml";

const OUTPUT_PREFIX: &str = "storage-class-";

/// Write `.operator/transformers/storage-class-<name>.yaml` and push the
/// class name into the umbrella service's configs. No-op without a
/// storage class.
pub fn process_storage_class(spec: &mut CrSpec) -> Result<bool> {
    let Some(storage_class) = spec.storage_class_name().map(str::to_string) else {
        return Ok(false);
    };
    let dir = operator_dir(spec.manifests_root(), TRANSFORMERS_DIR);
    require_dir(&dir)?;
    patch_from_template(
        &dir,
        STORAGE_CLASS_TEMPLATE,
        "value: false",
        "value: true",
        OUTPUT_PREFIX,
        &format!("{OUTPUT_PREFIX}{storage_class}.yaml"),
    )?;
    spec.add_to_configs(DEFAULT_RELEASE_NAME, "storageClassName", &storage_class);
    metrics::increment_patches_rendered("storage_class");
    info!(storage_class = %storage_class, "Processed storage class");
    Ok(true)
}
