//! # Release Name Patch
//!
//! Relabels every `release: qliksense` selector of the release-name
//! transformer template with the CR's release name.

use super::{operator_dir, patch_from_template, require_dir};
use crate::constants::{DEFAULT_RELEASE_NAME, TRANSFORMERS_DIR};
use crate::error::Result;
use crate::observability::metrics;
use std::path::Path;
use tracing::info;

pub const RELEASE_NAME_TEMPLATE: &str = "release-name.yaml";

const OUTPUT_PREFIX: &str = "release-name-";

/// File the patch for `release_name` is written to
#[must_use]
pub fn release_name_file(release_name: &str) -> String {
    format!("{OUTPUT_PREFIX}{release_name}.yaml")
}

/// Write `.operator/transformers/release-name-<name>.yaml`. No-op without a
/// release name.
pub fn process_release_name(manifests_root: &Path, release_name: Option<&str>) -> Result<bool> {
    let Some(release_name) = release_name else {
        return Ok(false);
    };
    let dir = operator_dir(manifests_root, TRANSFORMERS_DIR);
    require_dir(&dir)?;
    patch_from_template(
        &dir,
        RELEASE_NAME_TEMPLATE,
        &format!("release: {DEFAULT_RELEASE_NAME}"),
        &format!("release: {release_name}"),
        OUTPUT_PREFIX,
        &release_name_file(release_name),
    )?;
    metrics::increment_patches_rendered("release_name");
    info!(release_name, "Processed release name");
    Ok(true)
}
