//! # Patch Generation
//!
//! Renders CR fields into overlay files under `<manifestsRoot>/.operator`.
//!
//! Every renderer follows the same shape: check that its base directory
//! exists, write one document per service (or per value), then register the
//! file name in that directory's `kustomization.yaml`.
//!
//! ## Module Structure
//!
//! - `selective_patch.rs` - patch document model and merge
//! - `kustomization.rs` - resource list maintainer
//! - `configs.rs` / `secrets.rs` - SuperConfigMap and SuperSecret patches
//! - `transformers.rs` - enables transformers referenced by configs or secrets
//! - `namespace.rs`, `release_name.rs`, `storage_class.rs` - single-file patchers
//! - `keys.rs` - application key material files

pub mod configs;
pub mod keys;
pub mod kustomization;
pub mod namespace;
pub mod release_name;
pub mod secrets;
pub mod selective_patch;
pub mod storage_class;
pub mod transformers;

pub use configs::{config_patches, process_configs};
pub use keys::generate_application_keys;
pub use kustomization::{add_resource, remove_resource, Kustomization};
pub use namespace::process_namespace;
pub use release_name::process_release_name;
pub use secrets::{process_secrets, secret_patches};
pub use selective_patch::{merge, Patch, PatchMetadata, SelectivePatch, Selector};
pub use storage_class::process_storage_class;
pub use transformers::process_transformers;

use crate::constants::{KUSTOMIZATION_FILE, OPERATOR_DIR, QLIK_API_VERSION};
use crate::error::{IoContext, OperatorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// `<manifestsRoot>/.operator/<sub>`
pub fn operator_dir(manifests_root: &Path, sub: &str) -> PathBuf {
    manifests_root.join(OPERATOR_DIR).join(sub)
}

/// Fail unless `dir` exists. Base directories are never created here.
pub(crate) fn require_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(OperatorError::missing(dir))
    }
}

pub(crate) fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(OperatorError::missing(path))
    }
}

pub(crate) fn kustomization_in(dir: &Path) -> PathBuf {
    dir.join(KUSTOMIZATION_FILE)
}

pub(crate) fn write_file(path: &Path, content: impl AsRef<[u8]>) -> Result<()> {
    std::fs::write(path, content).io_context(|| format!("writing {}", path.display()))
}

pub(crate) fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).io_context(|| format!("reading {}", path.display()))
}

/// Copy `template` to `out_file` with every `from` replaced by `to`, then
/// register `out_file` in place of the template and of earlier outputs
/// sharing `out_prefix`.
pub(crate) fn patch_from_template(
    dir: &Path,
    template: &str,
    from: &str,
    to: &str,
    out_prefix: &str,
    out_file: &str,
) -> Result<()> {
    let template_path = dir.join(template);
    require_file(&template_path)?;
    let content = read_file(&template_path)?;
    write_file(&dir.join(out_file), content.replace(from, to))?;

    let kust_path = kustomization_in(dir);
    let kust = Kustomization::load(&kust_path)?;
    for stale in kust
        .resources()
        .iter()
        .filter(|r| *r == template || (r.starts_with(out_prefix) && *r != out_file))
    {
        remove_resource(stale, &kust_path)?;
    }
    add_resource(out_file, &kust_path)
}

/// SuperConfigMap or SuperSecret body embedded in a patch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperDocument {
    pub api_version: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub string_data: BTreeMap<String, String>,
}

impl SuperDocument {
    pub(crate) fn new(kind: &str, name: String) -> Self {
        Self {
            api_version: QLIK_API_VERSION.to_string(),
            kind: kind.to_string(),
            metadata: BTreeMap::from([("name".to_string(), name)]),
            data: BTreeMap::new(),
            string_data: BTreeMap::new(),
        }
    }

    pub(crate) fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| OperatorError::yaml(format!("serializing {} patch body", self.kind), e))
    }
}
