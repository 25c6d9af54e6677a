//! # Kustomization Resource List
//!
//! Read-modify-write of the `resources` list in a kustomization file.
//! Fields other than `resources` survive the round trip untouched.
//! The file must already exist; it belongs to the manifest repository.

use crate::error::{IoContext, OperatorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kustomization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Kustomization {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .io_context(|| format!("reading kustomization {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str::<Option<Self>>(&content)
            .map(Option::unwrap_or_default)
            .map_err(|e| OperatorError::yaml(format!("parsing kustomization {}", path.display()), e))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).map_err(|e| {
            OperatorError::yaml(format!("serializing kustomization {}", path.display()), e)
        })?;
        std::fs::write(path, yaml)
            .io_context(|| format!("writing kustomization {}", path.display()))
    }

    pub fn resources(&self) -> &[String] {
        self.resources.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn contains(&self, resource: &str) -> bool {
        self.resources().iter().any(|r| r == resource)
    }
}

/// Add `resource` to the list unless it is already there
pub fn add_resource(resource: &str, kustomization: &Path) -> Result<()> {
    let mut kust = Kustomization::load(kustomization)?;
    if kust.contains(resource) {
        debug!(resource, path = %kustomization.display(), "Resource already registered");
    } else {
        kust.resources
            .get_or_insert_with(Vec::new)
            .push(resource.to_string());
    }
    kust.save(kustomization)
}

/// Drop every exact match of `resource`, and any empty entries
pub fn remove_resource(resource: &str, kustomization: &Path) -> Result<()> {
    let mut kust = Kustomization::load(kustomization)?;
    if let Some(resources) = kust.resources.as_mut() {
        resources.retain(|r| !r.is_empty() && r != resource);
    }
    kust.save(kustomization)
}

/// Resource list of a kustomization file
pub fn resources_list(kustomization: &Path) -> Result<Vec<String>> {
    Ok(Kustomization::load(kustomization)?.resources().to_vec())
}
