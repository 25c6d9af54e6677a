//! # SelectivePatch
//!
//! Named, enable-flagged document carrying an ordered list of patches,
//! each aimed at a resource selector. Two patches with the same kind and
//! name merge by concatenating their patch lists.

use crate::constants::QLIK_API_VERSION;
use crate::error::{OperatorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SELECTIVE_PATCH_KIND: &str = "SelectivePatch";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectivePatch {
    pub api_version: String,
    pub kind: String,
    pub metadata: PatchMetadata,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<Patch>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// One patch body and the resources it applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub patch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Selector>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<String>,
}

impl Selector {
    /// `{kind}` or `{kind, labelSelector: app=<svc>}` for a non-empty service
    pub fn for_service(kind: &str, svc: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: None,
            label_selector: (!svc.is_empty()).then(|| format!("app={svc}")),
        }
    }

    pub fn for_kind(kind: &str) -> Self {
        Self::for_service(kind, "")
    }
}

impl SelectivePatch {
    /// Empty, disabled patch document
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            api_version: QLIK_API_VERSION.to_string(),
            kind: SELECTIVE_PATCH_KIND.to_string(),
            metadata: PatchMetadata {
                name: name.into(),
                ..PatchMetadata::default()
            },
            enabled: false,
            patches: Vec::new(),
        }
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_patch(mut self, patch: Patch) -> Self {
        self.patches.push(patch);
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Append `other`'s patches after ours.
    ///
    /// Not idempotent: merging the same patch twice duplicates its entries.
    pub fn merge_from(&mut self, other: SelectivePatch) -> Result<()> {
        if self.kind != other.kind || self.metadata.name != other.metadata.name {
            return Err(OperatorError::IdentityMismatch {
                left: self.metadata.name.clone(),
                right: other.metadata.name,
            });
        }
        self.patches.extend(other.patches);
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| OperatorError::yaml(format!("serializing selective patch {}", self.name()), e))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| OperatorError::yaml("parsing selective patch", e))
    }
}

/// Merge two optional patches of the same identity.
///
/// A missing side yields the other one unchanged; two missing sides are an
/// error.
pub fn merge(
    left: Option<SelectivePatch>,
    right: Option<SelectivePatch>,
) -> Result<SelectivePatch> {
    match (left, right) {
        (None, None) => Err(OperatorError::EmptyMerge),
        (Some(sp), None) | (None, Some(sp)) => Ok(sp),
        (Some(mut left), Some(right)) => {
            left.merge_from(right)?;
            Ok(left)
        }
    }
}
