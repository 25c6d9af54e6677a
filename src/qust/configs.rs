//! # Config Patches
//!
//! One `<svc>.yaml` SelectivePatch per service under `.operator/configs`,
//! each patch setting one `data` key of the service's SuperConfigMap.

use super::selective_patch::{merge, Patch, SelectivePatch, Selector};
use super::{kustomization, kustomization_in, operator_dir, require_dir, write_file, SuperDocument};
use crate::constants::CONFIGS_DIR;
use crate::crd::{CrSpec, NameValue, NameValues};
use crate::error::Result;
use crate::observability::metrics;
use std::collections::BTreeMap;
use tracing::{debug, info};

pub const SUPER_CONFIG_MAP_KIND: &str = "SuperConfigMap";

pub fn config_patch_name(svc: &str) -> String {
    format!("{svc}-generated-operator-configs")
}

/// Build the per-service config patches. Entry order within a service is
/// preserved; services come out sorted.
pub fn config_patches(
    configs: &BTreeMap<String, NameValues>,
) -> Result<BTreeMap<String, SelectivePatch>> {
    let mut patches = BTreeMap::new();
    for (svc, nvs) in configs {
        let mut acc = SelectivePatch::new(config_patch_name(svc)).enabled(true);
        for nv in nvs {
            let sp = SelectivePatch::new(config_patch_name(svc)).with_patch(config_patch_body(svc, nv)?);
            acc = merge(Some(acc), Some(sp))?;
        }
        patches.insert(svc.clone(), acc);
    }
    Ok(patches)
}

fn config_patch_body(svc: &str, nv: &NameValue) -> Result<Patch> {
    let mut doc = SuperDocument::new(SUPER_CONFIG_MAP_KIND, format!("{svc}-configs"));
    doc.data.insert(nv.name.clone(), nv.value.clone());
    Ok(Patch {
        patch: doc.to_yaml()?,
        target: Some(Selector::for_service(SUPER_CONFIG_MAP_KIND, svc)),
    })
}

/// Write `.operator/configs/<svc>.yaml` for every service and register it
pub fn process_configs(spec: &CrSpec) -> Result<()> {
    let base = operator_dir(spec.manifests_root(), CONFIGS_DIR);
    require_dir(&base)?;
    let kust = kustomization_in(&base);
    for (svc, sp) in config_patches(&spec.configs)? {
        let file_name = format!("{svc}.yaml");
        write_file(&base.join(&file_name), sp.to_yaml()?)?;
        kustomization::add_resource(&file_name, &kust)?;
        metrics::increment_patches_rendered("configs");
        debug!(service = %svc, entries = sp.patches.len(), "Wrote config patch");
    }
    info!(services = spec.configs.len(), "Processed configs");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qust::kustomization::resources_list;
    use tempfile::TempDir;

    fn configs(entries: &[(&str, &[(&str, &str)])]) -> BTreeMap<String, NameValues> {
        entries
            .iter()
            .map(|(svc, nvs)| {
                let nvs: Vec<_> = nvs.iter().map(|(n, v)| NameValue::literal(*n, *v)).collect();
                ((*svc).to_string(), NameValues::from(nvs))
            })
            .collect()
    }

    #[test]
    fn test_one_patch_per_entry_in_input_order() {
        let patches = config_patches(&configs(&[(
            "qliksense",
            &[("zeta", "1"), ("alpha", "2")],
        )]))
        .expect("render");
        let sp = &patches["qliksense"];
        assert_eq!(sp.name(), "qliksense-generated-operator-configs");
        assert!(sp.enabled);
        assert_eq!(sp.patches.len(), 2);
        let first: SuperDocument = serde_yaml::from_str(&sp.patches[0].patch).expect("body");
        let second: SuperDocument = serde_yaml::from_str(&sp.patches[1].patch).expect("body");
        assert_eq!(first.data.get("zeta").map(String::as_str), Some("1"));
        assert_eq!(second.data.get("alpha").map(String::as_str), Some("2"));
        assert_eq!(first.metadata["name"], "qliksense-configs");
    }

    #[test]
    fn test_missing_base_dir_is_precondition_error() {
        let dir = TempDir::new().expect("tempdir");
        let spec = CrSpec {
            manifests_root: dir.path().display().to_string(),
            configs: configs(&[("a", &[("k", "v")])]),
            ..CrSpec::default()
        };
        let err = process_configs(&spec).unwrap_err();
        assert!(matches!(err, crate::error::OperatorError::PreconditionMissing { .. }));
    }

    #[test]
    fn test_process_configs_writes_and_registers() {
        let dir = TempDir::new().expect("tempdir");
        let base = dir.path().join(".operator/configs");
        std::fs::create_dir_all(&base).expect("mkdir");
        std::fs::write(base.join("kustomization.yaml"), "resources: []\n").expect("kust");
        let spec = CrSpec {
            manifests_root: dir.path().display().to_string(),
            configs: configs(&[("audit", &[("a", "1")]), ("qliksense", &[("b", "2")])]),
            ..CrSpec::default()
        };
        process_configs(&spec).expect("process");
        process_configs(&spec).expect("second pass");
        assert!(base.join("audit.yaml").is_file());
        assert!(base.join("qliksense.yaml").is_file());
        assert_eq!(
            resources_list(&base.join("kustomization.yaml")).expect("list"),
            vec!["audit.yaml".to_string(), "qliksense.yaml".to_string()]
        );
    }
}
