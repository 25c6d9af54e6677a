//! Common test utilities for integration tests
//!
//! Builds throwaway manifest trees laid out like the base manifest
//! repository, plus a separate ejson key directory.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use qust_operator::config::OperatorConfig;
use qust_operator::controller::KeyLifecycle;
use qust_operator::crd::{CrSpec, Qliksense};
use qust_operator::keys::DefaultKeyGenerator;
use qust_operator::state::InMemoryBackupStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const KEY_SERVICES: &[&str] = &["audit", "edge-auth", "elastic-infra"];

const RELEASE_NAME_TEMPLATE: &str = "apiVersion: qlik.com/v1
kind: SelectivePatch
metadata:
  name: release-name
enabled: true
patches:
- target:
    kind: LabelTransformer
  patch: |-
    labels:
      release: qliksense
";

const STORAGE_CLASS_TEMPLATE: &str = "apiVersion: qlik.com/v1
kind: SelectivePatch
metadata:
  name: storage-class
patches:
- target:
    kind: SelectivePatch
    name: storageClassName
  patch: |-
    - op: replace
      path: /enabled
      value: false
";

const KEYS_PATCH: &str = r#"apiVersion: qlik.com/v1
kind: SelectivePatch
metadata:
  name: keys-configs
enabled: true
patches:
- target:
    kind: SuperConfigMap
    name: keys-configs
  patch: |
    apiVersion: qlik.com/v1
    kind: SuperConfigMap
    metadata:
      name: keys-configs
    data: {}
"#;

const DISABLED_TRANSFORMER: &str = "apiVersion: qlik.com/v1
kind: SelectivePatch
metadata:
  name: caCertificates
  labels:
    key: caCertificates
enabled: false
patches: []
";

/// A manifests root with an empty `.operator` overlay tree
pub struct ManifestTree {
    pub root: TempDir,
    pub key_dir: TempDir,
}

impl ManifestTree {
    pub fn new() -> Self {
        let root = TempDir::new().expect("manifests root");
        let key_dir = TempDir::new().expect("key dir");
        let operator = root.path().join(".operator");

        for sub in ["configs", "secrets", "transformers"] {
            let dir = operator.join(sub);
            std::fs::create_dir_all(&dir).expect("overlay dir");
            std::fs::write(dir.join("kustomization.yaml"), "resources: []\n").expect("kustomization");
        }
        let transformers = operator.join("transformers");
        std::fs::write(transformers.join("release-name.yaml"), RELEASE_NAME_TEMPLATE).expect("release template");
        std::fs::write(transformers.join("storage-class.yaml"), STORAGE_CLASS_TEMPLATE).expect("storage template");

        let keys = operator.join("keys");
        for svc in KEY_SERVICES {
            std::fs::create_dir_all(keys.join("secrets").join(svc)).expect("key service dir");
        }
        std::fs::create_dir_all(keys.join("configs/keys")).expect("keys configs");
        std::fs::write(keys.join("configs/keys/selectivepatch.yaml"), KEYS_PATCH).expect("keys patch");

        let base = root.path().join("manifests/base/transformers");
        std::fs::create_dir_all(base.join("caCertificates")).expect("base transformer");
        std::fs::write(
            base.join("kustomization.yaml"),
            "resources:\n- caCertificates\n- storageClassName\n",
        )
        .expect("base kustomization");
        std::fs::write(
            base.join("caCertificates/kustomization.yaml"),
            "resources:\n- selectivepatch.yaml\n",
        )
        .expect("transformer kustomization");
        std::fs::write(base.join("caCertificates/selectivepatch.yaml"), DISABLED_TRANSFORMER)
            .expect("transformer patch");

        Self { root, key_dir }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn operator(&self, sub: &str) -> PathBuf {
        self.path().join(".operator").join(sub)
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path().join(relative))
            .unwrap_or_else(|e| panic!("reading {relative}: {e}"))
    }

    pub fn key_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.key_dir.path())
            .expect("list key dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// CR named `qlik-test` in namespace `qlik` rooted at this tree
    pub fn cr(&self, spec: CrSpec) -> Qliksense {
        let mut cr = Qliksense::new(
            "qlik-test",
            CrSpec {
                manifests_root: self.path().display().to_string(),
                ..spec
            },
        );
        cr.metadata.namespace = Some("qlik".to_string());
        cr
    }

    pub fn config(&self) -> OperatorConfig {
        OperatorConfig::default().with_ejson_key_dir(self.key_dir.path())
    }

    pub fn lifecycle(&self, store: Arc<InMemoryBackupStore>) -> KeyLifecycle {
        KeyLifecycle::new(self.config(), store, Arc::new(DefaultKeyGenerator))
    }
}
