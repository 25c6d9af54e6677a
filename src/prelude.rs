//! # Prelude
//!
//! Commonly used types, importable with `use qust_operator::prelude::*;`.

pub use crate::crd::*;

pub use crate::config::OperatorConfig;
pub use crate::controller::{render_all_patches, KeyLifecycle, RenderSummary};
pub use crate::error::{OperatorError, Result};
pub use crate::keys::{DefaultKeyGenerator, KeyGenerator};
pub use crate::qust::{SelectivePatch, Selector};
pub use crate::resolver::{KubeSecretResolver, SecretResolver};
pub use crate::state::{BackupStore, InMemoryBackupStore, KubeSecretStore};
