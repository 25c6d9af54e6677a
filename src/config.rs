//! # Operator Configuration
//!
//! Process-level settings loaded once at startup and handed to the
//! controller. Nothing below the binary reads the environment directly.
//!
//! | Variable       | Field                |
//! |----------------|----------------------|
//! | `EJSON_KEYDIR` | `ejson_key_dir`      |
//! | `EJSON_KEY`    | `ejson_private_key`  |
//! | `YAML_CONF`    | `cr_yaml`            |

use crate::constants::{DEFAULT_EJSON_KEY_DIR, DEFAULT_NAMESPACE, DEFAULT_RELEASE_NAME};
use std::fmt;
use std::path::PathBuf;
use zeroize::Zeroizing;

/// Operator-level configuration
#[derive(Clone)]
pub struct OperatorConfig {
    /// Directory holding the ejson private key file, named by its public key
    pub ejson_key_dir: PathBuf,
    /// Private key injected by the environment, used to pick the key file
    pub ejson_private_key: Option<Zeroizing<String>>,
    /// Inline custom resource document
    pub cr_yaml: Option<String>,
    /// Release label put on the backup object when the CR has no name
    pub release_label_default: String,
    /// Namespace used for the backup object when the CR has none
    pub default_namespace: String,
}

impl fmt::Debug for OperatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorConfig")
            .field("ejson_key_dir", &self.ejson_key_dir)
            .field(
                "ejson_private_key",
                &self.ejson_private_key.as_ref().map(|_| "<redacted>"),
            )
            .field("cr_yaml", &self.cr_yaml.as_ref().map(String::len))
            .field("release_label_default", &self.release_label_default)
            .field("default_namespace", &self.default_namespace)
            .finish()
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            ejson_key_dir: PathBuf::from(DEFAULT_EJSON_KEY_DIR),
            ejson_private_key: None,
            cr_yaml: None,
            release_label_default: DEFAULT_RELEASE_NAME.to_string(),
            default_namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl OperatorConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            ejson_key_dir: PathBuf::from(env_var_or_default_str(
                "EJSON_KEYDIR",
                DEFAULT_EJSON_KEY_DIR,
            )),
            ejson_private_key: env_var_non_empty("EJSON_KEY").map(Zeroizing::new),
            cr_yaml: env_var_non_empty("YAML_CONF"),
            release_label_default: env_var_or_default_str(
                "QUST_RELEASE_LABEL_DEFAULT",
                DEFAULT_RELEASE_NAME,
            ),
            default_namespace: env_var_or_default_str("QUST_DEFAULT_NAMESPACE", DEFAULT_NAMESPACE),
        }
    }

    /// Builder-style override of the key directory
    #[must_use]
    pub fn with_ejson_key_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ejson_key_dir = dir.into();
        self
    }

    /// Builder-style override of the injected private key
    #[must_use]
    pub fn with_ejson_private_key(mut self, key: impl Into<String>) -> Self {
        self.ejson_private_key = Some(Zeroizing::new(key.into()));
        self
    }
}

/// Read environment variable as string or return default.
/// Empty values count as unset.
fn env_var_or_default_str(key: &str, default: &str) -> String {
    env_var_non_empty(key).unwrap_or_else(|| default.to_string())
}

fn env_var_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OperatorConfig::default();
        assert_eq!(config.ejson_key_dir, PathBuf::from("/opt/ejson/keys"));
        assert!(config.ejson_private_key.is_none());
        assert_eq!(config.release_label_default, "qliksense");
        assert_eq!(config.default_namespace, "default");
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let config = OperatorConfig::default().with_ejson_private_key("super-secret-key");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret-key"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_builder_overrides_key_dir() {
        let config = OperatorConfig::default().with_ejson_key_dir("/tmp/keys");
        assert_eq!(config.ejson_key_dir, PathBuf::from("/tmp/keys"));
    }
}
