//! # Errors
//!
//! Error taxonomy shared by the patch renderers, the archive codec and the
//! key lifecycle controller.
//!
//! Every leaf failure is wrapped with the operation it came from. The only
//! error a caller is expected to branch on is [`OperatorError::NotFound`]
//! (see [`OperatorError::is_not_found`]), which the restore paths use to fall
//! back to key generation.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T, E = OperatorError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum OperatorError {
    /// A directory or template owned by the base manifest repository is absent
    #[error("required path does not exist: {}", path.display())]
    PreconditionMissing { path: PathBuf },

    #[error("cannot merge two empty selective patches")]
    EmptyMerge,

    #[error("cannot merge selective patches [ {left} != {right} ]")]
    IdentityMismatch { left: String, right: String },

    /// Missing backup object or missing key inside it
    #[error("not found: {0}")]
    NotFound(String),

    #[error("failed to look up secret {secret}/{key}: {source}")]
    SecretLookup {
        secret: String,
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("no usable ejson key found: {0}")]
    NoUsableKeyFound(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Yaml {
        context: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("archive {context}: {source}")]
    Archive {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ejson encryption failed: {0}")]
    Encryption(String),

    #[error("backup store error: {0}")]
    Store(String),
}

impl OperatorError {
    /// True for errors that mean "nothing was backed up yet"
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, OperatorError::NotFound(_))
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        OperatorError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn yaml(context: impl Into<String>, source: serde_yaml::Error) -> Self {
        OperatorError::Yaml {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        OperatorError::Json {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn missing(path: &Path) -> Self {
        OperatorError::PreconditionMissing {
            path: path.to_path_buf(),
        }
    }
}

/// Attach an operation description to `std::io` failures
pub(crate) trait IoContext<T> {
    fn io_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T> IoContext<T> for std::result::Result<T, std::io::Error> {
    fn io_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| OperatorError::io(f(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_classified() {
        assert!(OperatorError::NotFound("key: ejson-keys".to_string()).is_not_found());
        assert!(!OperatorError::Store("connection refused".to_string()).is_not_found());
        assert!(!OperatorError::EmptyMerge.is_not_found());
    }

    #[test]
    fn test_identity_mismatch_message_names_both_patches() {
        let err = OperatorError::IdentityMismatch {
            left: "a".to_string(),
            right: "b".to_string(),
        };
        assert_eq!(err.to_string(), "cannot merge selective patches [ a != b ]");
    }

    #[test]
    fn test_io_context_wraps_source() {
        let res: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let err = res.io_context(|| "writing configs".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "writing configs: denied");
    }
}
