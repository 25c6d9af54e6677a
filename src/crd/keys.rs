//! # Key Rotation Policy

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// What a render pass does with key material
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeysAction {
    /// Use what is on disk or injected by the environment; never generate, back up or restore
    DoNothing,
    /// Restore from the backup object, generate and back up when nothing was backed up yet
    #[default]
    RestoreOrRotate,
    /// Always generate fresh material and back it up
    ForceRotate,
}

impl KeysAction {
    /// Parse a user supplied policy. Unknown values fall back to
    /// [`KeysAction::RestoreOrRotate`].
    #[must_use]
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "forcerotate" | "yes" | "true" => KeysAction::ForceRotate,
            "donothing" | "none" => KeysAction::DoNothing,
            "" | "restoreorrotate" | "no" | "false" => KeysAction::RestoreOrRotate,
            other => {
                warn!(
                    value = other,
                    "Unknown key rotation policy, falling back to RestoreOrRotate"
                );
                KeysAction::RestoreOrRotate
            }
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            KeysAction::DoNothing => "DoNothing",
            KeysAction::RestoreOrRotate => "RestoreOrRotate",
            KeysAction::ForceRotate => "ForceRotate",
        }
    }
}

impl fmt::Display for KeysAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
