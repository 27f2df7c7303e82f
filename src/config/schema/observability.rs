use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// "none" | "log"
    pub backend: String,
    /// Directory for JSONL audit files. `~` is expanded.
    pub audit_dir: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            backend: "log".into(),
            audit_dir: None,
        }
    }
}

impl ObservabilityConfig {
    pub fn resolved_audit_dir(&self) -> Option<PathBuf> {
        self.audit_dir
            .as_deref()
            .map(|dir| PathBuf::from(shellexpand::tilde(dir).into_owned()))
    }
}
