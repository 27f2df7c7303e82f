use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a failed unit does to the rest of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureMode {
    /// Abort on the first validation or execution failure.
    #[default]
    FailFast,
    /// Record the failure and pass a null payload downstream.
    Continue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Hard ceiling for one run, in milliseconds.
    pub timeout_ms: u64,
    pub failure_mode: FailureMode,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            failure_mode: FailureMode::FailFast,
        }
    }
}

impl RuntimeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.timeout_ms == 0 {
            anyhow::bail!("runtime.timeout_ms must be greater than zero");
        }
        Ok(())
    }
}
