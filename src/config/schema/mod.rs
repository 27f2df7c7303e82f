mod modes;
mod observability;
mod reasoning;
mod runtime;

pub use modes::{ExecutionStrategy, ModeConfig, ModesConfig, UnitConfig};
pub use observability::ObservabilityConfig;
pub use reasoning::{REASONING_ITERATION_HARD_CAP, ReasoningConfig};
pub use runtime::{FailureMode, RuntimeConfig};

use crate::context::CognitiveMode;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Path the config was loaded from. Computed at runtime, never serialized.
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub reasoning: ReasoningConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    pub modes: ModesConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            runtime: RuntimeConfig::default(),
            reasoning: ReasoningConfig::default(),
            observability: ObservabilityConfig::default(),
            modes: ModesConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Configuration for `mode`; a missing mode is a configuration failure.
    pub fn mode(&self, mode: CognitiveMode) -> Result<&ModeConfig, ConfigError> {
        self.modes
            .get(mode)
            .ok_or_else(|| ConfigError::MissingMode(mode.to_string()))
    }

    /// Validate load-time invariants. Returns non-fatal warnings.
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        self.runtime
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.reasoning
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let mut warnings = Vec::new();
        for mode in CognitiveMode::ALL {
            let mode_config = self.mode(mode)?;
            mode_config.validate(mode)?;
            if mode_config.enabled_units().next().is_none()
                && mode_config.execution == ExecutionStrategy::Linear
            {
                warnings.push(format!("mode {mode} has no enabled units"));
            }
        }
        Ok(warnings)
    }
}
