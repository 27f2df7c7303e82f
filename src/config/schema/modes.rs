use crate::context::CognitiveMode;
use crate::error::ConfigError;
use crate::safety::{ValidationLevel, ValidationPolicy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Which runtime drives a mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExecutionStrategy {
    /// Ordered unit chain.
    #[default]
    Linear,
    /// Node graph with runtime branch pruning.
    Graph,
}

/// One named unit in a mode's list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub config: Value,
}

fn default_true() -> bool {
    true
}

impl UnitConfig {
    pub fn enabled(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            config: Value::Null,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModeConfig {
    #[serde(default)]
    pub execution: ExecutionStrategy,
    /// Graph definition file used when `execution = "graph"`.
    #[serde(default)]
    pub graph: Option<String>,
    #[serde(default)]
    pub validation: ValidationPolicy,
    #[serde(default)]
    pub units: Vec<UnitConfig>,
}

impl ModeConfig {
    pub fn enabled_units(&self) -> impl Iterator<Item = &UnitConfig> {
        self.units.iter().filter(|unit| unit.enabled)
    }

    pub fn validate(&self, mode: CognitiveMode) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for unit in &self.units {
            if unit.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "mode {mode} has a unit with an empty name"
                )));
            }
            if !seen.insert(unit.name.as_str()) {
                return Err(ConfigError::DuplicateUnit {
                    mode: mode.to_string(),
                    unit: unit.name.clone(),
                });
            }
        }

        self.validation
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("mode {mode}: {e}")))?;
        Ok(())
    }
}

/// Per-mode sections. Every recognized mode must be present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModesConfig {
    pub dual: Option<ModeConfig>,
    pub agent: Option<ModeConfig>,
    pub emulation: Option<ModeConfig>,
}

impl Default for ModesConfig {
    fn default() -> Self {
        Self {
            dual: Some(ModeConfig::default()),
            agent: Some(ModeConfig {
                execution: ExecutionStrategy::Linear,
                validation: ValidationPolicy {
                    require_consistency: false,
                    ..ValidationPolicy::default()
                },
                ..ModeConfig::default()
            }),
            emulation: Some(ModeConfig {
                validation: ValidationPolicy::pass_through(),
                ..ModeConfig::default()
            }),
        }
    }
}

impl ModesConfig {
    pub fn get(&self, mode: CognitiveMode) -> Option<&ModeConfig> {
        match mode {
            CognitiveMode::Dual => self.dual.as_ref(),
            CognitiveMode::Agent => self.agent.as_ref(),
            CognitiveMode::Emulation => self.emulation.as_ref(),
        }
    }

    pub fn get_mut(&mut self, mode: CognitiveMode) -> Option<&mut ModeConfig> {
        match mode {
            CognitiveMode::Dual => self.dual.as_mut(),
            CognitiveMode::Agent => self.agent.as_mut(),
            CognitiveMode::Emulation => self.emulation.as_mut(),
        }
    }

    pub fn validation_level(&self, mode: CognitiveMode) -> ValidationLevel {
        self.get(mode)
            .map_or(ValidationLevel::None, |config| config.validation.level)
    }
}
