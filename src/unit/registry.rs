use super::traits::ExecutionUnit;
use crate::config::ModeConfig;
use crate::context::CognitiveMode;
use crate::error::ConfigError;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A unit paired with the static configuration block it runs with.
#[derive(Clone)]
pub struct ConfiguredUnit {
    pub unit: Arc<dyn ExecutionUnit>,
    pub config: Value,
}

impl ConfiguredUnit {
    pub fn new(unit: Arc<dyn ExecutionUnit>, config: Value) -> Self {
        Self { unit, config }
    }

    pub fn name(&self) -> &str {
        self.unit.name()
    }
}

impl std::fmt::Debug for ConfiguredUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfiguredUnit")
            .field("name", &self.unit.name())
            .field("version", &self.unit.version())
            .field("config", &self.config)
            .finish()
    }
}

/// Name-keyed lookup for unit implementations.
#[derive(Default)]
pub struct UnitRegistry {
    units: HashMap<String, Arc<dyn ExecutionUnit>>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit. Replaces any existing unit with the same name.
    pub fn register(&mut self, unit: Arc<dyn ExecutionUnit>) {
        self.units.insert(unit.name().to_string(), unit);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ExecutionUnit>> {
        self.units.get(name)
    }

    /// Return sorted list of registered unit names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.units.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve a mode's configured unit list into runnable units, in order.
    ///
    /// Disabled entries are skipped. Unknown or duplicate names are fatal.
    pub fn assemble(
        &self,
        mode: CognitiveMode,
        mode_config: &ModeConfig,
    ) -> Result<Vec<ConfiguredUnit>, ConfigError> {
        let mut seen = HashSet::new();
        let mut assembled = Vec::new();

        for entry in &mode_config.units {
            if !seen.insert(entry.name.as_str()) {
                return Err(ConfigError::DuplicateUnit {
                    mode: mode.to_string(),
                    unit: entry.name.clone(),
                });
            }
            if !entry.enabled {
                continue;
            }
            let Some(unit) = self.units.get(&entry.name) else {
                return Err(ConfigError::UnknownUnit {
                    mode: mode.to_string(),
                    unit: entry.name.clone(),
                });
            };
            assembled.push(ConfiguredUnit::new(Arc::clone(unit), entry.config.clone()));
        }

        if assembled.is_empty() {
            tracing::warn!(mode = %mode, "mode has no enabled units");
        }

        Ok(assembled)
    }
}
