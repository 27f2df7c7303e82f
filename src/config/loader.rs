use super::PipelineConfig;
use crate::error::ConfigError;
use directories::UserDirs;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = ".cogpipe";
const CONFIG_FILE: &str = "config.toml";

impl PipelineConfig {
    /// Default location: `~/.cogpipe/config.toml`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .ok_or_else(|| ConfigError::Load("could not find home directory".into()))?;
        Ok(home.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load the default config file, writing the built-in defaults first if
    /// none exists yet.
    pub fn load_or_init() -> Result<Self, ConfigError> {
        let config_path = Self::default_path()?;
        if config_path.exists() {
            return Self::load_from_path(&config_path);
        }

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let config = Self {
            config_path,
            ..Self::default()
        };
        config.validate()?;
        config.save()?;
        Ok(config)
    }

    /// Read, parse and validate the file at `path`.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ConfigError::Load(format!("failed to read config at {}: {e}", path.display()))
        })?;
        let mut config = Self::from_toml_str(&contents)?;
        config.config_path = path.to_path_buf();
        Ok(config)
    }

    /// Parse and validate TOML text. Warnings are logged, not returned.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        for warning in config.validate()? {
            tracing::warn!(warning = %warning, "config.validation_warning");
        }
        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let toml_str =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        fs::write(&self.config_path, toml_str)?;
        Ok(())
    }
}
