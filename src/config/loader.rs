//! Configuration Loader
//!
//! Environment-aware configuration loading: YAML file discovery, environment
//! detection, and recursive merging of per-environment override sections into
//! the base document.

use crate::config::EngineConfig;
use crate::error::{CoreError, Result};
use serde_yaml::Value as YamlValue;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const CONFIG_FILE_NAMES: [&str; 2] = ["taskgrid-config.yaml", "taskgrid-config.yml"];

/// Environment sections recognized in the configuration file; these keys hold
/// overrides and are never part of the engine configuration itself
const ENVIRONMENT_SECTIONS: [&str; 3] = ["development", "test", "production"];

/// Loaded engine configuration plus the environment it was resolved for
#[derive(Debug)]
pub struct ConfigManager {
    config: EngineConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> Result<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> Result<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with an explicit
    /// environment, which keeps tests independent of process environment
    /// variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> Result<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            environment,
            directory = %config_directory.display(),
            "Loading engine configuration"
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment,
            workers_per_activity = config.execution.workers_per_activity,
            default_bucket_size = config.bucketing.default_bucket_size,
            "🔧 Engine configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Like [`load`](Self::load), but a missing configuration file yields the
    /// defaults instead of an error. Parse and validation failures in a file
    /// that does exist still fail loudly.
    pub fn load_or_default() -> Result<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        let config_directory = PathBuf::from("config");

        if Self::find_config_file(&config_directory).is_none() {
            warn!(
                environment,
                "No configuration file found, running with defaults"
            );
            return Ok(Arc::new(ConfigManager {
                config: EngineConfig::default(),
                environment,
                config_directory,
            }));
        }
        Self::load_from_directory_with_env(Some(config_directory), &environment)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect current environment: TASKGRID_ENV || APP_ENV || 'development'
    fn detect_environment() -> String {
        env::var("TASKGRID_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn find_config_file(config_directory: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| config_directory.join(name))
            .find(|path| path.exists())
    }

    /// Load the base document and merge the current environment's override
    /// section into it
    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
    ) -> Result<EngineConfig> {
        let config_file = Self::find_config_file(config_directory).ok_or_else(|| {
            CoreError::ConfigurationError(format!(
                "No configuration file ({}) found in {}",
                CONFIG_FILE_NAMES.join(" or "),
                config_directory.display()
            ))
        })?;

        let yaml_content = std::fs::read_to_string(&config_file).map_err(|e| {
            CoreError::ConfigurationError(format!(
                "Cannot read configuration file {}: {e}",
                config_file.display()
            ))
        })?;

        let mut yaml_data: YamlValue = serde_yaml::from_str(&yaml_content).map_err(|e| {
            CoreError::ConfigurationError(format!(
                "Invalid YAML in {}: {e}",
                config_file.display()
            ))
        })?;

        if let Some(overrides) = yaml_data.get(environment).cloned() {
            debug!(environment, "Applying environment override section");
            Self::merge_yaml_values(&mut yaml_data, overrides);
        }

        // Environment sections are overlay material, not configuration keys
        if let YamlValue::Mapping(ref mut map) = yaml_data {
            for section in ENVIRONMENT_SECTIONS {
                map.remove(section);
            }
        }

        serde_yaml::from_value(yaml_data).map_err(|e| {
            CoreError::ConfigurationError(format!(
                "Configuration in {} does not match the engine schema: {e}",
                config_file.display()
            ))
        })
    }

    /// Recursively merge override values into the base document; mappings
    /// merge key-wise, everything else is replaced wholesale
    fn merge_yaml_values(base: &mut YamlValue, override_value: YamlValue) {
        match (&mut *base, override_value) {
            (YamlValue::Mapping(base_map), YamlValue::Mapping(override_map)) => {
                for (key, value) in override_map {
                    if let Some(existing) = base_map.get_mut(&key) {
                        Self::merge_yaml_values(existing, value);
                    } else {
                        base_map.insert(key, value);
                    }
                }
            }
            (base_ref, override_val) => {
                *base_ref = override_val;
            }
        }
    }
}
