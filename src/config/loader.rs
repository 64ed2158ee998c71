//! Configuration Loader
//!
//! Environment-aware configuration loading. Sources are layered in order:
//! built-in defaults, `<dir>/engine.yaml`, `<dir>/engine.<environment>.yaml`,
//! then `PHASE_ENGINE__*` environment variables (`__` separates nesting,
//! e.g. `PHASE_ENGINE__WORKER_POOL__MAX_CONCURRENT_DELIVERIES=4`).

use super::error::{ConfigResult, ConfigurationError};
use super::EngineConfig;
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const BASE_FILE_NAME: &str = "engine";
const ENV_PREFIX: &str = "PHASE_ENGINE";

/// Loaded, validated engine configuration
#[derive(Debug)]
pub struct ConfigManager {
    config: EngineConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    /// Useful for testing without modifying global environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading engine configuration"
        );

        let mut config = Self::load_and_merge_config(&config_directory, environment)?;
        config.environment = environment.to_string();
        config.validate()?;

        info!(
            environment = %environment,
            max_concurrent_deliveries = config.worker_pool.max_concurrent_deliveries,
            in_phases = config.phases.in_flow.len(),
            out_phases = config.phases.out_flow.len(),
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(config: EngineConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            environment: config.environment.clone(),
            config,
            config_directory: PathBuf::from("config"),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    fn load_and_merge_config(directory: &Path, environment: &str) -> ConfigResult<EngineConfig> {
        if !directory.is_dir() {
            return Err(ConfigurationError::config_file_not_found(
                directory.display().to_string(),
            ));
        }

        let base_path = directory.join(format!("{BASE_FILE_NAME}.yaml"));
        let env_path = directory.join(format!("{BASE_FILE_NAME}.{environment}.yaml"));

        if !base_path.is_file() {
            debug!(path = %base_path.display(), "Base configuration file absent, using defaults");
        }

        let defaults = Config::try_from(&EngineConfig::default())
            .map_err(|e| ConfigurationError::load_error("defaults", e))?;

        let merged = Config::builder()
            .add_source(defaults)
            .add_source(File::from(base_path.as_path()).format(FileFormat::Yaml).required(false))
            .add_source(File::from(env_path.as_path()).format(FileFormat::Yaml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("engine.roles")
                    .with_list_parse_key("phases.in_flow")
                    .with_list_parse_key("phases.out_flow")
                    .with_list_parse_key("phases.in_fault_flow")
                    .with_list_parse_key("phases.out_fault_flow")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::load_error(directory.display().to_string(), e))?;

        merged
            .try_deserialize::<EngineConfig>()
            .map_err(|e| ConfigurationError::DeserializationError {
                error: e.to_string(),
            })
    }

    /// Detect the current environment
    pub fn detect_environment() -> String {
        env::var("PHASE_ENGINE_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_directory_is_reported() {
        let result =
            ConfigManager::load_from_directory_with_env(Some("/nonexistent/engine".into()), "test");
        assert!(matches!(
            result,
            Err(ConfigurationError::ConfigFileNotFound { .. })
        ));
    }

    #[test]
    fn test_empty_directory_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap();

        assert_eq!(manager.environment(), "test");
        assert_eq!(manager.config().phases, super::super::PhaseLayout::default());
    }

    #[test]
    fn test_environment_file_overrides_base() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("engine.yaml"),
            "worker_pool:\n  max_concurrent_deliveries: 8\nengine:\n  roles: [\"urn:node:gateway\"]\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("engine.production.yaml"),
            "worker_pool:\n  max_concurrent_deliveries: 64\nlogging:\n  json: true\n",
        )
        .unwrap();

        let manager = ConfigManager::load_from_directory_with_env(
            Some(dir.path().to_path_buf()),
            "production",
        )
        .unwrap();

        let config = manager.config();
        assert_eq!(config.worker_pool.max_concurrent_deliveries, 64);
        assert!(config.logging.json);
        assert_eq!(config.engine.roles, vec!["urn:node:gateway".to_string()]);
    }

    #[test]
    fn test_invalid_layout_fails_validation() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("engine.yaml"),
            "phases:\n  dispatch_phase: Routing\n",
        )
        .unwrap();

        let result =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test");
        assert!(matches!(
            result,
            Err(ConfigurationError::InvalidValue { .. })
        ));
    }
}
