//! Config loading, validation, and resolution.

use super::model::Config;
use crate::error::{Result, SmError};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV_VAR: &str = "SMCORE_CONFIG";

/// Config file consulted when neither a flag nor the environment names one.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/smcore/config.yaml";

impl Config {
    /// Load config from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            SmError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Resolve the config for the admin binary.
    ///
    /// Order: explicit path, then `$SMCORE_CONFIG`, then the default path if
    /// it exists, else built-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            return Self::load(PathBuf::from(path));
        }

        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            return Self::load(default_path);
        }

        Ok(Self::default())
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes as unit, not as an empty map.
        let config: Config = if yaml.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(yaml)
                .map_err(|e| SmError::Config(format!("failed to parse config YAML: {}", e)))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| SmError::Config(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values.
    ///
    /// - every directory must be absolute
    /// - intervals, timeouts and retry counts must be positive
    pub fn validate(&self) -> Result<()> {
        let dirs = [
            ("lock_dir", &self.lock_dir),
            ("refcount_dir", &self.refcount_dir),
            ("journal_dir", &self.journal_dir),
            ("queue_dir", &self.queue_dir),
            ("sr_dir", &self.sr_dir),
            ("fairlock_socket_dir", &self.fairlock_socket_dir),
        ];
        for (key, dir) in dirs {
            if !dir.is_absolute() {
                return Err(SmError::Config(format!(
                    "config validation failed: {} must be an absolute path (found '{}')",
                    key,
                    dir.display()
                )));
            }
        }

        if self.queue_poll_interval_ms == 0 {
            return Err(SmError::Config(
                "config validation failed: queue_poll_interval_ms must be greater than 0"
                    .to_string(),
            ));
        }

        if self.fairlock_start_timeout_ms == 0 {
            return Err(SmError::Config(
                "config validation failed: fairlock_start_timeout_ms must be greater than 0"
                    .to_string(),
            ));
        }

        if self.lock_open_retries == 0 || self.refcount_write_retries == 0 {
            return Err(SmError::Config(
                "config validation failed: retry counts must be greater than 0".to_string(),
            ));
        }

        if self.fairlock_service_manager.trim().is_empty() {
            return Err(SmError::Config(
                "config validation failed: fairlock_service_manager must be non-empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Lock queue back-off as a `Duration`.
    pub fn queue_poll_interval(&self) -> Duration {
        Duration::from_millis(self.queue_poll_interval_ms)
    }

    /// Broker start timeout as a `Duration`.
    pub fn fairlock_start_timeout(&self) -> Duration {
        Duration::from_millis(self.fairlock_start_timeout_ms)
    }
}
