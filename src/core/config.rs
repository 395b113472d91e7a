//! Application configuration management

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::engine::EngineSettings;
use super::options::DownloadOptions;
use super::progress_tracker::MIN_RELAY_INTERVAL;

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Main application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineSettings,
    /// Download selections used when the command line does not override them
    pub defaults: DownloadOptions,
    pub progress: ProgressConfig,
    pub logging: LoggingConfig,
}

/// Progress relay configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProgressConfig {
    /// Minimum milliseconds between two relayed progress updates
    pub throttle_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String, // "error", "warn", "info", "debug", "trace"
    pub log_to_file: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            throttle_ms: MIN_RELAY_INTERVAL.as_millis() as u64,
        }
    }
}

impl ProgressConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            log_to_file: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// Load configuration from `config_path`, creating it if missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

            let config: AppConfig =
                serde_json::from_str(&content).with_context(|| "Failed to parse config file")?;

            tracing::info!("Loaded configuration from: {:?}", config_path);
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(config_path)?;
            tracing::info!("Created default configuration at: {:?}", config_path);
            Ok(config)
        }
    }

    /// Load and validate, falling back to defaults on any problem
    pub fn load_or_default(config_path: Option<&Path>) -> Self {
        let (config, fallback) = Self::load_or_fallback(config_path);
        if let Some(reason) = fallback {
            tracing::warn!("{}", reason);
        }
        config
    }

    /// Like [`AppConfig::load_or_default`], but hands the fallback reason to
    /// the caller instead of logging it. Used before logging is installed.
    pub fn load_or_fallback(config_path: Option<&Path>) -> (Self, Option<String>) {
        let loaded = match config_path {
            Some(path) => Self::load_from(path),
            None => Self::load(),
        };

        match loaded {
            Ok(cfg) => match cfg.validate() {
                Ok(()) => (cfg, None),
                Err(err) => (
                    Self::default(),
                    Some(format!(
                        "Invalid configuration detected ({}), falling back to defaults",
                        err
                    )),
                ),
            },
            Err(err) => (
                Self::default(),
                Some(format!(
                    "Failed to load configuration from disk: {:#}. Using defaults",
                    err
                )),
            ),
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    /// Save configuration to `config_path`
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = self.export()?;

        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        tracing::info!("Saved configuration to: {:?}", config_path);
        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "ytdlp-queue", "ytdlp-queue")
            .with_context(|| "Failed to get project directories")
    }

    /// Get the path to the configuration file
    pub fn get_config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.json"))
    }

    /// Get the logs directory
    pub fn get_logs_dir() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().join("logs"))
    }

    /// Reset configuration at `config_path` to defaults
    pub fn reset(config_path: &Path) -> Result<Self> {
        let config = Self::default();
        config.save_to(config_path)?;
        tracing::info!("Reset configuration to defaults");
        Ok(config)
    }

    /// Export configuration as JSON string
    pub fn export(&self) -> Result<String> {
        serde_json::to_string_pretty(self).with_context(|| "Failed to export configuration")
    }

    /// Parse and validate configuration from a JSON string
    pub fn import(json: &str) -> Result<Self> {
        let config: AppConfig =
            serde_json::from_str(json).with_context(|| "Failed to parse imported configuration")?;

        config
            .validate()
            .with_context(|| "Imported configuration is invalid")?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if let Some(program) = &self.engine.program {
            if program.trim().is_empty() {
                anyhow::bail!("Engine program must not be blank when set");
            }
        }

        if self.engine.info_timeout_seconds == 0 || self.engine.info_timeout_seconds > 3600 {
            anyhow::bail!("Info timeout should be between 1 and 3600 seconds");
        }

        if self.engine.retries > 100 || self.engine.fragment_retries > 100 {
            anyhow::bail!("Retry counts should not exceed 100");
        }

        if self.progress.interval() < MIN_RELAY_INTERVAL {
            anyhow::bail!(
                "Progress throttle must be at least {} ms",
                MIN_RELAY_INTERVAL.as_millis()
            );
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Invalid log level: must be 'error', 'warn', 'info', 'debug', or 'trace'"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.progress.throttle_ms, 150);
        assert_eq!(config.engine.retries, 3);
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let json = config.export().unwrap();
        let parsed_config = AppConfig::import(&json).unwrap();
        assert_eq!(config, parsed_config);
    }

    #[test]
    fn test_invalid_config_validation() {
        let mut config = AppConfig::default();
        config.progress.throttle_ms = 100;
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.engine.info_timeout_seconds = 0;
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.engine.program = Some("  ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = AppConfig::import(r#"{"progress": {"throttle_ms": 500}}"#).unwrap();
        assert_eq!(config.progress.throttle_ms, 500);
        assert_eq!(config.logging, LoggingConfig::default());
        assert!(config.defaults.allow_playlists);
    }
}
