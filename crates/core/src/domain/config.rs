//! Configuration management for mbcomp
//!
//! This module provides:
//! - The on-disk TOML document (engine settings plus one parameter set)
//! - Async load/save through `tokio::fs`
//! - `ConfigManager`, which resolves the per-user config file and recovers
//!   from missing or corrupt files

use crate::domain::audio::ProcessSpec;
use crate::domain::params::EngineParameters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Stream settings used when rendering
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Frames per processing block
    pub block_size: usize,

    /// Sample rate used when the source does not dictate one
    pub sample_rate: f32,

    /// Channel count used when the source does not dictate one
    pub channels: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_size: 512,
            sample_rate: 48000.0,
            channels: 2,
        }
    }
}

impl EngineConfig {
    pub fn process_spec(&self) -> ProcessSpec {
        ProcessSpec::new(self.sample_rate, self.block_size, self.channels)
    }
}

/// Complete mbcomp configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MbcompConfig {
    pub engine: EngineConfig,
    pub parameters: EngineParameters,
}

impl MbcompConfig {
    /// Factory default configuration
    pub fn factory_default() -> Self {
        Self::default()
    }

    /// Reject settings the engine cannot be prepared with
    ///
    /// Parameter values out of their control ranges are not errors; they
    /// are clamped on load. Crossover ordering is.
    pub fn validate(&self) -> Result<()> {
        self.engine
            .process_spec()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.parameters
            .crossover
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }

    /// Parse a TOML document, validate it and clamp parameter values
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(contents)?;
        config.validate()?;
        config.parameters = config.parameters.sanitized();
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config = Self::from_toml_str(&contents)?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let toml_str = self.to_toml_string()?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }
}

/// Manager for the main mbcomp config file
///
/// Defaults to `<config_dir>/mbcomp/config.toml`.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Manage `config.toml` inside `config_dir`
    pub fn new(config_dir: PathBuf) -> Self {
        Self {
            config_path: config_dir.join("config.toml"),
        }
    }

    /// Manage an explicit config file
    pub fn with_file(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Manager for the per-user default location
    pub fn user_default() -> Result<Self> {
        Ok(Self::new(Self::default_config_dir()?))
    }

    /// Get the default config directory path
    ///
    /// Returns `~/.config/mbcomp` on Linux, the Application Support
    /// directory on macOS and `%APPDATA%\mbcomp` on Windows.
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("mbcomp"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    /// Get the config file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Path a corrupt config file is copied to before falling back
    pub fn backup_path(&self) -> PathBuf {
        self.config_path.with_extension("toml.corrupt")
    }

    /// Load configuration from file
    ///
    /// If the config file doesn't exist, writes and returns the factory
    /// default. If the config file is corrupt, backs it up, logs an error and
    /// replaces it with the factory default.
    #[instrument(skip(self))]
    pub async fn load(&self) -> MbcompConfig {
        if !self.exists() {
            info!(
                path = %self.config_path.display(),
                "Config file not found, creating factory default"
            );
            return self.write_factory_default().await;
        }

        match MbcompConfig::load_from_file(&self.config_path).await {
            Ok(config) => {
                info!(
                    path = %self.config_path.display(),
                    "Configuration loaded successfully"
                );
                config
            }
            Err(e) => {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to load config, using factory default"
                );

                let backup_path = self.backup_path();
                if let Err(copy_err) = fs::copy(&self.config_path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup corrupt config"
                    );
                    // Keep the only copy of the user's file
                    return MbcompConfig::factory_default();
                }

                self.write_factory_default().await
            }
        }
    }

    /// Save the factory default for next time and return it
    async fn write_factory_default(&self) -> MbcompConfig {
        let config = MbcompConfig::factory_default();
        if let Err(e) = config.save_to_file(&self.config_path).await {
            error!(
                path = %self.config_path.display(),
                error = %e,
                "Failed to save factory default config"
            );
        }
        config
    }

    /// Save configuration to file
    #[instrument(skip(self, config))]
    pub async fn save(&self, config: &MbcompConfig) -> Result<()> {
        config.validate()?;
        config.save_to_file(&self.config_path).await
    }

    /// Clear configuration (delete config file)
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        if self.exists() {
            fs::remove_file(&self.config_path).await?;
            info!(
                path = %self.config_path.display(),
                "Configuration cleared"
            );
        }

        Ok(())
    }

    /// Check if config file exists
    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }
}
