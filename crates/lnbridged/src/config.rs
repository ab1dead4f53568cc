use anyhow::{Context, Result};
use lnbridge_routing::Mode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(skip)]
    config_file_path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub mode: Mode,
    /// Fixed seed for request ID generation (testing only)
    #[serde(default)]
    pub request_id_seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// How often the transports' processing entry points are driven
    #[serde(default = "default_process_interval")]
    pub process_interval_ms: u64,
    /// Frames each transport may hold awaiting loop-back
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_process_interval() -> u64 {
    10
}

fn default_queue_capacity() -> usize {
    64
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            process_interval_ms: default_process_interval(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config_path = config_path.unwrap_or_else(Self::default_config_path);

        if !config_path.exists() {
            anyhow::bail!(
                "Configuration file not found: {}\nRun with --init to create a new configuration",
                config_path.display()
            );
        }

        let contents =
            fs::read_to_string(&config_path).context("Failed to read configuration file")?;

        let mut config: Config =
            serde_yaml::from_str(&contents).context("Failed to parse configuration file")?;
        config.validate()?;
        config.config_file_path = config_path;

        Ok(config)
    }

    /// Write a default configuration and return it
    pub fn create_default(config_path: Option<PathBuf>) -> Result<Self> {
        let config_path = config_path.unwrap_or_else(Self::default_config_path);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config = Config {
            config_file_path: config_path.clone(),
            ..Config::default()
        };

        let yaml = serde_yaml::to_string(&config)?;
        fs::write(&config_path, yaml)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.runtime.process_interval_ms == 0 {
            anyhow::bail!("runtime.process_interval_ms must be greater than zero");
        }
        if self.runtime.queue_capacity == 0 {
            anyhow::bail!("runtime.queue_capacity must be greater than zero");
        }
        Ok(())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_file_path
    }

    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lnbridged")
            .join("config.yaml")
    }
}
