//! Bootstrap configuration loading
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Built-in default (fallback)
//!
//! Command-line and environment values arrive together through the binary's
//! argument parser as [`ConfigOverrides`]; this module handles the file and
//! the defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "GEISHA_CONFIG";

/// Port the daemon listens on unless told otherwise
pub const DEFAULT_PORT: u16 = 9912;

/// Which Audio Output backend the daemon drives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputBackend {
    /// Clock-driven playback, no sound device
    #[default]
    Null,
    /// Sound device output (needs the `device` build feature)
    Device,
}

impl std::str::FromStr for OutputBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "null" => Ok(OutputBackend::Null),
            "device" => Ok(OutputBackend::Device),
            other => Err(Error::Config(format!("unknown output backend: {other}"))),
        }
    }
}

/// Bootstrap configuration loaded from TOML file
///
/// Every key is optional; missing keys take built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Address the TCP listener binds to
    pub bind_address: String,

    /// TCP port
    pub port: u16,

    /// Seconds a connection may sit without sending a request
    pub idle_timeout_secs: u64,

    /// Events buffered per subscriber before it is considered gone
    pub subscriber_buffer: usize,

    /// Requests buffered in front of the player actor
    pub request_queue: usize,

    /// Audio Output backend
    pub output: OutputBackend,

    /// Output device name (device backend only, None = default device)
    pub device: Option<String>,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            idle_timeout_secs: 30,
            subscriber_buffer: 64,
            request_queue: 32,
            output: OutputBackend::Null,
            device: None,
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Command-line / environment overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub output: Option<OutputBackend>,
    pub device: Option<String>,
    pub log_level: Option<String>,
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: TomlConfig =
            toml::from_str(text).map_err(|e| Error::Config(format!("Failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides on top of file values
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(bind_address) = overrides.bind_address {
            self.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(output) = overrides.output {
            self.output = output;
        }
        if overrides.device.is_some() {
            self.device = overrides.device;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        self
    }

    /// Reject values the daemon cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.subscriber_buffer == 0 {
            return Err(Error::Config("subscriber_buffer must be at least 1".to_string()));
        }
        if self.request_queue == 0 {
            return Err(Error::Config("request_queue must be at least 1".to_string()));
        }
        if self.idle_timeout_secs == 0 {
            return Err(Error::Config("idle_timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }

    /// `host:port` the listener binds to
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Per-user config file location for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("geisha").join("config.toml"))
}

/// Pick the config file: CLI path, then `GEISHA_CONFIG`, then the platform default
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path()
}

/// Where [`load_config`] found its settings
///
/// Loading happens before logging is up, so the binary reports this once
/// its subscriber is installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from this file
    File(PathBuf),
    /// This file does not exist; built-in defaults
    Missing(PathBuf),
    /// No path to look at; built-in defaults
    NoConfigDir,
}

/// Load the TOML config file
///
/// A missing file is not fatal: the daemon starts on built-in defaults.
/// A file that exists but cannot be read or parsed is an error.
pub fn load_config(path: Option<&Path>) -> Result<(TomlConfig, ConfigSource)> {
    let Some(path) = path else {
        return Ok((TomlConfig::default(), ConfigSource::NoConfigDir));
    };

    if !path.exists() {
        return Ok((
            TomlConfig::default(),
            ConfigSource::Missing(path.to_path_buf()),
        ));
    }

    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;
    let config = TomlConfig::from_toml_str(&text)?;

    Ok((config, ConfigSource::File(path.to_path_buf())))
}
