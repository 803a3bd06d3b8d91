//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use nrfgate_core::{ConnectionConfig, ScanOptions};
use nrfgate_types::{RepeatPolicy, Target};

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Disable colored output
    #[serde(default)]
    pub no_color: bool,

    /// Which peripheral and characteristic to talk to
    #[serde(default)]
    pub target: Target,

    /// Repeat count and interval used by `send`
    #[serde(default)]
    pub repeat: RepeatPolicy,

    /// Scan and timeout settings
    #[serde(default)]
    pub connection: ConnectionSettings,
}

/// Scan and timeout settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Length of the first scan for the gateway, in seconds.
    pub scan_secs: u64,
    /// Transport connect timeout, in seconds.
    pub connect_timeout_secs: u64,
    /// Timeout for a single write, in seconds.
    pub write_timeout_secs: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            scan_secs: 5,
            connect_timeout_secs: 15,
            write_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Default location: `<config dir>/nrfgate/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nrfgate")
            .join("config.toml")
    }

    /// The explicit path if given, otherwise the default one.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_path)
    }

    /// Load config from file, or return default if not found or invalid
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config: {}", e);
                    }
                },
                Err(e) => {
                    eprintln!("Warning: Failed to read config: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Reject settings that would make every command fail.
    pub fn validate(&self) -> Result<()> {
        self.target.validate().context("Invalid [target] section")?;
        self.repeat.validate().context("Invalid [repeat] section")?;
        if self.connection.scan_secs == 0 {
            bail!("Invalid [connection] section: scan_secs must be > 0");
        }
        self.connection_config()
            .validate()
            .context("Invalid [connection] section")?;
        Ok(())
    }

    /// The target, with the advertised name overridden when given.
    pub fn target_for(&self, device: Option<&str>) -> Target {
        match device {
            Some(name) => Target {
                device_name: name.to_string(),
                ..self.target.clone()
            },
            None => self.target.clone(),
        }
    }

    /// Timeouts for the BLE connector.
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::default()
            .connection_timeout(Duration::from_secs(self.connection.connect_timeout_secs))
            .write_timeout(Duration::from_secs(self.connection.write_timeout_secs))
    }

    /// Scan options for finding the gateway.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions::default().duration_secs(self.connection.scan_secs)
    }
}
