//! Configuration file management.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use touch_core::{ConnectionConfig, WatchConfig};
use uuid::Uuid;

use crate::cli::ConnectArgs;

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Only connect to watches whose name contains this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_filter: Option<String>,

    /// Link check interval in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor_interval_ms: Option<u64>,

    /// Connection timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,

    /// Custom characteristics (UUID -> Python struct format)
    #[serde(default)]
    pub custom_data: BTreeMap<String, String>,
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("touch-sdk")
            .join("config.toml")
    }

    /// Load config from the default location, or return default if not found
    pub fn load() -> Self {
        Self::load_or_default(&Self::path())
    }

    /// Load config from a file, warning and falling back to the default if
    /// it is missing or unreadable
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}", e);
                Self::default()
            }
        }
    }

    /// Load config from a file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Save config to file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Overlay command-line arguments; flags win over file values.
    pub fn merge_args(mut self, args: &ConnectArgs) -> Result<Self> {
        if let Some(name) = &args.name {
            self.name_filter = Some(name.clone());
        }
        if let Some(timeout) = args.timeout {
            self.connect_timeout_secs = Some(timeout);
        }
        if let Some(interval) = args.monitor_interval {
            self.monitor_interval_ms = Some(interval);
        }
        for entry in &args.custom_data {
            let Some((uuid, format)) = entry.split_once('=') else {
                bail!("Invalid --custom-data '{}', expected UUID=FORMAT", entry);
            };
            self.custom_data
                .insert(uuid.trim().to_string(), format.trim().to_string());
        }
        Ok(self)
    }

    /// Build the library configuration.
    pub fn watch_config(&self) -> Result<WatchConfig> {
        let mut config = WatchConfig::new();

        if let Some(filter) = self.name_filter.as_deref().filter(|f| !f.is_empty()) {
            config = config.name_filter(filter);
        }
        if let Some(ms) = self.monitor_interval_ms {
            config = config.monitor_interval(Duration::from_millis(ms));
        }
        if let Some(secs) = self.connect_timeout_secs {
            config = config.connection(
                ConnectionConfig::default().connection_timeout(Duration::from_secs(secs)),
            );
        }
        for (uuid, format) in &self.custom_data {
            let uuid = Uuid::parse_str(uuid)
                .with_context(|| format!("Invalid custom data characteristic '{}'", uuid))?;
            config = config.custom_data(uuid, format.as_str());
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

/// Resolve the effective configuration for a connecting command.
pub fn resolve(args: &ConnectArgs) -> Result<WatchConfig> {
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    config.merge_args(args)?.watch_config()
}
