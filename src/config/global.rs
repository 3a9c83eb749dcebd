use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Process-wide settings loaded from .cderun.yaml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    /// Container runtime name (docker, podman)
    #[serde(default)]
    pub runtime: String,

    /// Runtime socket path
    #[serde(default)]
    pub runtime_path: String,

    /// Fallbacks applied to every tool
    #[serde(default)]
    pub defaults: Defaults,

    /// Logging defaults
    #[serde(default)]
    pub log: LogDefaults,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Defaults {
    pub tty: Option<bool>,
    pub interactive: Option<bool>,
    #[serde(default)]
    pub network: String,
    pub remove: Option<bool>,
    #[serde(default)]
    pub user: String,
    pub mount_cderun: Option<bool>,
    pub sync_workdir: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDefaults {
    /// error, warn, info, debug or trace
    #[serde(default)]
    pub level: String,

    /// text or json
    #[serde(default)]
    pub format: String,

    /// Log file path
    #[serde(default)]
    pub file: String,

    /// Write to stderr as well as the log file
    pub tee: Option<bool>,

    /// Prefix entries with a timestamp
    pub timestamp: Option<bool>,
}

impl GlobalConfig {
    /// Load global settings from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Option<GlobalConfig> = serde_yaml::from_str(content)?;
        Ok(config.unwrap_or_default())
    }
}
