use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Tool name -> execution defaults, loaded from .tools.yaml
///
/// Ordered so that every walk over the map (e.g. mounting all tools) is
/// deterministic.
pub type ToolsConfig = BTreeMap<String, ToolConfig>;

/// Declarative defaults for one tool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfig {
    /// Image the tool runs in
    #[serde(default)]
    pub image: String,

    /// Allocate a pseudo-TTY
    pub tty: Option<bool>,

    /// Keep stdin attached
    pub interactive: Option<bool>,

    /// Network mode
    #[serde(default)]
    pub network: String,

    /// Remove the container on exit
    pub remove: Option<bool>,

    /// Volume mounts (host:container[:ro|rw])
    #[serde(default)]
    pub volumes: Vec<String>,

    /// Environment entries (KEY=VALUE, or KEY to copy from the host)
    #[serde(default)]
    pub env: Vec<String>,

    /// Working directory inside the container
    #[serde(default)]
    pub workdir: String,

    /// User the command runs as
    #[serde(default)]
    pub user: String,

    /// Mount the cderun binary and runtime socket into the container
    pub mount_cderun: Option<bool>,

    /// Mount the current directory at the same path and run there
    pub sync_workdir: Option<bool>,
}

/// Load a tool map from a YAML file
pub fn load(path: &Path) -> Result<ToolsConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read tools file: {}", path.display()))?;

    parse(&content).with_context(|| format!("Failed to parse tools file: {}", path.display()))
}

/// Parse a tool map from YAML text. An empty document is an empty map.
pub fn parse(content: &str) -> Result<ToolsConfig> {
    let tools: Option<ToolsConfig> = serde_yaml::from_str(content)?;
    Ok(tools.unwrap_or_default())
}
