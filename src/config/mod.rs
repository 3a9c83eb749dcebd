pub mod env;
pub mod global;
pub mod resolver;
pub mod tools;

use std::path::PathBuf;

use crate::utils::paths;
use global::GlobalConfig;
use tools::ToolsConfig;

/// Errors raised while turning configuration into an execution spec.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no image mapping found for tool: {0}")]
    MissingImage(String),

    #[error("invalid volume {0:?}: expected host:container[:ro|rw]")]
    InvalidVolume(String),

    #[error("unsupported dry-run format {0:?} (expected yaml, json or simple)")]
    UnsupportedFormat(String),

    #[error("--mount-cderun, --mount-tools, or --mount-all-tools requires an explicit socket path (--mount-socket or CDERUN_MOUNT_SOCKET)")]
    SocketRequired,

    #[error("tool {0:?} not found in tools config")]
    UnknownTool(String),

    #[error("failed to get executable path")]
    CurrentExe(#[source] std::io::Error),
}

/// Declarative configuration discovered on disk.
///
/// Problems are kept rather than raised: a broken file is treated as absent
/// and reported once logging is up.
#[derive(Debug, Default)]
pub struct ConfigSources {
    pub tools: Option<ToolsConfig>,
    pub tools_path: Option<PathBuf>,
    pub global: Option<GlobalConfig>,
    pub global_path: Option<PathBuf>,
    pub problems: Vec<String>,
}

impl ConfigSources {
    /// Load the first tools file and the first global file found
    pub fn discover() -> Self {
        let mut sources = Self::default();

        if let Some(path) = paths::first_existing(&paths::global_config_candidates()) {
            match GlobalConfig::load(&path) {
                Ok(global) => {
                    sources.global = Some(global);
                    sources.global_path = Some(path);
                }
                Err(e) => sources
                    .problems
                    .push(format!("failed to load cderun config: {:#}", e)),
            }
        }

        if let Some(path) = paths::first_existing(&paths::tools_config_candidates()) {
            match tools::load(&path) {
                Ok(tools) => {
                    sources.tools = Some(tools);
                    sources.tools_path = Some(path);
                }
                Err(e) => sources
                    .problems
                    .push(format!("failed to load tools config: {:#}", e)),
            }
        }

        sources
    }

    /// Emit what was loaded and what went wrong
    pub fn report(&self) {
        if let Some(path) = &self.global_path {
            tracing::debug!("Loaded cderun config from: {}", path.display());
        }
        if let Some(path) = &self.tools_path {
            tracing::debug!("Loaded tools config from: {}", path.display());
        }
        for problem in &self.problems {
            tracing::warn!("{}", problem);
        }
    }
}
