use anyhow::{Context, Result};
use std::str::FromStr;

use super::config::ContainerConfig;
use crate::config::ConfigError;

/// How a dry run prints the container configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DryRunFormat {
    Yaml,
    Json,
    Simple,
}

impl FromStr for DryRunFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            "simple" => Ok(Self::Simple),
            _ => Err(ConfigError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Render `config` for display. The result ends with a newline.
pub fn render(config: &ContainerConfig, format: DryRunFormat) -> Result<String> {
    match format {
        DryRunFormat::Yaml => {
            serde_yaml::to_string(config).context("failed to encode container config as YAML")
        }
        DryRunFormat::Json => {
            let mut out = serde_json::to_string_pretty(config)
                .context("failed to encode container config as JSON")?;
            out.push('\n');
            Ok(out)
        }
        DryRunFormat::Simple => Ok(render_simple(config)),
    }
}

fn render_simple(config: &ContainerConfig) -> String {
    let command = config
        .command
        .iter()
        .chain(&config.args)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ");
    let volumes = config
        .volumes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    let mut out = String::new();
    out.push_str(&format!("Image: {}\n", config.image));
    out.push_str(&format!("Command: {}\n", command));
    out.push_str(&format!("TTY: {}\n", config.tty));
    out.push_str(&format!("Interactive: {}\n", config.interactive));
    out.push_str(&format!("Network: {}\n", config.network));
    out.push_str(&format!("Remove: {}\n", config.remove));
    out.push_str(&format!("Volumes: {}\n", volumes));
    out.push_str(&format!("Env: {}\n", config.env.join(", ")));
    out.push_str(&format!("Workdir: {}\n", config.workdir));
    out
}
