use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ConfigError;

/// Execution request handed to a container runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Image to run
    pub image: String,

    /// Command executed in the container (the subcommand)
    pub command: Vec<String>,

    /// Arguments passed through to the command
    pub args: Vec<String>,

    /// Allocate a pseudo-TTY
    pub tty: bool,

    /// Keep stdin attached
    pub interactive: bool,

    /// Remove the container once it exits
    pub remove: bool,

    /// Network mode
    pub network: String,

    /// Bind mounts, in mount order
    pub volumes: Vec<VolumeMount>,

    /// Environment in KEY=VALUE form
    pub env: Vec<String>,

    /// Working directory inside the container
    pub workdir: String,

    /// User the command runs as
    pub user: String,
}

/// A host path mapped into the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub host_path: String,
    pub container_path: String,
    pub read_only: bool,
}

impl VolumeMount {
    pub fn new(host_path: impl Into<String>, container_path: impl Into<String>, read_only: bool) -> Self {
        Self {
            host_path: host_path.into(),
            container_path: container_path.into(),
            read_only,
        }
    }

    /// Parse `host:container[:ro|rw]`.
    ///
    /// Splits on the last colon first so that host paths carrying a drive
    /// letter (`C:\data:/mnt:ro`) keep their own colon.
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidVolume(spec.to_string());

        let (rest, last) = spec.rsplit_once(':').ok_or_else(invalid)?;
        let (host, container, read_only) = match last {
            "ro" | "rw" => {
                let (host, container) = rest.rsplit_once(':').ok_or_else(invalid)?;
                (host, container, last == "ro")
            }
            _ => (rest, last, false),
        };

        if host.is_empty() || container.is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(host, container, read_only))
    }

    pub fn parse_all<S: AsRef<str>>(specs: &[S]) -> Result<Vec<Self>, ConfigError> {
        specs
            .iter()
            .map(AsRef::as_ref)
            .filter(|spec| !spec.is_empty())
            .map(Self::parse)
            .collect()
    }
}

impl fmt::Display for VolumeMount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host_path, self.container_path)?;
        if self.read_only {
            f.write_str(":ro")?;
        }
        Ok(())
    }
}
