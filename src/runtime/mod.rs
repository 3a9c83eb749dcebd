pub mod docker;
#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::container::config::ContainerConfig;

/// Errors reported by a container runtime backend
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Docker(#[from] bollard::errors::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("unsupported runtime {0:?}")]
    UnsupportedRuntime(String),

    #[error("{0} runtime is not implemented yet")]
    NotImplemented(String),

    #[error("wait stream ended without an exit status")]
    WaitEnded,
}

/// Host side of an attached container session
pub struct AttachStreams {
    /// Forwarded to the container when present
    pub stdin: Option<Box<dyn AsyncRead + Send + Unpin>>,
    pub stdout: Box<dyn AsyncWrite + Send + Unpin>,
    pub stderr: Box<dyn AsyncWrite + Send + Unpin>,
}

impl AttachStreams {
    /// The process's own stdio. Stdin is only wired up for interactive runs.
    pub fn stdio(interactive: bool) -> Self {
        let stdin: Option<Box<dyn AsyncRead + Send + Unpin>> = if interactive {
            Some(Box::new(tokio::io::stdin()))
        } else {
            None
        };
        Self {
            stdin,
            stdout: Box::new(tokio::io::stdout()),
            stderr: Box::new(tokio::io::stderr()),
        }
    }
}

/// Operations the orchestrator needs from a container engine.
///
/// Calls are abandoned by dropping their futures; implementations must not
/// leave shared state inconsistent when that happens.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create a container and return its id
    async fn create_container(&self, config: &ContainerConfig) -> Result<String, RuntimeError>;

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError>;

    /// Pump container output to the host until the output stream closes
    async fn attach_container(&self, id: &str, tty: bool, streams: AttachStreams) -> Result<(), RuntimeError>;

    async fn resize_container_tty(&self, id: &str, rows: u16, cols: u16) -> Result<(), RuntimeError>;

    /// Deliver a signal by name, e.g. "SIGINT"
    async fn signal_container(&self, id: &str, signal: &str) -> Result<(), RuntimeError>;

    /// Block until the container stops and return its exit code
    async fn wait_container(&self, id: &str) -> Result<i64, RuntimeError>;

    /// Remove the container, stopping it if needed. Already gone is success.
    async fn remove_container(&self, id: &str) -> Result<(), RuntimeError>;

    fn name(&self) -> &'static str;
}

/// Connect to the runtime called `name` through `socket`
pub async fn connect(name: &str, socket: &str) -> Result<Arc<dyn ContainerRuntime>, RuntimeError> {
    match name {
        "docker" => {
            let runtime = docker::DockerRuntime::connect(socket).await?;
            Ok(Arc::new(runtime))
        }
        "podman" => Err(RuntimeError::NotImplemented(name.to_string())),
        other => Err(RuntimeError::UnsupportedRuntime(other.to_string())),
    }
}
