use async_trait::async_trait;
use bollard::container::{
    AttachContainerOptions, AttachContainerResults, Config, CreateContainerOptions, KillContainerOptions,
    LogOutput, RemoveContainerOptions, ResizeContainerTtyOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::models::HostConfig;
use bollard::Docker;
use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::{AttachStreams, ContainerRuntime, RuntimeError};
use crate::container::config::ContainerConfig;

/// Seconds before a request to the daemon times out
const CLIENT_TIMEOUT: u64 = 120;

/// Docker engine accessed through bollard
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the daemon listening on `socket` and verify it answers.
    ///
    /// URL-shaped values (tcp://, ssh://) are left to bollard's local
    /// defaults, which read DOCKER_HOST.
    pub async fn connect(socket: &str) -> Result<Self, RuntimeError> {
        let docker = if socket.contains("://") {
            Docker::connect_with_local_defaults()?
        } else {
            Docker::connect_with_unix(socket, CLIENT_TIMEOUT, bollard::API_DEFAULT_VERSION)?
        };

        docker.ping().await?;
        tracing::debug!("Connected to Docker daemon at {}", socket);

        Ok(Self { docker })
    }
}

/// Map a container spec onto the engine's create request
fn create_config(config: &ContainerConfig) -> Config<String> {
    let binds: Vec<String> = config.volumes.iter().map(ToString::to_string).collect();
    let cmd: Vec<String> = config.command.iter().chain(&config.args).cloned().collect();

    let host_config = HostConfig {
        binds: Some(binds),
        network_mode: Some(config.network.clone()).filter(|n| !n.is_empty()),
        ..Default::default()
    };

    Config {
        image: Some(config.image.clone()),
        cmd: Some(cmd),
        env: Some(config.env.clone()),
        working_dir: Some(config.workdir.clone()).filter(|w| !w.is_empty()),
        user: Some(config.user.clone()).filter(|u| !u.is_empty()),
        tty: Some(config.tty),
        open_stdin: Some(config.interactive),
        stdin_once: Some(config.interactive),
        attach_stdin: Some(config.interactive),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        host_config: Some(host_config),
        ..Default::default()
    }
}

async fn write_frame<W: AsyncWrite + Unpin + ?Sized>(writer: &mut W, data: &[u8]) -> std::io::Result<()> {
    writer.write_all(data).await?;
    writer.flush().await
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn create_container(&self, config: &ContainerConfig) -> Result<String, RuntimeError> {
        let response = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, create_config(config))
            .await?;

        for warning in &response.warnings {
            tracing::warn!("Docker: {}", warning);
        }
        tracing::debug!("Created container {}", response.id);

        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn attach_container(&self, id: &str, tty: bool, streams: AttachStreams) -> Result<(), RuntimeError> {
        let AttachStreams {
            stdin,
            mut stdout,
            mut stderr,
        } = streams;

        let options = AttachContainerOptions::<String> {
            stdin: Some(stdin.is_some()),
            stdout: Some(true),
            stderr: Some(true),
            stream: Some(true),
            logs: Some(true),
            detach_keys: None,
        };
        let AttachContainerResults { mut output, mut input } =
            self.docker.attach_container(id, Some(options)).await?;
        tracing::debug!(tty, "Attached to container {}", id);

        // Closing the write half tells the container stdin has ended
        let stdin_pump = async move {
            if let Some(mut stdin) = stdin {
                tokio::io::copy(&mut stdin, &mut input).await?;
                input.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        };

        // With a TTY the daemon sends raw console frames, otherwise stdout and
        // stderr arrive multiplexed.
        let output_pump = async {
            while let Some(frame) = output.next().await {
                match frame? {
                    LogOutput::StdErr { message } => write_frame(&mut stderr, &message).await?,
                    LogOutput::StdOut { message } | LogOutput::Console { message } => {
                        write_frame(&mut stdout, &message).await?
                    }
                    LogOutput::StdIn { .. } => {}
                }
            }
            Ok::<(), RuntimeError>(())
        };

        tokio::pin!(stdin_pump);
        tokio::pin!(output_pump);

        let mut stdin_done = false;
        loop {
            tokio::select! {
                result = &mut output_pump => return result,
                result = &mut stdin_pump, if !stdin_done => {
                    stdin_done = true;
                    if let Err(e) = result {
                        tracing::debug!("Stdin forwarding stopped: {}", e);
                    }
                }
            }
        }
    }

    async fn resize_container_tty(&self, id: &str, rows: u16, cols: u16) -> Result<(), RuntimeError> {
        let options = ResizeContainerTtyOptions {
            height: rows,
            width: cols,
        };
        self.docker.resize_container_tty(id, options).await?;
        Ok(())
    }

    async fn signal_container(&self, id: &str, signal: &str) -> Result<(), RuntimeError> {
        let options = KillContainerOptions { signal };
        self.docker.kill_container(id, Some(options)).await?;
        Ok(())
    }

    async fn wait_container(&self, id: &str) -> Result<i64, RuntimeError> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };
        let mut stream = self.docker.wait_container(id, Some(options));

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // The daemon reports a non-zero exit as a wait error
            Some(Err(BollardError::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(e.into()),
            None => Err(RuntimeError::WaitEnded),
        }
    }

    async fn remove_container(&self, id: &str) -> Result<(), RuntimeError> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        match self.docker.remove_container(id, Some(options)).await {
            Ok(()) => Ok(()),
            Err(BollardError::DockerResponseServerError { status_code, message })
                if status_code == 404 || status_code == 409 =>
            {
                tracing::debug!("Container {} already gone: {}", id, message);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "docker"
    }
}
