//! Runs one container from creation to removal.
//!
//! Ordering rules:
//! - host signals are watched from create to remove: before start and
//!   during removal one abandons that step, while the container runs they
//!   are forwarded to it
//! - the exit code comes from wait; attach only moves bytes
//! - after exit, attach gets a short grace period to flush buffered output
//! - a second interrupt abandons the run with exit code 130
//! - removal happens last and outside the cancellable section

pub mod host;
pub mod terminal;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::container::config::ContainerConfig;
use crate::runtime::{AttachStreams, ContainerRuntime};
use host::{HostIo, HostSignal, ResizeSource, SignalSource};
use terminal::RawModeGuard;

/// How long attach may keep draining output after the container exited
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// Exit code when the user interrupts twice (128 + SIGINT)
pub const INTERRUPTED_EXIT_CODE: i64 = 130;

pub struct Orchestrator {
    runtime: Arc<dyn ContainerRuntime>,
    host: HostIo,
    grace_period: Duration,
}

impl Orchestrator {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, host: HostIo) -> Self {
        Self {
            runtime,
            host,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Run `config` to completion and return the container's exit code
    pub async fn run(self, config: &ContainerConfig) -> Result<i64> {
        let Self {
            runtime,
            host,
            grace_period,
        } = self;
        let HostIo {
            streams,
            mut signals,
            resize,
            raw_terminal,
        } = host;

        let created = tokio::select! {
            biased;
            result = runtime.create_container(config) => Ok(result),
            Some(signal) = signals.recv() => Err(signal),
        };
        let id = match created {
            Ok(result) => result.context("failed to create container")?,
            Err(signal) => {
                warn!("Received {} while creating the container, giving up", signal.name());
                return Ok(signal.exit_code());
            }
        };
        info!("Created container {} from {} ({})", id, config.image, runtime.name());

        let session = Session {
            streams,
            resize,
            raw_terminal,
            grace_period,
        };
        let (result, signals) = drive(&runtime, &id, config, session, signals).await;

        if config.remove {
            remove(&runtime, &id, signals).await;
        }

        result
    }
}

/// Host side of one attached run, minus the signal source
struct Session {
    streams: AttachStreams,
    resize: Option<ResizeSource>,
    raw_terminal: bool,
    grace_period: Duration,
}

/// Start, attach and wait. Everything spawned here has stopped when this
/// returns, and the signal source is handed back for the removal step.
async fn drive(
    runtime: &Arc<dyn ContainerRuntime>,
    id: &str,
    config: &ContainerConfig,
    session: Session,
    mut signals: SignalSource,
) -> (Result<i64>, Option<SignalSource>) {
    let Session {
        streams,
        resize,
        raw_terminal,
        grace_period,
    } = session;

    let _raw_mode = if raw_terminal {
        RawModeGuard::enable()
            .map_err(|e| warn!("failed to set terminal raw mode: {}", e))
            .ok()
    } else {
        None
    };

    let started = tokio::select! {
        biased;
        result = runtime.start_container(id) => Ok(result),
        Some(signal) = signals.recv() => Err(signal),
    };
    match started {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return (Err(e).context("failed to start container"), Some(signals)),
        Err(signal) => {
            warn!("Received {} while starting container {}, giving up", signal.name(), id);
            return (Ok(signal.exit_code()), Some(signals));
        }
    }

    let token = CancellationToken::new();
    let _cancel_on_exit = token.clone().drop_guard();

    let forwarder = tokio::spawn(forward_signals(runtime.clone(), id.to_string(), signals, token.clone()));
    let resizer = resize.map(|resize| tokio::spawn(forward_resizes(runtime.clone(), id.to_string(), resize, token.clone())));

    let result = supervise(runtime, id, config.tty, streams, grace_period, &token).await;

    token.cancel();
    if let Some(resizer) = resizer {
        resizer.abort();
        let _ = resizer.await;
    }
    let signals = match forwarder.await {
        Ok(signals) => Some(signals),
        Err(e) => {
            warn!("signal forwarding stopped abnormally: {}", e);
            None
        }
    };

    (result, signals)
}

/// Race attach against wait, then give attach a grace period to drain
async fn supervise(
    runtime: &Arc<dyn ContainerRuntime>,
    id: &str,
    tty: bool,
    streams: AttachStreams,
    grace_period: Duration,
    token: &CancellationToken,
) -> Result<i64> {
    let attach = runtime.attach_container(id, tty, streams);
    let wait = runtime.wait_container(id);
    tokio::pin!(attach);
    tokio::pin!(wait);

    let mut attached = false;
    let exit_code = loop {
        tokio::select! {
            result = &mut wait => break result.context("failed to wait for container")?,
            result = &mut attach, if !attached => {
                attached = true;
                result.context("failed to attach to container")?;
            }
            _ = token.cancelled() => {
                warn!("Interrupted twice, abandoning container {}", id);
                return Ok(INTERRUPTED_EXIT_CODE);
            }
        }
    };
    debug!("Container {} exited with code {}", id, exit_code);

    if !attached {
        tokio::select! {
            result = &mut attach => {
                if let Err(e) = result {
                    warn!("attach failed after container exit: {}", e);
                }
            }
            _ = tokio::time::sleep(grace_period) => {
                debug!("Output still open {:?} after exit, detaching", grace_period);
            }
            _ = token.cancelled() => {}
        }
    }

    Ok(exit_code)
}

/// Forced removal. Another host signal gives up on it instead of waiting
/// for the runtime.
async fn remove(runtime: &Arc<dyn ContainerRuntime>, id: &str, signals: Option<SignalSource>) {
    let removal = runtime.remove_container(id);
    let result = match signals {
        Some(mut signals) => {
            let outcome = tokio::select! {
                biased;
                result = removal => Ok(result),
                Some(signal) = signals.recv() => Err(signal),
            };
            match outcome {
                Ok(result) => result,
                Err(signal) => {
                    warn!("Received {} while removing container {}, leaving it behind", signal.name(), id);
                    return;
                }
            }
        }
        None => removal.await,
    };

    match result {
        Ok(()) => debug!("Removed container {}", id),
        Err(e) => warn!("failed to remove container: {}", e),
    }
}

/// Relay host signals until cancelled. A second interrupt cancels the run.
///
/// In-flight sends are aborted before the source is returned, so nothing
/// reaches the container after the run is over.
async fn forward_signals(
    runtime: Arc<dyn ContainerRuntime>,
    id: String,
    mut signals: SignalSource,
    token: CancellationToken,
) -> SignalSource {
    let mut sends = JoinSet::new();
    let mut interrupts = 0u32;
    loop {
        let signal = tokio::select! {
            _ = token.cancelled() => break,
            Some(_) = sends.join_next(), if !sends.is_empty() => continue,
            signal = signals.recv() => signal,
        };
        let Some(signal) = signal else { break };

        if signal == HostSignal::Interrupt {
            interrupts += 1;
            if interrupts > 1 {
                token.cancel();
                break;
            }
        }

        debug!("Forwarding {} to container {}", signal.name(), id);
        let runtime = runtime.clone();
        let id = id.clone();
        sends.spawn(async move {
            if let Err(e) = runtime.signal_container(&id, signal.name()).await {
                warn!("failed to forward {}: {}", signal.name(), e);
            }
        });
    }

    sends.shutdown().await;
    signals
}

/// Keep the container TTY the size of the host terminal
async fn forward_resizes(
    runtime: Arc<dyn ContainerRuntime>,
    id: String,
    mut resize: ResizeSource,
    token: CancellationToken,
) {
    let mut size = resize.current();
    loop {
        if let Some((rows, cols)) = size {
            if let Err(e) = runtime.resize_container_tty(&id, rows, cols).await {
                debug!("failed to resize container tty: {}", e);
            }
        }
        size = tokio::select! {
            _ = token.cancelled() => return,
            next = resize.changed() => match next {
                Some(next) => Some(next),
                None => return,
            },
        };
    }
}
