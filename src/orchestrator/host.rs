use nix::sys::signal::Signal as UnixSignal;
use std::io::IsTerminal;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::mpsc;

use super::terminal;
use crate::container::config::ContainerConfig;
use crate::runtime::AttachStreams;

/// Signals the wrapper relays to the container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    Interrupt,
    Terminate,
}

impl HostSignal {
    pub fn name(self) -> &'static str {
        match self {
            Self::Interrupt => UnixSignal::SIGINT.as_str(),
            Self::Terminate => UnixSignal::SIGTERM.as_str(),
        }
    }

    /// Shell convention for a process ended by this signal
    pub fn exit_code(self) -> i64 {
        let signal = match self {
            Self::Interrupt => UnixSignal::SIGINT,
            Self::Terminate => UnixSignal::SIGTERM,
        };
        128 + signal as i64
    }
}

/// Where host signals come from
pub enum SignalSource {
    Host { interrupt: Signal, terminate: Signal },
    Channel(mpsc::UnboundedReceiver<HostSignal>),
}

impl SignalSource {
    /// Take over SIGINT and SIGTERM for this process
    pub fn host() -> std::io::Result<Self> {
        Ok(Self::Host {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Next signal, or `None` once the source is closed
    pub async fn recv(&mut self) -> Option<HostSignal> {
        match self {
            Self::Host { interrupt, terminate } => tokio::select! {
                Some(()) = interrupt.recv() => Some(HostSignal::Interrupt),
                Some(()) = terminate.recv() => Some(HostSignal::Terminate),
                else => None,
            },
            Self::Channel(rx) => rx.recv().await,
        }
    }
}

/// Where terminal size changes come from
pub enum ResizeSource {
    Host(Signal),
    Channel {
        initial: Option<(u16, u16)>,
        rx: mpsc::UnboundedReceiver<(u16, u16)>,
    },
}

impl ResizeSource {
    /// Follow SIGWINCH on the controlling terminal
    pub fn host() -> std::io::Result<Self> {
        Ok(Self::Host(signal(SignalKind::window_change())?))
    }

    /// Size as of now, as (rows, cols)
    pub fn current(&self) -> Option<(u16, u16)> {
        match self {
            Self::Host(_) => terminal::size(),
            Self::Channel { initial, .. } => *initial,
        }
    }

    /// Wait for the next size change
    pub async fn changed(&mut self) -> Option<(u16, u16)> {
        match self {
            Self::Host(winch) => loop {
                winch.recv().await?;
                if let Some(size) = terminal::size() {
                    return Some(size);
                }
            },
            Self::Channel { rx, .. } => rx.recv().await,
        }
    }
}

/// Everything the orchestrator touches on the host side
pub struct HostIo {
    pub streams: AttachStreams,
    pub signals: SignalSource,
    /// Only present when the container has a TTY to resize
    pub resize: Option<ResizeSource>,
    /// Switch the host terminal to raw mode while attached
    pub raw_terminal: bool,
}

impl HostIo {
    /// Wire up the real process stdio, signals and terminal
    pub fn from_process(config: &ContainerConfig) -> std::io::Result<Self> {
        let resize = if config.tty && std::io::stdout().is_terminal() {
            Some(ResizeSource::host()?)
        } else {
            None
        };

        Ok(Self {
            streams: AttachStreams::stdio(config.interactive),
            signals: SignalSource::host()?,
            resize,
            raw_terminal: config.tty && std::io::stdin().is_terminal(),
        })
    }
}
