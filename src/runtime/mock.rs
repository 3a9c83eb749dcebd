//! In-memory runtime for orchestration tests.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use super::{AttachStreams, ContainerRuntime, RuntimeError};
use crate::container::config::ContainerConfig;

pub const CONTAINER_ID: &str = "mock-container";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create,
    Start,
    Attach,
    Resize(u16, u16),
    Signal(String),
    Wait,
    Remove,
}

/// Operations the mock can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fail {
    Create,
    Start,
    Attach,
    Wait,
    Remove,
}

#[derive(Default)]
pub struct MockRuntime {
    pub calls: Mutex<Vec<Call>>,
    pub created: Mutex<Option<ContainerConfig>>,
    pub exit_code: i64,
    /// Bytes written to stdout by attach
    pub output: Vec<u8>,
    /// Attach never returns on its own
    pub block_attach: bool,
    /// Wait never returns on its own
    pub block_wait: bool,
    pub block_create: bool,
    pub block_remove: bool,
    /// Signals are recorded only after this delay
    pub signal_delay: Duration,
    pub fail: Vec<Fail>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn created(&self) -> Option<ContainerConfig> {
        self.created.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, op: Fail) -> Result<(), RuntimeError> {
        if self.fail.contains(&op) {
            return Err(RuntimeError::Io(std::io::Error::other(format!("mock {:?} failure", op))));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn create_container(&self, config: &ContainerConfig) -> Result<String, RuntimeError> {
        self.record(Call::Create);
        self.check(Fail::Create)?;
        if self.block_create {
            std::future::pending::<()>().await;
        }
        *self.created.lock().unwrap() = Some(config.clone());
        Ok(CONTAINER_ID.to_string())
    }

    async fn start_container(&self, _id: &str) -> Result<(), RuntimeError> {
        self.record(Call::Start);
        self.check(Fail::Start)
    }

    async fn attach_container(&self, _id: &str, _tty: bool, mut streams: AttachStreams) -> Result<(), RuntimeError> {
        self.record(Call::Attach);
        self.check(Fail::Attach)?;
        streams.stdout.write_all(&self.output).await?;
        streams.stdout.flush().await?;
        if self.block_attach {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn resize_container_tty(&self, _id: &str, rows: u16, cols: u16) -> Result<(), RuntimeError> {
        self.record(Call::Resize(rows, cols));
        Ok(())
    }

    async fn signal_container(&self, _id: &str, signal: &str) -> Result<(), RuntimeError> {
        if !self.signal_delay.is_zero() {
            tokio::time::sleep(self.signal_delay).await;
        }
        self.record(Call::Signal(signal.to_string()));
        Ok(())
    }

    async fn wait_container(&self, _id: &str) -> Result<i64, RuntimeError> {
        self.record(Call::Wait);
        self.check(Fail::Wait)?;
        if self.block_wait {
            std::future::pending::<()>().await;
        }
        Ok(self.exit_code)
    }

    async fn remove_container(&self, _id: &str) -> Result<(), RuntimeError> {
        self.record(Call::Remove);
        self.check(Fail::Remove)?;
        if self.block_remove {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
