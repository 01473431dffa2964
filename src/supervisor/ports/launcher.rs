//! Process launch port for the supervised server.

use crate::supervisor::domain::ServerLaunchSpec;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for launcher and process operations.
pub type ServerLaunchResult<T> = Result<T, ServerLaunchError>;

/// Spawns the server described by a [`ServerLaunchSpec`].
#[async_trait]
pub trait ServerLauncher: Send + Sync {
    /// Starts a new server process.
    ///
    /// # Errors
    ///
    /// Returns [`ServerLaunchError::Spawn`] when the process cannot be created.
    async fn launch(&self, spec: &ServerLaunchSpec) -> ServerLaunchResult<Box<dyn ServerProcess>>;
}

/// A running server process owned by the supervisor.
#[async_trait]
pub trait ServerProcess: Send + Sync + fmt::Debug {
    /// Returns the operating system process identifier, if known.
    fn id(&self) -> Option<u32>;

    /// Returns the exit information when the process has already exited.
    ///
    /// # Errors
    ///
    /// Returns [`ServerLaunchError`] when the process state cannot be read.
    fn try_exit(&mut self) -> ServerLaunchResult<Option<ProcessExit>>;

    /// Asks the process to stop, forcing it after `grace` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`ServerLaunchError`] when neither the graceful signal nor the
    /// forced kill could be delivered.
    async fn terminate(&mut self, grace: Duration) -> ServerLaunchResult<()>;
}

/// Exit information of a finished process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code, absent when the process was ended by a signal.
    pub code: Option<i32>,
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(formatter, "exit code {code}"),
            None => formatter.write_str("termination by signal"),
        }
    }
}

/// Errors returned by launcher and process adapters.
#[derive(Debug, Clone, Error)]
pub enum ServerLaunchError {
    /// The process could not be spawned.
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        /// Command that failed to start.
        command: String,
        /// Underlying I/O failure.
        source: Arc<std::io::Error>,
    },

    /// A termination signal could not be delivered.
    #[error("failed to signal server process: {0}")]
    Signal(String),

    /// Generic runtime failure.
    #[error("server process runtime error: {0}")]
    Runtime(Arc<dyn std::error::Error + Send + Sync>),
}

impl ServerLaunchError {
    /// Wraps a spawn failure for `command`.
    pub fn spawn(command: impl Into<String>, err: std::io::Error) -> Self {
        Self::Spawn {
            command: command.into(),
            source: Arc::new(err),
        }
    }

    /// Wraps a runtime error from the process adapter.
    pub fn runtime(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Runtime(Arc::new(err))
    }
}
