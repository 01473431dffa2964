//! Start-or-detect and bounded shutdown of the tool server.

use super::ServerHandle;
use crate::supervisor::{
    domain::{ServerLifecycle, ServerOwnership, ServerStatus, SupervisorConfig, SupervisorDomainError},
    ports::{HealthProbe, ProcessExit, ServerLaunchError, ServerLauncher, ServerProcess},
};
use camino::Utf8PathBuf;
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that prevent a session from obtaining a ready server.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The server process could not be spawned.
    #[error(transparent)]
    Launch(#[from] ServerLaunchError),

    /// The spawned process exited before it became ready.
    #[error("tool server exited during startup with {exit}{}", log_hint(.log_file.as_ref()))]
    ProcessExited {
        /// Exit information.
        exit: ProcessExit,
        /// Log file holding the server output, when redirected.
        log_file: Option<Utf8PathBuf>,
    },

    /// The readiness probe never succeeded within the retry budget.
    #[error("tool server at {address} not ready after {attempts} attempts")]
    NotReady {
        /// Base address that was probed.
        address: String,
        /// Number of probes issued.
        attempts: u32,
    },

    /// A lifecycle transition was rejected.
    #[error(transparent)]
    Domain(#[from] SupervisorDomainError),
}

fn log_hint(log_file: Option<&Utf8PathBuf>) -> String {
    log_file.map_or_else(String::new, |path| format!(" (see {path})"))
}

/// Supervises the external tool-execution server.
#[derive(Clone)]
pub struct ProcessSupervisor<P, L, C>
where
    P: HealthProbe,
    L: ServerLauncher,
    C: Clock + Send + Sync,
{
    probe: Arc<P>,
    launcher: Arc<L>,
    clock: Arc<C>,
    config: SupervisorConfig,
}

impl<P, L, C> ProcessSupervisor<P, L, C>
where
    P: HealthProbe,
    L: ServerLauncher,
    C: Clock + Send + Sync,
{
    /// Creates a supervisor.
    #[must_use]
    pub const fn new(
        probe: Arc<P>,
        launcher: Arc<L>,
        clock: Arc<C>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            probe,
            launcher,
            clock,
            config,
        }
    }

    /// Returns the supervisor configuration.
    #[must_use]
    pub const fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Returns a ready server, detecting a live instance before spawning one.
    ///
    /// At most one process is spawned per call. A spawned process that never
    /// becomes ready is killed before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError`] when spawning fails, the process exits early,
    /// or the readiness budget is exhausted.
    pub async fn ensure_running(&self) -> Result<ServerHandle, StartupError> {
        let address = self.config.base_address();
        if self.probe_once().await {
            info!(address, "tool server already running");
            let mut lifecycle =
                ServerLifecycle::starting(ServerOwnership::Detected, address, None, &*self.clock);
            lifecycle.mark_ready(&*self.clock)?;
            return Ok(ServerHandle {
                lifecycle,
                process: None,
            });
        }

        info!(address, command = self.config.launch().command(), "starting tool server");
        let mut process = self.launcher.launch(self.config.launch()).await?;
        let mut lifecycle = ServerLifecycle::starting(
            ServerOwnership::Spawned,
            address,
            process.id(),
            &*self.clock,
        );

        match self.await_ready(process.as_mut()).await {
            Ok(()) => {
                lifecycle.mark_ready(&*self.clock)?;
                info!(address, pid = lifecycle.process_id(), "tool server is ready");
                Ok(ServerHandle {
                    lifecycle,
                    process: Some(process),
                })
            }
            Err(err) => {
                lifecycle.mark_failed(&*self.clock)?;
                if let Err(kill_err) = process.terminate(Duration::ZERO).await {
                    warn!(error = %kill_err, "failed to kill tool server after startup failure");
                }
                Err(err)
            }
        }
    }

    /// Releases the server. Never fails and is safe to call repeatedly.
    ///
    /// A spawned server is terminated gracefully and then killed once the
    /// grace period elapses. A detected server is left running.
    pub async fn shutdown(&self, handle: &mut ServerHandle) {
        if handle.status().is_terminal() {
            debug!(status = %handle.status(), "tool server already released");
            return;
        }

        let Some(mut process) = handle.process.take() else {
            info!(
                address = handle.base_address(),
                "leaving pre-existing tool server running"
            );
            self.record(handle, ServerStatus::Stopped);
            return;
        };

        match process.terminate(self.config.shutdown_grace()).await {
            Ok(()) => {
                info!(pid = handle.process_id(), "tool server stopped");
                self.record(handle, ServerStatus::Stopped);
            }
            Err(err) => {
                warn!(pid = handle.process_id(), error = %err, "failed to stop tool server");
                self.record(handle, ServerStatus::Failed);
            }
        }
    }

    /// Detects an unexpected exit of a spawned server and returns the
    /// resulting status.
    pub fn check_alive(&self, handle: &mut ServerHandle) -> ServerStatus {
        if handle.status() != ServerStatus::Ready {
            return handle.status();
        }

        let Some(process) = handle.process.as_mut() else {
            return handle.status();
        };

        match process.try_exit() {
            Ok(Some(exit)) => {
                warn!(pid = handle.process_id(), %exit, "tool server exited unexpectedly");
                handle.process = None;
                self.record(handle, ServerStatus::Failed);
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "could not read tool server state"),
        }
        handle.status()
    }

    async fn probe_once(&self) -> bool {
        let url = self.config.readiness_url();
        match self.probe.probe(&url, self.config.probe_timeout()).await {
            Ok(()) => true,
            Err(err) => {
                debug!(url = %url, error = %err, "readiness probe failed");
                false
            }
        }
    }

    async fn await_ready(&self, process: &mut dyn ServerProcess) -> Result<(), StartupError> {
        let attempts = self.config.max_attempts();
        for attempt in 0..attempts {
            if let Some(exit) = process.try_exit()? {
                return Err(StartupError::ProcessExited {
                    exit,
                    log_file: self.config.launch().log_file().map(ToOwned::to_owned),
                });
            }

            if self.probe_once().await {
                return Ok(());
            }

            if attempt.saturating_add(1) < attempts {
                tokio::time::sleep(self.config.backoff().delay_for(attempt)).await;
            }
        }

        Err(StartupError::NotReady {
            address: self.config.base_address().to_owned(),
            attempts,
        })
    }

    fn record(&self, handle: &mut ServerHandle, status: ServerStatus) {
        let result = match status {
            ServerStatus::Stopped => handle.lifecycle.mark_stopped(&*self.clock),
            ServerStatus::Failed => handle.lifecycle.mark_failed(&*self.clock),
            ServerStatus::Starting | ServerStatus::Ready => {
                handle.lifecycle.mark_ready(&*self.clock)
            }
        };
        if let Err(err) = result {
            warn!(error = %err, "tool server status not updated");
        }
    }
}
