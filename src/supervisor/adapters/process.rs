//! Child-process launcher backed by `tokio::process`.

use crate::supervisor::{
    domain::ServerLaunchSpec,
    ports::{ProcessExit, ServerLaunchError, ServerLaunchResult, ServerLauncher, ServerProcess},
};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Launches the server as a local child process.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioServerLauncher;

impl TokioServerLauncher {
    /// Creates a launcher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ServerLauncher for TokioServerLauncher {
    async fn launch(&self, spec: &ServerLaunchSpec) -> ServerLaunchResult<Box<dyn ServerProcess>> {
        let mut command = Command::new(spec.command());
        command
            .args(spec.args())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        if let Some(directory) = spec.working_directory() {
            command.current_dir(directory);
        }

        match spec.log_file() {
            Some(path) => {
                let log = tokio::fs::File::create(path)
                    .await
                    .map_err(|err| ServerLaunchError::spawn(spec.command(), err))?
                    .into_std()
                    .await;
                let log_for_stderr = log
                    .try_clone()
                    .map_err(|err| ServerLaunchError::spawn(spec.command(), err))?;
                command
                    .stdout(Stdio::from(log))
                    .stderr(Stdio::from(log_for_stderr));
            }
            None => {
                command.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        let child = command
            .spawn()
            .map_err(|err| ServerLaunchError::spawn(spec.command(), err))?;
        info!(
            command = spec.command(),
            pid = child.id(),
            "spawned tool server process"
        );

        Ok(Box::new(TokioServerProcess { child }))
    }
}

/// Server process spawned by [`TokioServerLauncher`].
#[derive(Debug)]
pub struct TokioServerProcess {
    child: Child,
}

impl TokioServerProcess {
    async fn force_kill(&mut self) -> ServerLaunchResult<()> {
        warn!(pid = self.child.id(), "tool server ignored termination, killing");
        self.child.kill().await.map_err(ServerLaunchError::runtime)
    }
}

#[async_trait]
impl ServerProcess for TokioServerProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn try_exit(&mut self) -> ServerLaunchResult<Option<ProcessExit>> {
        let status = self.child.try_wait().map_err(ServerLaunchError::runtime)?;
        Ok(status.map(|exit| ProcessExit { code: exit.code() }))
    }

    async fn terminate(&mut self, grace: Duration) -> ServerLaunchResult<()> {
        if self.try_exit()?.is_some() {
            debug!("tool server already exited");
            return Ok(());
        }

        if grace.is_zero() {
            return self.force_kill().await;
        }

        if let Err(err) = send_terminate(&self.child) {
            warn!(error = %err, "graceful termination failed, killing");
            return self.force_kill().await;
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(code = status.code(), "tool server exited after termination");
                Ok(())
            }
            Ok(Err(err)) => Err(ServerLaunchError::runtime(err)),
            Err(_) => self.force_kill().await,
        }
    }
}

#[cfg(unix)]
fn send_terminate(child: &Child) -> ServerLaunchResult<()> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(raw_pid) = child.id() else {
        return Ok(());
    };
    let pid = i32::try_from(raw_pid)
        .map_err(|err| ServerLaunchError::Signal(format!("pid {raw_pid} out of range: {err}")))?;
    kill(Pid::from_raw(pid), Signal::SIGTERM)
        .map_err(|errno| ServerLaunchError::Signal(errno.to_string()))
}

#[cfg(not(unix))]
fn send_terminate(_child: &Child) -> ServerLaunchResult<()> {
    Err(ServerLaunchError::Signal(
        "graceful termination is unsupported on this platform".to_owned(),
    ))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawned_process_is_terminated_within_grace() {
        let spec = ServerLaunchSpec::new("sleep")
            .expect("valid command")
            .with_args(["30".to_owned()]);
        let mut process = TokioServerLauncher::new()
            .launch(&spec)
            .await
            .expect("sleep should spawn");

        assert!(process.id().is_some());
        assert_eq!(process.try_exit().expect("state readable"), None);

        process
            .terminate(Duration::from_secs(5))
            .await
            .expect("termination should succeed");

        let exit = process.try_exit().expect("state readable");
        assert!(exit.is_some());
    }

    #[tokio::test]
    async fn output_streams_are_captured_in_the_log_file() {
        let log = camino::Utf8PathBuf::from_path_buf(std::env::temp_dir())
            .expect("utf-8 temp dir")
            .join(format!("hexpilot-server-{}.log", uuid::Uuid::new_v4()));
        let spec = ServerLaunchSpec::new("sh")
            .expect("valid command")
            .with_args(["-c".to_owned(), "echo listening; echo warming >&2".to_owned()])
            .with_log_file(log.clone());
        let mut process = TokioServerLauncher::new()
            .launch(&spec)
            .await
            .expect("sh should spawn");

        while process.try_exit().expect("state readable").is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let captured = tokio::fs::read_to_string(&log).await.expect("log written");
        assert!(captured.contains("listening"));
        assert!(captured.contains("warming"));
        tokio::fs::remove_file(&log).await.expect("log removed");
    }

    #[tokio::test]
    async fn unwritable_log_file_fails_to_spawn() {
        let spec = ServerLaunchSpec::new("sleep")
            .expect("valid command")
            .with_args(["30".to_owned()])
            .with_log_file("/nonexistent/hexstrike/server.log");

        let result = TokioServerLauncher::new().launch(&spec).await;

        assert!(matches!(result, Err(ServerLaunchError::Spawn { .. })));
    }

    #[tokio::test]
    async fn missing_executable_fails_to_spawn() {
        let spec = ServerLaunchSpec::new("/nonexistent/hexstrike-server").expect("valid command");

        let result = TokioServerLauncher::new().launch(&spec).await;

        assert!(matches!(result, Err(ServerLaunchError::Spawn { .. })));
    }
}
