//! In-memory supervisor adapters for deterministic tests.
//!
//! These adapters model probing and process lifecycle without touching the
//! network or spawning processes. Launch and termination counts are recorded
//! so tests can assert ownership rules.

use crate::supervisor::{
    domain::ServerLaunchSpec,
    ports::{
        HealthProbe, HealthProbeError, HealthProbeResult, ProcessExit, ServerLaunchError,
        ServerLaunchResult, ServerLauncher, ServerProcess,
    },
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Readiness probe that succeeds once a configured number of probes failed.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHealthProbe {
    state: Arc<Mutex<ProbeState>>,
}

#[derive(Debug, Default)]
struct ProbeState {
    failures_before_ready: Option<u32>,
    probes: u32,
    urls: Vec<String>,
}

impl InMemoryHealthProbe {
    /// Creates a probe that never reports ready.
    #[must_use]
    pub fn unreachable() -> Self {
        Self::default()
    }

    /// Creates a probe that reports ready on the first call.
    #[must_use]
    pub fn ready() -> Self {
        Self::ready_after(0)
    }

    /// Creates a probe that fails `failures` times and then reports ready.
    #[must_use]
    pub fn ready_after(failures: u32) -> Self {
        let probe = Self::default();
        lock(&probe.state).failures_before_ready = Some(failures);
        probe
    }

    /// Returns how many probes were issued.
    #[must_use]
    pub fn probe_count(&self) -> u32 {
        lock(&self.state).probes
    }

    /// Returns the probed URLs in order.
    #[must_use]
    pub fn probed_urls(&self) -> Vec<String> {
        lock(&self.state).urls.clone()
    }
}

#[async_trait]
impl HealthProbe for InMemoryHealthProbe {
    async fn probe(&self, url: &str, _timeout: Duration) -> HealthProbeResult<()> {
        let mut state = lock(&self.state);
        let attempt = state.probes;
        state.probes = state.probes.saturating_add(1);
        state.urls.push(url.to_owned());

        match state.failures_before_ready {
            Some(failures) if attempt >= failures => Ok(()),
            _ => Err(HealthProbeError::Unreachable("connection refused".to_owned())),
        }
    }
}

/// Launcher producing in-memory processes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryServerLauncher {
    state: Arc<Mutex<LauncherState>>,
}

#[derive(Debug, Default)]
struct LauncherState {
    launched: Vec<ServerLaunchSpec>,
    terminations: u32,
    exit_on_launch: Option<ProcessExit>,
    fail_spawn: bool,
    fail_termination: bool,
    next_pid: u32,
    exited: Vec<u32>,
}

impl InMemoryServerLauncher {
    /// Creates a launcher whose processes run until terminated.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every launched process report `exit` immediately.
    #[must_use]
    pub fn exiting_with(self, exit: ProcessExit) -> Self {
        lock(&self.state).exit_on_launch = Some(exit);
        self
    }

    /// Makes launches fail as if the executable were missing.
    #[must_use]
    pub fn failing_to_spawn(self) -> Self {
        lock(&self.state).fail_spawn = true;
        self
    }

    /// Makes termination requests fail.
    #[must_use]
    pub fn failing_to_terminate(self) -> Self {
        lock(&self.state).fail_termination = true;
        self
    }

    /// Simulates an unexpected exit of the process with `pid`.
    pub fn crash(&self, pid: u32) {
        lock(&self.state).exited.push(pid);
    }

    /// Returns how many processes were launched.
    #[must_use]
    pub fn launch_count(&self) -> usize {
        lock(&self.state).launched.len()
    }

    /// Returns the launch specifications received.
    #[must_use]
    pub fn launched_specs(&self) -> Vec<ServerLaunchSpec> {
        lock(&self.state).launched.clone()
    }

    /// Returns how many termination requests succeeded.
    #[must_use]
    pub fn termination_count(&self) -> u32 {
        lock(&self.state).terminations
    }
}

#[async_trait]
impl ServerLauncher for InMemoryServerLauncher {
    async fn launch(&self, spec: &ServerLaunchSpec) -> ServerLaunchResult<Box<dyn ServerProcess>> {
        let mut state = lock(&self.state);
        if state.fail_spawn {
            return Err(ServerLaunchError::spawn(
                spec.command(),
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }

        state.launched.push(spec.clone());
        state.next_pid = state.next_pid.saturating_add(1);
        let pid = state.next_pid;
        if state.exit_on_launch.is_some() {
            state.exited.push(pid);
        }

        Ok(Box::new(InMemoryServerProcess {
            pid,
            state: Arc::clone(&self.state),
        }))
    }
}

/// Process handed out by [`InMemoryServerLauncher`].
#[derive(Debug)]
pub struct InMemoryServerProcess {
    pid: u32,
    state: Arc<Mutex<LauncherState>>,
}

#[async_trait]
impl ServerProcess for InMemoryServerProcess {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn try_exit(&mut self) -> ServerLaunchResult<Option<ProcessExit>> {
        let state = lock(&self.state);
        if !state.exited.contains(&self.pid) {
            return Ok(None);
        }
        Ok(Some(
            state.exit_on_launch.unwrap_or(ProcessExit { code: None }),
        ))
    }

    async fn terminate(&mut self, _grace: Duration) -> ServerLaunchResult<()> {
        let mut state = lock(&self.state);
        if state.fail_termination {
            return Err(ServerLaunchError::Signal("operation not permitted".to_owned()));
        }
        state.terminations = state.terminations.saturating_add(1);
        state.exited.push(self.pid);
        Ok(())
    }
}
