//! Behaviour tests for tool server startup and release.

use std::sync::Arc;
use std::time::Duration;

use eyre::{WrapErr, eyre};
use hexpilot::supervisor::{
    adapters::memory::{InMemoryHealthProbe, InMemoryServerLauncher},
    domain::{Backoff, ServerLaunchSpec, SupervisorConfig},
    services::{ProcessSupervisor, ServerHandle, StartupError},
};
use mockable::DefaultClock;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

type TestSupervisor = ProcessSupervisor<InMemoryHealthProbe, InMemoryServerLauncher, DefaultClock>;

struct StartupWorld {
    probe: InMemoryHealthProbe,
    launcher: InMemoryServerLauncher,
    max_attempts: u32,
    supervisor: Option<TestSupervisor>,
    handle: Option<ServerHandle>,
    error: Option<StartupError>,
}

impl StartupWorld {
    fn new() -> Self {
        Self {
            probe: InMemoryHealthProbe::unreachable(),
            launcher: InMemoryServerLauncher::new(),
            max_attempts: 30,
            supervisor: None,
            handle: None,
            error: None,
        }
    }

    fn build_supervisor(&self) -> Result<TestSupervisor, eyre::Report> {
        let launch = ServerLaunchSpec::new("/opt/hexstrike/hexstrike-env/bin/python3")
            .wrap_err("launch spec should be valid")?
            .with_args([
                "/opt/hexstrike/hexstrike_server.py".to_owned(),
                "--port".to_owned(),
                "8888".to_owned(),
            ]);
        let config = SupervisorConfig::new("http://127.0.0.1:8888", launch)
            .wrap_err("supervisor config should be valid")?
            .with_max_attempts(self.max_attempts)
            .with_backoff(Backoff::Fixed(Duration::from_millis(5)));

        Ok(ProcessSupervisor::new(
            Arc::new(self.probe.clone()),
            Arc::new(self.launcher.clone()),
            Arc::new(DefaultClock),
            config,
        ))
    }

    fn handle(&self) -> Result<&ServerHandle, eyre::Report> {
        self.handle
            .as_ref()
            .ok_or_else(|| eyre!("server should have started"))
    }
}

#[fixture]
fn world() -> StartupWorld {
    StartupWorld::new()
}

fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

#[given("a tool server that never answers its readiness probe")]
fn server_never_ready(world: &mut StartupWorld) {
    world.probe = InMemoryHealthProbe::unreachable();
}

#[given("a tool server that is already answering")]
fn server_already_running(world: &mut StartupWorld) {
    world.probe = InMemoryHealthProbe::ready();
}

#[given("a tool server that becomes ready after {failures} failed probes")]
fn server_ready_after(world: &mut StartupWorld, failures: u32) {
    world.probe = InMemoryHealthProbe::ready_after(failures);
}

#[given("a startup budget of {attempts} attempts")]
fn startup_budget(world: &mut StartupWorld, attempts: u32) {
    world.max_attempts = attempts;
}

#[when("the session starts the tool server")]
fn start_server(world: &mut StartupWorld) -> Result<(), eyre::Report> {
    let supervisor = world.build_supervisor()?;
    match run_async(supervisor.ensure_running()) {
        Ok(handle) => world.handle = Some(handle),
        Err(err) => world.error = Some(err),
    }
    world.supervisor = Some(supervisor);
    Ok(())
}

#[when("the session releases the tool server twice")]
fn release_twice(world: &mut StartupWorld) -> Result<(), eyre::Report> {
    let supervisor = world
        .supervisor
        .as_ref()
        .ok_or_else(|| eyre!("supervisor should exist"))?;
    let handle = world
        .handle
        .as_mut()
        .ok_or_else(|| eyre!("server should have started"))?;
    run_async(supervisor.shutdown(handle));
    run_async(supervisor.shutdown(handle));
    Ok(())
}

#[then("startup fails after {attempts} readiness attempts")]
fn startup_fails(world: &StartupWorld, attempts: u32) -> Result<(), eyre::Report> {
    match world.error.as_ref() {
        Some(StartupError::NotReady {
            attempts: reported, ..
        }) if *reported == attempts => Ok(()),
        other => Err(eyre!("expected NotReady after {attempts} attempts, got {other:?}")),
    }
}

#[then("the spawned server was killed")]
fn spawned_server_killed(world: &StartupWorld) -> Result<(), eyre::Report> {
    if world.launcher.launch_count() != 1 || world.launcher.termination_count() != 1 {
        return Err(eyre!(
            "expected one launch and one termination, saw {} and {}",
            world.launcher.launch_count(),
            world.launcher.termination_count()
        ));
    }
    Ok(())
}

#[then("no server process was spawned")]
fn nothing_spawned(world: &StartupWorld) -> Result<(), eyre::Report> {
    if world.launcher.launch_count() != 0 || world.launcher.termination_count() != 0 {
        return Err(eyre!("a detected server must never be launched or terminated"));
    }
    Ok(())
}

#[then("one server process was spawned")]
fn one_spawned(world: &StartupWorld) -> Result<(), eyre::Report> {
    if world.launcher.launch_count() != 1 {
        return Err(eyre!(
            "expected one launch, saw {}",
            world.launcher.launch_count()
        ));
    }
    Ok(())
}

#[then(r#"the server status is "{status}""#)]
fn server_status(world: &StartupWorld, status: String) -> Result<(), eyre::Report> {
    let actual = world.handle()?.status();
    if actual.as_str() != status {
        return Err(eyre!("expected status {status}, found {actual}"));
    }
    Ok(())
}

#[scenario(
    path = "tests/features/tool_server_startup.feature",
    name = "Startup fails when the server never becomes ready"
)]
#[tokio::test(flavor = "multi_thread")]
async fn startup_fails_when_never_ready(world: StartupWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/tool_server_startup.feature",
    name = "A running server is adopted and left running"
)]
#[tokio::test(flavor = "multi_thread")]
async fn running_server_is_adopted(world: StartupWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/tool_server_startup.feature",
    name = "A spawned server is terminated on release"
)]
#[tokio::test(flavor = "multi_thread")]
async fn spawned_server_is_terminated(world: StartupWorld) {
    let _ = world;
}
