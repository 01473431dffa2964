//! Port contracts for tool server supervision.

mod launcher;
mod probe;

pub use launcher::{
    ProcessExit, ServerLaunchError, ServerLaunchResult, ServerLauncher, ServerProcess,
};
pub use probe::{HealthProbe, HealthProbeError, HealthProbeResult};
