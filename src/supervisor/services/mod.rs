//! Application services for tool server supervision.

mod handle;
mod lifecycle;

pub use handle::ServerHandle;
pub use lifecycle::{ProcessSupervisor, StartupError};
