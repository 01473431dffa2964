//! Owned handle to the supervised server.

use crate::supervisor::{
    domain::{ServerLifecycle, ServerOwnership, ServerStatus},
    ports::ServerProcess,
};

/// The session's single handle to the tool server.
///
/// A spawned server's process is owned here, so dropping the handle without
/// calling [`ProcessSupervisor::shutdown`](super::ProcessSupervisor::shutdown)
/// still releases the child through the adapter's drop behaviour.
#[derive(Debug)]
pub struct ServerHandle {
    pub(super) lifecycle: ServerLifecycle,
    pub(super) process: Option<Box<dyn ServerProcess>>,
}

impl ServerHandle {
    /// Returns the current status.
    #[must_use]
    pub const fn status(&self) -> ServerStatus {
        self.lifecycle.status()
    }

    /// Returns whether the server was spawned or detected.
    #[must_use]
    pub const fn ownership(&self) -> ServerOwnership {
        self.lifecycle.ownership()
    }

    /// Returns the server base address.
    #[must_use]
    pub fn base_address(&self) -> &str {
        self.lifecycle.base_address()
    }

    /// Returns the process identifier of a spawned server.
    #[must_use]
    pub const fn process_id(&self) -> Option<u32> {
        self.lifecycle.process_id()
    }

    /// Returns the full lifecycle record.
    #[must_use]
    pub const fn lifecycle(&self) -> &ServerLifecycle {
        &self.lifecycle
    }
}
