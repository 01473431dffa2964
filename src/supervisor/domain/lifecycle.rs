//! Lifecycle state of the supervised tool server.

use super::SupervisorDomainError;
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::fmt;

/// Status of the supervised server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerStatus {
    /// The server was spawned or detected and is not yet confirmed ready.
    Starting,
    /// The readiness probe succeeded.
    Ready,
    /// Startup or termination failed, or the process exited unexpectedly.
    Failed,
    /// The session released the server.
    Stopped,
}

impl ServerStatus {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }

    /// Returns whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Stopped)
    }

    /// Returns whether transition to `target` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Starting, Self::Ready | Self::Failed) | (Self::Ready, Self::Stopped | Self::Failed)
        )
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// How the session came to hold the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerOwnership {
    /// The supervisor spawned the server and must terminate it.
    Spawned,
    /// The server was already running and must be left alone.
    Detected,
}

/// Monotonic lifecycle record of the supervised server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLifecycle {
    status: ServerStatus,
    ownership: ServerOwnership,
    base_address: String,
    process_id: Option<u32>,
    started_at: DateTime<Utc>,
    ready_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl ServerLifecycle {
    /// Creates a lifecycle record in the `Starting` state.
    #[must_use]
    pub fn starting(
        ownership: ServerOwnership,
        base_address: impl Into<String>,
        process_id: Option<u32>,
        clock: &impl Clock,
    ) -> Self {
        Self {
            status: ServerStatus::Starting,
            ownership,
            base_address: base_address.into(),
            process_id,
            started_at: clock.utc(),
            ready_at: None,
            finished_at: None,
        }
    }

    /// Returns the current status.
    #[must_use]
    pub const fn status(&self) -> ServerStatus {
        self.status
    }

    /// Returns how the server is held.
    #[must_use]
    pub const fn ownership(&self) -> ServerOwnership {
        self.ownership
    }

    /// Returns the server base address.
    #[must_use]
    pub fn base_address(&self) -> &str {
        &self.base_address
    }

    /// Returns the process identifier of a spawned server.
    #[must_use]
    pub const fn process_id(&self) -> Option<u32> {
        self.process_id
    }

    /// Returns when supervision began.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns when the server became ready.
    #[must_use]
    pub const fn ready_at(&self) -> Option<DateTime<Utc>> {
        self.ready_at
    }

    /// Returns when the server reached a terminal state.
    #[must_use]
    pub const fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Marks the server ready.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorDomainError::InvalidStatusTransition`] unless the
    /// server is `Starting`.
    pub fn mark_ready(&mut self, clock: &impl Clock) -> Result<(), SupervisorDomainError> {
        self.transition_to(ServerStatus::Ready)?;
        self.ready_at = Some(clock.utc());
        Ok(())
    }

    /// Marks the server stopped.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorDomainError::InvalidStatusTransition`] unless the
    /// server is `Ready`.
    pub fn mark_stopped(&mut self, clock: &impl Clock) -> Result<(), SupervisorDomainError> {
        self.transition_to(ServerStatus::Stopped)?;
        self.finished_at = Some(clock.utc());
        Ok(())
    }

    /// Marks the server failed.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorDomainError::InvalidStatusTransition`] when the
    /// server is already terminal.
    pub fn mark_failed(&mut self, clock: &impl Clock) -> Result<(), SupervisorDomainError> {
        self.transition_to(ServerStatus::Failed)?;
        self.finished_at = Some(clock.utc());
        Ok(())
    }

    fn transition_to(&mut self, target: ServerStatus) -> Result<(), SupervisorDomainError> {
        if !self.status.can_transition_to(target) {
            return Err(SupervisorDomainError::InvalidStatusTransition {
                from: self.status.as_str().to_owned(),
                to: target.as_str().to_owned(),
            });
        }

        self.status = target;
        Ok(())
    }
}
