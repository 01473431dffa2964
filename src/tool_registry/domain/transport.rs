//! Launch settings and deadlines for the MCP peer process.

use super::ToolRegistryDomainError;
use camino::{Utf8Path, Utf8PathBuf};
use std::time::Duration;

const DEFAULT_REQUEST_DEADLINE: Duration = Duration::from_secs(30);
const DEFAULT_INVOCATION_DEADLINE: Duration = Duration::from_secs(300);

/// Per-request deadlines on the MCP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportTimeouts {
    /// Deadline for handshake and discovery requests.
    pub request: Duration,
    /// Deadline for a single tool invocation.
    pub invocation: Duration,
}

impl Default for TransportTimeouts {
    fn default() -> Self {
        Self {
            request: DEFAULT_REQUEST_DEADLINE,
            invocation: DEFAULT_INVOCATION_DEADLINE,
        }
    }
}

/// How to start the MCP peer that bridges to the tool server.
///
/// The peer inherits the session's environment; only its command line,
/// working directory, and deadlines are configurable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpPeerSpec {
    program: String,
    args: Vec<String>,
    working_directory: Option<Utf8PathBuf>,
    timeouts: TransportTimeouts,
}

impl McpPeerSpec {
    /// Describes a peer started as `program`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolRegistryDomainError::EmptyPeerCommand`] when `program`
    /// is blank.
    pub fn new(program: impl Into<String>) -> Result<Self, ToolRegistryDomainError> {
        let raw = program.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ToolRegistryDomainError::EmptyPeerCommand);
        }

        Ok(Self {
            program: trimmed.to_owned(),
            args: Vec::new(),
            working_directory: None,
            timeouts: TransportTimeouts::default(),
        })
    }

    /// Replaces the peer's arguments.
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args = args.into_iter().collect();
        self
    }

    /// Starts the peer inside `directory`.
    #[must_use]
    pub fn with_working_directory(mut self, directory: impl Into<Utf8PathBuf>) -> Self {
        self.working_directory = Some(directory.into());
        self
    }

    /// Replaces the request deadlines.
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: TransportTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Program started for the peer.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the program.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Directory the peer starts in, when set.
    #[must_use]
    pub fn working_directory(&self) -> Option<&Utf8Path> {
        self.working_directory.as_deref()
    }

    /// Deadlines applied to requests on the connection.
    #[must_use]
    pub const fn timeouts(&self) -> TransportTimeouts {
        self.timeouts
    }
}
