//! Supervisor configuration value objects.

use super::SupervisorDomainError;
use camino::{Utf8Path, Utf8PathBuf};
use std::time::Duration;

/// Readiness endpoint polled by default.
///
/// The server's `/health` route shells out for every known tool and can take
/// tens of seconds, so the cache statistics route is used instead.
pub const DEFAULT_READINESS_PATH: &str = "/api/cache/stats";

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_MAX_ATTEMPTS: u32 = 30;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Launch settings for the supervised server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLaunchSpec {
    command: String,
    args: Vec<String>,
    working_directory: Option<Utf8PathBuf>,
    log_file: Option<Utf8PathBuf>,
}

impl ServerLaunchSpec {
    /// Creates a launch specification for `command`.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorDomainError::EmptyLaunchCommand`] when `command`
    /// is empty after trimming.
    pub fn new(command: impl Into<String>) -> Result<Self, SupervisorDomainError> {
        let normalized_command = command.into().trim().to_owned();
        if normalized_command.is_empty() {
            return Err(SupervisorDomainError::EmptyLaunchCommand);
        }

        Ok(Self {
            command: normalized_command,
            args: Vec::new(),
            working_directory: None,
            log_file: None,
        })
    }

    /// Replaces command-line arguments.
    #[must_use]
    pub fn with_args(mut self, values: impl IntoIterator<Item = String>) -> Self {
        self.args = values.into_iter().collect();
        self
    }

    /// Sets the working directory of the spawned process.
    #[must_use]
    pub fn with_working_directory(mut self, value: impl Into<Utf8PathBuf>) -> Self {
        self.working_directory = Some(value.into());
        self
    }

    /// Redirects the process's stdout and stderr into `value`.
    #[must_use]
    pub fn with_log_file(mut self, value: impl Into<Utf8PathBuf>) -> Self {
        self.log_file = Some(value.into());
        self
    }

    /// Returns the executable command.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns command-line arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns the optional working directory.
    #[must_use]
    pub fn working_directory(&self) -> Option<&Utf8Path> {
        self.working_directory.as_deref()
    }

    /// Returns the optional log file path.
    #[must_use]
    pub fn log_file(&self) -> Option<&Utf8Path> {
        self.log_file.as_deref()
    }
}

/// Delay policy between readiness probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// The same delay after every failed probe.
    Fixed(Duration),
    /// Doubling delay starting at `initial`, capped at `max`.
    Exponential {
        /// Delay after the first failed probe.
        initial: Duration,
        /// Upper bound for any single delay.
        max: Duration,
    },
}

impl Backoff {
    /// Returns the delay to wait after the zero-based failed `attempt`.
    #[must_use]
    pub fn delay_for(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => delay,
            Self::Exponential { initial, max } => {
                let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Fixed(DEFAULT_RETRY_DELAY)
    }
}

/// Complete supervisor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    base_address: String,
    readiness_path: String,
    launch: ServerLaunchSpec,
    probe_timeout: Duration,
    max_attempts: u32,
    backoff: Backoff,
    shutdown_grace: Duration,
}

impl SupervisorConfig {
    /// Creates a configuration with default polling and shutdown policy.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorDomainError`] when `base_address` is empty or does
    /// not start with `http://` or `https://`.
    pub fn new(
        base_address: impl Into<String>,
        launch: ServerLaunchSpec,
    ) -> Result<Self, SupervisorDomainError> {
        let normalized = base_address.into().trim().trim_end_matches('/').to_owned();
        if normalized.is_empty() {
            return Err(SupervisorDomainError::EmptyBaseAddress);
        }

        let has_valid_prefix =
            normalized.starts_with("http://") || normalized.starts_with("https://");
        if !has_valid_prefix {
            return Err(SupervisorDomainError::InvalidBaseAddress(normalized));
        }

        Ok(Self {
            base_address: normalized,
            readiness_path: DEFAULT_READINESS_PATH.to_owned(),
            launch,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::default(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        })
    }

    /// Overrides the readiness endpoint path.
    #[must_use]
    pub fn with_readiness_path(mut self, path: impl Into<String>) -> Self {
        let raw = path.into();
        let trimmed = raw.trim();
        self.readiness_path = if trimmed.starts_with('/') {
            trimmed.to_owned()
        } else {
            format!("/{trimmed}")
        };
        self
    }

    /// Overrides the per-probe timeout.
    #[must_use]
    pub const fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Overrides the readiness retry budget. Zero is raised to one.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Overrides the delay policy between probes.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Overrides how long a terminated server may take to exit before it is
    /// killed.
    #[must_use]
    pub const fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Returns the server base address without a trailing slash.
    #[must_use]
    pub fn base_address(&self) -> &str {
        &self.base_address
    }

    /// Returns the full readiness probe URL.
    #[must_use]
    pub fn readiness_url(&self) -> String {
        format!("{}{}", self.base_address, self.readiness_path)
    }

    /// Returns the launch specification.
    #[must_use]
    pub const fn launch(&self) -> &ServerLaunchSpec {
        &self.launch
    }

    /// Returns the per-probe timeout.
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// Returns the readiness retry budget.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the delay policy between probes.
    #[must_use]
    pub const fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Returns the shutdown grace period.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        self.shutdown_grace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn launch() -> ServerLaunchSpec {
        ServerLaunchSpec::new("python3").expect("valid launch command")
    }

    #[test]
    fn launch_spec_rejects_blank_command() {
        assert_eq!(
            ServerLaunchSpec::new("   "),
            Err(SupervisorDomainError::EmptyLaunchCommand)
        );
    }

    #[rstest]
    #[case("http://127.0.0.1:8888/", "http://127.0.0.1:8888/api/cache/stats")]
    #[case(" https://tools.local ", "https://tools.local/api/cache/stats")]
    fn readiness_url_joins_base_and_path(#[case] base: &str, #[case] expected: &str) {
        let config = SupervisorConfig::new(base, launch()).expect("valid base address");
        assert_eq!(config.readiness_url(), expected);
    }

    #[test]
    fn readiness_path_gains_leading_slash() {
        let config = SupervisorConfig::new("http://localhost:8888", launch())
            .expect("valid base address")
            .with_readiness_path("health");
        assert_eq!(config.readiness_url(), "http://localhost:8888/health");
    }

    #[rstest]
    #[case("")]
    #[case("ftp://localhost")]
    fn invalid_base_address_is_rejected(#[case] base: &str) {
        assert!(SupervisorConfig::new(base, launch()).is_err());
    }

    #[test]
    fn zero_attempts_is_raised_to_one() {
        let config = SupervisorConfig::new("http://localhost:8888", launch())
            .expect("valid base address")
            .with_max_attempts(0);
        assert_eq!(config.max_attempts(), 1);
    }

    #[rstest]
    #[case(0, 100)]
    #[case(1, 200)]
    #[case(2, 400)]
    #[case(5, 1_000)]
    #[case(40, 1_000)]
    fn exponential_backoff_doubles_until_capped(#[case] attempt: u32, #[case] millis: u64) {
        let backoff = Backoff::Exponential {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(1),
        };
        assert_eq!(backoff.delay_for(attempt), Duration::from_millis(millis));
    }
}
