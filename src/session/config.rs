//! Command-line and environment configuration.

use super::prompt::{DEFAULT_SYSTEM_PROMPT_TEMPLATE, PromptError, render_system_prompt};
use crate::conversation::services::LoopConfig;
use crate::supervisor::domain::{ServerLaunchSpec, SupervisorConfig, SupervisorDomainError};
use crate::tool_registry::domain::{
    McpPeerSpec, ToolRegistryDomainError, TransportTimeouts,
};
use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_HEXSTRIKE_DIR: &str = "/home/kali/hexstrike-ai";
const LOOPBACK: &str = "127.0.0.1";

/// Model provider selected for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    /// Anthropic Messages API.
    Anthropic,
    /// Google Gemini `generateContent` API.
    Gemini,
}

impl Provider {
    /// Returns the provider name used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }

    const fn api_key_env(self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw settings as parsed from flags and the environment.
#[derive(Clone, Parser)]
#[command(
    name = "hexpilot",
    version,
    about = "Operator console pairing a language model with hexstrike tools"
)]
pub struct AppConfig {
    /// Model provider.
    #[arg(long, env = "HEXPILOT_PROVIDER", value_enum, default_value_t = Provider::Anthropic)]
    pub provider: Provider,

    /// Anthropic API key.
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    /// Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Model identifier; defaults to the provider's default model.
    #[arg(long, env = "HEXPILOT_MODEL")]
    pub model: Option<String>,

    /// Directory holding the hexstrike checkout and its virtualenv.
    #[arg(long, env = "HEXSTRIKE_DIR", default_value = DEFAULT_HEXSTRIKE_DIR)]
    pub hexstrike_dir: String,

    /// Port the hexstrike server listens on.
    #[arg(long, env = "HEXSTRIKE_PORT", default_value_t = 8888)]
    pub hexstrike_port: u16,

    /// Command hosting the MCP peer.
    #[arg(long, env = "MCP_COMMAND")]
    pub mcp_command: Option<String>,

    /// Whitespace-separated arguments for the MCP peer.
    #[arg(long, env = "MCP_ARGS", allow_hyphen_values = true)]
    pub mcp_args: Option<String>,

    /// Deadline for a single tool call, in seconds.
    #[arg(long, env = "HEXPILOT_TOOL_TIMEOUT_SECS", default_value_t = 300)]
    pub tool_timeout_secs: u64,

    /// Readiness probes issued before startup is abandoned.
    #[arg(long, env = "HEXPILOT_STARTUP_ATTEMPTS", default_value_t = 30)]
    pub startup_attempts: u32,

    /// Tool rounds allowed per operator message.
    #[arg(long, env = "HEXPILOT_MAX_TOOL_ROUNDS", default_value_t = 10)]
    pub max_tool_rounds: u32,

    /// File holding a system prompt template.
    #[arg(long, env = "HEXPILOT_SYSTEM_PROMPT_FILE")]
    pub system_prompt_file: Option<String>,

    /// Engagement target made available to the prompt template.
    #[arg(long, env = "HEXPILOT_TARGET")]
    pub target: Option<String>,

    /// Log at debug level.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Errors raised while validating configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The selected provider has no API key.
    #[error("{provider} selected but no API key was provided (set {env})")]
    MissingApiKey {
        /// Selected provider.
        provider: Provider,
        /// Environment variable expected to hold the key.
        env: &'static str,
    },

    /// Tool calls need a non-zero deadline.
    #[error("tool timeout must be at least one second")]
    ZeroToolTimeout,

    /// The prompt template file could not be read.
    #[error("failed to read system prompt file '{path}': {source}")]
    PromptFile {
        /// Path that was read.
        path: String,
        /// Underlying I/O failure.
        source: Arc<std::io::Error>,
    },

    /// The prompt template did not render.
    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// Supervisor settings were rejected.
    #[error(transparent)]
    Supervisor(#[from] SupervisorDomainError),

    /// Transport settings were rejected.
    #[error(transparent)]
    Transport(#[from] ToolRegistryDomainError),
}

/// Provider credentials and model choice.
#[derive(Clone, PartialEq, Eq)]
pub struct ModelSettings {
    /// Selected provider.
    pub provider: Provider,
    /// Provider API key.
    pub api_key: String,
    /// Model override.
    pub model: Option<String>,
}

impl fmt::Debug for ModelSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSettings")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

/// Validated session settings.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Tool server supervision.
    pub supervisor: SupervisorConfig,
    /// MCP peer launch and deadlines.
    pub transport: McpPeerSpec,
    /// Conversation loop policy.
    pub loop_config: LoopConfig,
    /// Model provider selection.
    pub model: ModelSettings,
    /// Rendered system prompt.
    pub system_prompt: String,
}

impl AppConfig {
    /// Validates the raw settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the provider key is missing, a value is
    /// out of range, or the prompt template cannot be read or rendered.
    pub fn into_settings(self) -> Result<SessionSettings, ConfigError> {
        if self.tool_timeout_secs == 0 {
            return Err(ConfigError::ZeroToolTimeout);
        }

        let model = self.model_settings()?;
        let supervisor = self.supervisor_config()?;
        let transport = self.transport_config()?;
        let loop_config = LoopConfig::new().with_max_tool_rounds(self.max_tool_rounds);
        let system_prompt = self.system_prompt()?;

        Ok(SessionSettings {
            supervisor,
            transport,
            loop_config,
            model,
            system_prompt,
        })
    }

    fn hexstrike_dir(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(self.hexstrike_dir.trim())
    }

    fn server_address(&self) -> String {
        format!("http://{LOOPBACK}:{}", self.hexstrike_port)
    }

    fn venv_python(&self) -> Utf8PathBuf {
        self.hexstrike_dir().join("hexstrike-env").join("bin").join("python3")
    }

    fn model_settings(&self) -> Result<ModelSettings, ConfigError> {
        let key = match self.provider {
            Provider::Anthropic => self.anthropic_api_key.as_deref(),
            Provider::Gemini => self.gemini_api_key.as_deref(),
        };
        let api_key = key
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey {
                provider: self.provider,
                env: self.provider.api_key_env(),
            })?;

        Ok(ModelSettings {
            provider: self.provider,
            api_key: api_key.to_owned(),
            model: self
                .model
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_owned),
        })
    }

    fn supervisor_config(&self) -> Result<SupervisorConfig, ConfigError> {
        let dir = self.hexstrike_dir();
        let launch = ServerLaunchSpec::new(self.venv_python().into_string())?
            .with_args([
                dir.join("hexstrike_server.py").into_string(),
                "--port".to_owned(),
                self.hexstrike_port.to_string(),
            ])
            .with_log_file(dir.join("server.log"))
            .with_working_directory(dir);

        Ok(SupervisorConfig::new(self.server_address(), launch)?
            .with_max_attempts(self.startup_attempts))
    }

    fn transport_config(&self) -> Result<McpPeerSpec, ConfigError> {
        let Some(command) = self.mcp_command.as_deref() else {
            // The bundled bridge runs from the checkout next to the server.
            return Ok(self
                .peer_spec(self.venv_python().into_string())?
                .with_working_directory(self.hexstrike_dir()));
        };
        self.peer_spec(command.to_owned())
    }

    fn peer_spec(&self, command: String) -> Result<McpPeerSpec, ConfigError> {
        let args = self.mcp_args.as_ref().map_or_else(
            || {
                vec![
                    self.hexstrike_dir().join("hexstrike_mcp.py").into_string(),
                    "--server".to_owned(),
                    self.server_address(),
                ]
            },
            |raw| raw.split_whitespace().map(str::to_owned).collect(),
        );
        let timeouts = TransportTimeouts {
            invocation: Duration::from_secs(self.tool_timeout_secs),
            ..TransportTimeouts::default()
        };

        Ok(McpPeerSpec::new(command)?
            .with_args(args)
            .with_timeouts(timeouts))
    }

    fn system_prompt(&self) -> Result<String, ConfigError> {
        let template = match self.system_prompt_file.as_deref() {
            Some(path) => {
                std::fs::read_to_string(path).map_err(|err| ConfigError::PromptFile {
                    path: path.to_owned(),
                    source: Arc::new(err),
                })?
            }
            None => DEFAULT_SYSTEM_PROMPT_TEMPLATE.to_owned(),
        };

        Ok(render_system_prompt(
            &template,
            self.target.as_deref(),
            self.tool_timeout_secs,
        )?)
    }
}
