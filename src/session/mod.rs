//! Operator session wiring.
//!
//! A session brings the tool server up (or adopts a running one), connects
//! the MCP peer, builds the configured model adapter, and runs the console
//! until the operator leaves. Whatever the session started is torn down on
//! the way out, including after startup failures.

mod config;
mod input;
mod prompt;
mod repl;
mod telemetry;

pub use config::{AppConfig, ConfigError, ModelSettings, Provider, SessionSettings};
pub use input::spawn_line_reader;
pub use prompt::{DEFAULT_SYSTEM_PROMPT_TEMPLATE, PromptError, render_system_prompt};
pub use repl::{Repl, ReplError, ReplExit};
pub use telemetry::{TelemetryError, default_directive, init_telemetry};

use crate::conversation::{
    adapters::{AnthropicAdapter, GeminiAdapter},
    ports::{AdapterError, ModelAdapter},
    services::ConversationLoop,
};
use crate::supervisor::{
    adapters::{ReqwestHealthProbe, TokioServerLauncher},
    services::{ProcessSupervisor, ServerHandle, StartupError},
};
use crate::tool_registry::{
    adapters::StdioMcpTransport,
    ports::{ToolTransport, TransportError},
};
use mockable::DefaultClock;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

type SessionSupervisor = ProcessSupervisor<ReqwestHealthProbe, TokioServerLauncher, DefaultClock>;

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Configuration was invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// The tool server never became ready.
    #[error(transparent)]
    Startup(#[from] StartupError),

    /// The MCP peer could not be started or its catalog discovered.
    #[error("failed to connect to MCP peer: {0}")]
    Discovery(#[from] TransportError),

    /// The model adapter could not be built.
    #[error("failed to initialise model adapter: {0}")]
    Model(#[from] AdapterError),

    /// The console failed.
    #[error(transparent)]
    Console(#[from] ReplError),

    /// Operator input could not be attached.
    #[error("failed to read operator input: {0}")]
    Input(Arc<std::io::Error>),
}

/// Builds the adapter for the configured provider.
///
/// # Errors
///
/// Returns [`AdapterError`] when the HTTP client cannot be built.
pub fn build_model_adapter(
    settings: &ModelSettings,
    system_prompt: &str,
) -> Result<Arc<dyn ModelAdapter>, AdapterError> {
    let adapter: Arc<dyn ModelAdapter> = match settings.provider {
        Provider::Anthropic => {
            let base = AnthropicAdapter::new(settings.api_key.as_str(), system_prompt)?;
            Arc::new(match settings.model.as_deref() {
                Some(model) => base.with_model(model),
                None => base,
            })
        }
        Provider::Gemini => {
            let base = GeminiAdapter::new(settings.api_key.as_str(), system_prompt)?;
            Arc::new(match settings.model.as_deref() {
                Some(model) => base.with_model(model),
                None => base,
            })
        }
    };
    Ok(adapter)
}

/// Runs an interactive session on the process's stdin and stdout.
///
/// # Errors
///
/// Returns [`SessionError`] when startup fails or the console breaks. The
/// tool server is shut down on every path once it has been started.
pub async fn run(settings: SessionSettings) -> Result<(), SessionError> {
    let supervisor: SessionSupervisor = ProcessSupervisor::new(
        Arc::new(ReqwestHealthProbe::new()),
        Arc::new(TokioServerLauncher::new()),
        Arc::new(DefaultClock),
        settings.supervisor.clone(),
    );

    let mut server = supervisor.ensure_running().await?;
    info!(
        address = server.base_address(),
        ownership = ?server.ownership(),
        "tool server ready"
    );

    let result = run_connected(&settings, &supervisor, &mut server).await;
    supervisor.shutdown(&mut server).await;
    result
}

async fn run_connected(
    settings: &SessionSettings,
    supervisor: &SessionSupervisor,
    server: &mut ServerHandle,
) -> Result<(), SessionError> {
    let model = build_model_adapter(&settings.model, &settings.system_prompt)?;

    info!(
        command = settings.transport.command(),
        args = ?settings.transport.args(),
        "connecting to MCP peer"
    );
    let mut transport = StdioMcpTransport::spawn(&settings.transport)?;
    let registry = match transport.initialize().await {
        Ok(registry) => registry,
        Err(err) => {
            transport.close().await;
            return Err(SessionError::Discovery(err));
        }
    };
    info!(
        tools = registry.len(),
        provider = model.provider(),
        model = model.model(),
        "session initialised"
    );

    let input = match spawn_line_reader(std::io::BufReader::new(std::io::stdin())) {
        Ok(input) => input,
        Err(err) => {
            transport.close().await;
            return Err(SessionError::Input(Arc::new(err)));
        }
    };
    let (interrupt_tx, interrupt_rx) = watch::channel(false);
    let listener = tokio::spawn(forward_interrupts(interrupt_tx));

    let mut conversation = ConversationLoop::new(model, transport, registry, settings.loop_config)
        .with_cancellation(interrupt_rx.clone());
    let mut console = Repl::new(input, tokio::io::stdout())
        .with_interrupt(interrupt_rx)
        .with_health_check(|| supervisor.check_alive(server));

    let outcome = console.run(&mut conversation).await;
    listener.abort();
    conversation.close().await;

    let exit = outcome?;
    info!(reason = exit.as_str(), "session ended");
    Ok(())
}

async fn forward_interrupts(signal: watch::Sender<bool>) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("interrupt received");
            signal.send_replace(true);
        }
        Err(err) => warn!(error = %err, "failed to listen for interrupts"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::anthropic(Provider::Anthropic, None, "anthropic", crate::conversation::adapters::DEFAULT_ANTHROPIC_MODEL)]
    #[case::gemini(Provider::Gemini, Some("gemini-2.5-pro"), "gemini", "gemini-2.5-pro")]
    fn adapter_matches_the_selected_provider(
        #[case] provider: Provider,
        #[case] model: Option<&str>,
        #[case] expected_provider: &str,
        #[case] expected_model: &str,
    ) {
        let settings = ModelSettings {
            provider,
            api_key: "key".to_owned(),
            model: model.map(str::to_owned),
        };

        let adapter = build_model_adapter(&settings, "prompt").expect("adapter builds");

        assert_eq!(adapter.provider(), expected_provider);
        assert_eq!(adapter.model(), expected_model);
    }
}
