//! Line-oriented operator console.

use crate::conversation::{
    ports::ModelAdapter,
    services::{Completion, ConversationLoop, ConversationLoopError, TurnOutcome},
};
use crate::supervisor::domain::ServerStatus;
use crate::tool_registry::ports::ToolTransport;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tracing::{debug, warn};

const DESCRIPTION_PREVIEW_CHARS: usize = 80;
const PROMPT: &str = "You: ";
const SERVER_DOWN_NOTICE: &str =
    "[!] The hexstrike server has stopped; tool calls will fail until hexpilot is restarted.";

type HealthCheck<'a> = Box<dyn FnMut() -> ServerStatus + 'a>;

/// Why the console stopped reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplExit {
    /// The operator typed `exit` or `quit`.
    Quit,
    /// Input reached end of stream.
    EndOfInput,
    /// The interrupt signal fired.
    Interrupted,
}

impl ReplExit {
    /// Returns a stable label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quit => "quit",
            Self::EndOfInput => "end_of_input",
            Self::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for ReplExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Console I/O failure.
#[derive(Debug, Clone, Error)]
#[error("console I/O failure: {0}")]
pub struct ReplError(Arc<std::io::Error>);

impl From<std::io::Error> for ReplError {
    fn from(err: std::io::Error) -> Self {
        Self(Arc::new(err))
    }
}

/// Reads operator lines and feeds them to a [`ConversationLoop`].
pub struct Repl<'a, R, W> {
    input: R,
    output: W,
    interrupt: Option<watch::Receiver<bool>>,
    health: Option<HealthCheck<'a>>,
    server_down_reported: bool,
}

impl<'a, R, W> Repl<'a, R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a console over `input` and `output`.
    #[must_use]
    pub const fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            interrupt: None,
            health: None,
            server_down_reported: false,
        }
    }

    /// Stops reading when `signal` becomes `true`.
    #[must_use]
    pub fn with_interrupt(mut self, signal: watch::Receiver<bool>) -> Self {
        self.interrupt = Some(signal);
        self
    }

    /// Consults `check` before each message is sent to the model and warns
    /// the operator once when it reports a failed tool server.
    #[must_use]
    pub fn with_health_check(mut self, check: impl FnMut() -> ServerStatus + 'a) -> Self {
        self.health = Some(Box::new(check));
        self
    }

    /// Consumes the console and returns its output sink.
    #[must_use]
    pub fn into_output(self) -> W {
        self.output
    }

    /// Runs the console until the operator leaves.
    ///
    /// Model failures are reported and the console keeps reading; the
    /// failed message stays in the history.
    ///
    /// # Errors
    ///
    /// Returns [`ReplError`] when reading input or writing output fails.
    pub async fn run<M, T>(
        &mut self,
        conversation: &mut ConversationLoop<M, T>,
    ) -> Result<ReplExit, ReplError>
    where
        M: ModelAdapter + ?Sized,
        T: ToolTransport,
    {
        self.print_banner(conversation).await?;

        loop {
            let Some(line) = self.read_line().await? else {
                if self.is_interrupted() {
                    return Ok(ReplExit::Interrupted);
                }
                self.emit("\nExiting.").await?;
                return Ok(ReplExit::EndOfInput);
            };
            let trimmed = line.trim();
            if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
                self.emit("Goodbye.").await?;
                return Ok(ReplExit::Quit);
            }
            if trimmed.is_empty() {
                continue;
            }
            if self.is_interrupted() {
                return Ok(ReplExit::Interrupted);
            }
            self.report_server_health().await?;

            match conversation.submit(trimmed).await {
                Ok(outcome) => {
                    if self.print_outcome(&outcome).await? {
                        return Ok(ReplExit::Interrupted);
                    }
                }
                Err(ConversationLoopError::Adapter(err)) => {
                    warn!(error = %err, "model request failed");
                    self.emit(&format!("\n[!] Model request failed: {err}\n"))
                        .await?;
                }
                Err(err) => {
                    warn!(error = %err, "message rejected");
                    self.emit(&format!("[!] {err}")).await?;
                }
            }
        }
    }

    async fn print_banner<M, T>(
        &mut self,
        conversation: &ConversationLoop<M, T>,
    ) -> Result<(), ReplError>
    where
        M: ModelAdapter + ?Sized,
        T: ToolTransport,
    {
        let registry = conversation.registry();
        let mut banner = format!("\n[*] {} MCP tools available:\n", registry.len());
        for tool in registry.tools() {
            let preview: String = tool
                .description()
                .lines()
                .next()
                .unwrap_or_default()
                .chars()
                .take(DESCRIPTION_PREVIEW_CHARS)
                .collect();
            banner.push_str(&format!("    - {}: {preview}\n", tool.name()));
        }
        banner.push_str("\nChat started. Type 'exit' or 'quit' to stop.\n");
        self.emit(&banner).await
    }

    /// Returns `true` when the turn was cancelled.
    async fn print_outcome(&mut self, outcome: &TurnOutcome) -> Result<bool, ReplError> {
        for text in &outcome.commentary {
            self.emit(&format!("\nAssistant: {text}\n")).await?;
        }
        for record in &outcome.dispatched {
            let verb = if record.is_error { "failed" } else { "returned" };
            self.emit(&format!(
                "[tool] {} {verb} ({} chars)",
                record.tool_name, record.output_chars
            ))
            .await?;
        }

        match &outcome.completion {
            Completion::Reply(text) => {
                self.emit(&format!("\nAssistant: {text}\n")).await?;
                Ok(false)
            }
            Completion::RoundLimitReached => {
                self.emit("[!] Tool round limit reached; waiting for your input.")
                    .await?;
                Ok(false)
            }
            Completion::Cancelled => {
                self.emit("\n[!] Interrupted.").await?;
                Ok(true)
            }
        }
    }

    async fn report_server_health(&mut self) -> Result<(), ReplError> {
        let Some(check) = self.health.as_mut() else {
            return Ok(());
        };
        if self.server_down_reported || check() != ServerStatus::Failed {
            return Ok(());
        }

        self.server_down_reported = true;
        warn!("tool server is no longer running");
        self.emit(SERVER_DOWN_NOTICE).await
    }

    /// Returns `None` at end of input or when interrupted.
    async fn read_line(&mut self) -> Result<Option<String>, ReplError> {
        self.output.write_all(PROMPT.as_bytes()).await?;
        self.output.flush().await?;

        let mut line = String::new();
        let read = tokio::select! {
            biased;
            () = interrupted(self.interrupt.as_mut()) => {
                debug!("input abandoned after interrupt");
                return Ok(None);
            }
            read = self.input.read_line(&mut line) => read?,
        };

        Ok((read > 0).then_some(line))
    }

    fn is_interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(|signal| *signal.borrow())
    }

    async fn emit(&mut self, text: &str) -> Result<(), ReplError> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        self.output.flush().await?;
        Ok(())
    }
}

async fn interrupted(signal: Option<&mut watch::Receiver<bool>>) {
    if let Some(receiver) = signal {
        let closed = receiver.wait_for(|fired| *fired).await.is_err();
        if !closed {
            return;
        }
    }
    std::future::pending::<()>().await;
}
