//! Turn-taking loop between the operator, the model, and the tools.

use crate::conversation::{
    domain::{Conversation, ConversationDomainError, ModelTurn, RequestedToolCall, ToolCallId},
    ports::{AdapterError, ModelAdapter},
};
use crate::tool_registry::{
    domain::{InvocationContent, InvocationResult, ToolRegistry},
    ports::{InvocationError, ToolError, ToolTransport},
};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const DEFAULT_MAX_TOOL_ROUNDS: u32 = 10;
const CANCELLED_BEFORE_DISPATCH: &str = "cancelled before dispatch";
/// Recorded in place of a blank tool name so the history stays well formed.
const UNNAMED_TOOL: &str = "unnamed_tool";

/// Tuning for [`ConversationLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    max_tool_rounds: u32,
}

impl LoopConfig {
    /// Creates a configuration with default limits.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    /// Caps how many tool rounds one operator message may trigger.
    ///
    /// Values below one are raised to one.
    #[must_use]
    pub const fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = if rounds == 0 { 1 } else { rounds };
        self
    }

    /// Returns the tool round cap.
    #[must_use]
    pub const fn max_tool_rounds(&self) -> u32 {
        self.max_tool_rounds
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the loop is within an operator turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopState {
    /// Waiting for operator input.
    AwaitingUserInput,
    /// A model inference is in flight.
    Inferring,
    /// Requested tool calls are being executed.
    Dispatching,
    /// The model produced its final text for this turn.
    Terminal,
}

impl LoopState {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingUserInput => "awaiting_user_input",
            Self::Inferring => "inferring",
            Self::Dispatching => "dispatching",
            Self::Terminal => "terminal",
        }
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// How an operator turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The model answered with text.
    Reply(String),
    /// The tool round cap was hit; control returns to the operator.
    RoundLimitReached,
    /// The operator cancelled the turn.
    Cancelled,
}

/// A tool call executed during the turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRecord {
    /// Correlation id.
    pub id: ToolCallId,
    /// Invoked tool.
    pub tool_name: String,
    /// Whether the result was an error.
    pub is_error: bool,
    /// Length in characters of the rendered result.
    pub output_chars: usize,
}

/// Result of [`ConversationLoop::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// How the turn ended.
    pub completion: Completion,
    /// Text the model emitted alongside tool calls, in order.
    pub commentary: Vec<String>,
    /// Tool calls executed, in order.
    pub dispatched: Vec<DispatchRecord>,
}

impl TurnOutcome {
    const fn new() -> Self {
        Self {
            completion: Completion::Cancelled,
            commentary: Vec::new(),
            dispatched: Vec::new(),
        }
    }

    fn finish(mut self, completion: Completion) -> Self {
        self.completion = completion;
        self
    }
}

/// Errors that end an operator turn without a completion.
#[derive(Debug, Clone, Error)]
pub enum ConversationLoopError {
    /// The operator submitted blank input.
    #[error("message must not be empty")]
    EmptyInput,

    /// The model could not produce a turn.
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// A history rule was violated.
    #[error(transparent)]
    Domain(#[from] ConversationDomainError),
}

/// Drives the conversation: inference, tool dispatch, and history upkeep.
///
/// The loop owns the transport and the history. Tool calls run strictly in
/// the order the model requested them and each result is recorded before
/// the next call starts.
pub struct ConversationLoop<M, T>
where
    M: ModelAdapter + ?Sized,
    T: ToolTransport,
{
    model: Arc<M>,
    transport: T,
    registry: Arc<ToolRegistry>,
    conversation: Conversation,
    config: LoopConfig,
    state: LoopState,
    cancel: Option<watch::Receiver<bool>>,
}

impl<M, T> ConversationLoop<M, T>
where
    M: ModelAdapter + ?Sized,
    T: ToolTransport,
{
    /// Creates a loop over an initialized transport and its registry.
    #[must_use]
    pub fn new(
        model: Arc<M>,
        transport: T,
        registry: Arc<ToolRegistry>,
        config: LoopConfig,
    ) -> Self {
        Self {
            model,
            transport,
            registry,
            conversation: Conversation::new(),
            config,
            state: LoopState::AwaitingUserInput,
            cancel: None,
        }
    }

    /// Observes `signal`; the turn in progress is cancelled once it reads
    /// `true`.
    #[must_use]
    pub fn with_cancellation(mut self, signal: watch::Receiver<bool>) -> Self {
        self.cancel = Some(signal);
        self
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> LoopState {
        self.state
    }

    /// Returns the history.
    #[must_use]
    pub const fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Returns the tool catalog offered to the model.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Closes the tool transport.
    pub async fn close(&mut self) {
        self.transport.close().await;
    }

    /// Runs one operator turn to completion.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationLoopError::EmptyInput`] for blank input and
    /// [`ConversationLoopError::Adapter`] when inference fails. In both cases
    /// the loop is ready for the next submission.
    pub async fn submit(&mut self, text: &str) -> Result<TurnOutcome, ConversationLoopError> {
        if text.trim().is_empty() {
            return Err(ConversationLoopError::EmptyInput);
        }

        self.conversation.record_user_message(text);
        let result = self.run_turn().await;
        self.transition(LoopState::AwaitingUserInput);
        result
    }

    async fn run_turn(&mut self) -> Result<TurnOutcome, ConversationLoopError> {
        let mut outcome = TurnOutcome::new();
        let mut rounds = 0_u32;

        loop {
            if self.is_cancelled() {
                return Ok(outcome.finish(Completion::Cancelled));
            }

            self.transition(LoopState::Inferring);
            let inference = self.model.infer(&self.conversation, &self.registry);
            let turn = tokio::select! {
                biased;
                () = cancelled(self.cancel.as_mut()) => {
                    info!("inference abandoned after cancellation");
                    return Ok(outcome.finish(Completion::Cancelled));
                }
                turn = inference => turn?,
            };

            let (commentary, calls) = match turn {
                ModelTurn::FinalText(text) => {
                    self.conversation.record_assistant_message(text.clone());
                    self.transition(LoopState::Terminal);
                    return Ok(outcome.finish(Completion::Reply(text)));
                }
                ModelTurn::ToolCalls { commentary, calls } if calls.is_empty() => {
                    let text = commentary.unwrap_or_default();
                    self.conversation.record_assistant_message(text.clone());
                    self.transition(LoopState::Terminal);
                    return Ok(outcome.finish(Completion::Reply(text)));
                }
                ModelTurn::ToolCalls { commentary, calls } => (commentary, calls),
            };

            if let Some(text) = commentary {
                self.conversation.record_assistant_message(text.clone());
                outcome.commentary.push(text);
            }

            let pending = self.record_requests(calls)?;
            self.transition(LoopState::Dispatching);
            let cancelled_midway = self.dispatch_all(pending, &mut outcome).await?;
            if cancelled_midway {
                return Ok(outcome.finish(Completion::Cancelled));
            }

            rounds = rounds.saturating_add(1);
            if rounds >= self.config.max_tool_rounds() {
                warn!(
                    rounds,
                    "tool round limit reached, returning control to the operator"
                );
                return Ok(outcome.finish(Completion::RoundLimitReached));
            }
        }
    }

    /// Records every requested call before any runs, generating ids where the
    /// provider gave none or reused one.
    ///
    /// Calls without a tool name are recorded under a placeholder and later
    /// answered as unknown tools.
    fn record_requests(
        &mut self,
        calls: Vec<RequestedToolCall>,
    ) -> Result<Vec<PendingCall>, ConversationDomainError> {
        let mut pending = Vec::with_capacity(calls.len());
        for call in calls {
            let id = match call.id {
                Some(id) if !self.conversation.is_known_call_id(&id) => id,
                Some(reused) => {
                    warn!(id = %reused, "provider reused a tool call id, generating a fresh one");
                    ToolCallId::generate()
                }
                None => ToolCallId::generate(),
            };
            let unnamed = call.tool_name.trim().is_empty();
            let tool_name = if unnamed {
                warn!(id = %id, "model requested a tool call without a name");
                UNNAMED_TOOL.to_owned()
            } else {
                call.tool_name
            };
            self.conversation
                .record_tool_call(id.clone(), tool_name.clone(), call.arguments.clone())?;
            pending.push(PendingCall {
                id,
                tool_name,
                arguments: call.arguments,
                unnamed,
            });
        }
        Ok(pending)
    }

    /// Runs calls in order. Returns `true` when cancellation stopped the
    /// round; remaining calls then receive error results.
    async fn dispatch_all(
        &mut self,
        pending: Vec<PendingCall>,
        outcome: &mut TurnOutcome,
    ) -> Result<bool, ConversationDomainError> {
        let mut calls = pending.into_iter();
        while let Some(call) = calls.next() {
            if self.is_cancelled() {
                info!(
                    skipped = calls.len() + 1,
                    "skipping tool calls after cancellation"
                );
                for skipped in std::iter::once(call).chain(calls) {
                    self.conversation.record_tool_result(
                        &skipped.id,
                        InvocationResult::tool_failure(InvocationContent::Text(
                            CANCELLED_BEFORE_DISPATCH.to_owned(),
                        )),
                    )?;
                }
                return Ok(true);
            }

            let record = self.dispatch(call).await?;
            outcome.dispatched.push(record);
        }
        Ok(false)
    }

    async fn dispatch(
        &mut self,
        call: PendingCall,
    ) -> Result<DispatchRecord, ConversationDomainError> {
        let started = Instant::now();
        let result = if !call.unnamed && self.registry.contains(&call.tool_name) {
            match self.transport.invoke(&call.tool_name, call.arguments).await {
                Ok(result) => result,
                Err(err) => failure_result(&err),
            }
        } else {
            failure_result(&InvocationError::Tool(ToolError::UnknownTool(
                call.tool_name.clone(),
            )))
        };

        let record = DispatchRecord {
            id: call.id.clone(),
            tool_name: call.tool_name,
            is_error: result.is_error(),
            output_chars: result.content().render().chars().count(),
        };
        info!(
            tool = %record.tool_name,
            id = %record.id,
            is_error = record.is_error,
            output_chars = record.output_chars,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "tool call finished"
        );

        self.conversation.record_tool_result(&call.id, result)?;
        Ok(record)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|signal| *signal.borrow())
    }

    fn transition(&mut self, next: LoopState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "conversation loop transition");
            self.state = next;
        }
    }
}

#[derive(Debug)]
struct PendingCall {
    id: ToolCallId,
    tool_name: String,
    arguments: serde_json::Value,
    unnamed: bool,
}

fn failure_result(err: &InvocationError) -> InvocationResult {
    warn!(error = %err, "tool call failed");
    InvocationResult::tool_failure(InvocationContent::Text(format!("Error: {err}")))
}

/// Resolves once the signal reads `true`; never resolves without a signal
/// or after its sender is gone.
async fn cancelled(signal: Option<&mut watch::Receiver<bool>>) {
    if let Some(receiver) = signal {
        let closed = receiver.wait_for(|cancelled| *cancelled).await.is_err();
        if !closed {
            return;
        }
    }
    std::future::pending::<()>().await;
}
