//! Scripted model adapter for deterministic tests.

use crate::conversation::{
    domain::{Conversation, ConversationTurn, ModelTurn},
    ports::{AdapterError, AdapterResult, ModelAdapter},
};
use crate::tool_registry::domain::ToolRegistry;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Adapter replaying queued turns in order. Clones share state.
///
/// Each call records a snapshot of the history it was given. Once the
/// script is exhausted, inference fails with
/// [`AdapterError::InvalidResponse`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedModelAdapter {
    state: Arc<Mutex<ScriptState>>,
}

#[derive(Debug, Default)]
struct ScriptState {
    script: VecDeque<AdapterResult<ModelTurn>>,
    seen: Vec<Vec<ConversationTurn>>,
    latency: Option<Duration>,
}

impl ScriptedModelAdapter {
    /// Creates an adapter with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a model turn.
    #[must_use]
    pub fn then_reply(self, turn: ModelTurn) -> Self {
        lock(&self.state).script.push_back(Ok(turn));
        self
    }

    /// Queues an adapter failure.
    #[must_use]
    pub fn then_fail(self, error: AdapterError) -> Self {
        lock(&self.state).script.push_back(Err(error));
        self
    }

    /// Delays every inference by `latency`.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        lock(&self.state).latency = Some(latency);
        self
    }

    /// Returns how many inferences ran.
    #[must_use]
    pub fn call_count(&self) -> usize {
        lock(&self.state).seen.len()
    }

    /// Returns the history each inference received, in call order.
    #[must_use]
    pub fn seen_histories(&self) -> Vec<Vec<ConversationTurn>> {
        lock(&self.state).seen.clone()
    }

    /// Returns the number of turns each inference received.
    #[must_use]
    pub fn seen_lengths(&self) -> Vec<usize> {
        lock(&self.state).seen.iter().map(Vec::len).collect()
    }
}

#[async_trait]
impl ModelAdapter for ScriptedModelAdapter {
    async fn infer(
        &self,
        conversation: &Conversation,
        _registry: &ToolRegistry,
    ) -> AdapterResult<ModelTurn> {
        let latency = {
            let mut state = lock(&self.state);
            state.seen.push(conversation.turns().to_vec());
            state.latency
        };

        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }

        lock(&self.state).script.pop_front().unwrap_or_else(|| {
            Err(AdapterError::InvalidResponse(
                "scripted model has no more turns".to_owned(),
            ))
        })
    }

    fn provider(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted"
    }
}
