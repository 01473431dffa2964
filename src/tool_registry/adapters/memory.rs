//! In-memory tool transport for deterministic tests.
//!
//! Results are scripted per tool and consumed in order. Every invocation is
//! recorded so tests can assert dispatch order and arguments after the
//! transport has been moved into a conversation loop.

use crate::tool_registry::{
    domain::{InvocationResult, ToolDescriptor, ToolRegistry, ToolRegistryDomainError},
    ports::{InvocationError, ToolError, ToolTransport, TransportError},
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// A tool call observed by [`InMemoryToolTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedInvocation {
    /// Invoked tool.
    pub tool: String,
    /// Arguments passed.
    pub arguments: Value,
}

/// Scripted tool transport. Clones share state.
#[derive(Debug, Clone)]
pub struct InMemoryToolTransport {
    registry: Arc<ToolRegistry>,
    state: Arc<Mutex<TransportState>>,
}

#[derive(Debug, Default)]
struct TransportState {
    scripted: HashMap<String, VecDeque<Result<InvocationResult, InvocationError>>>,
    initialize_failure: Option<TransportError>,
    latency: Option<Duration>,
    invocations: Vec<RecordedInvocation>,
    initialized: bool,
    closes: u32,
}

impl InMemoryToolTransport {
    /// Creates a transport exposing `tools`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolRegistryDomainError::DuplicateToolName`] when two tools
    /// share a name.
    pub fn new(
        tools: impl IntoIterator<Item = ToolDescriptor>,
    ) -> Result<Self, ToolRegistryDomainError> {
        Ok(Self {
            registry: Arc::new(ToolRegistry::new(tools)?),
            state: Arc::new(Mutex::new(TransportState::default())),
        })
    }

    /// Queues the next result for `tool`.
    ///
    /// Unscripted invocations succeed with the text `ok`.
    #[must_use]
    pub fn with_result(self, tool: &str, result: InvocationResult) -> Self {
        self.push(tool, Ok(result));
        self
    }

    /// Queues the next failure for `tool`.
    #[must_use]
    pub fn with_failure(self, tool: &str, error: InvocationError) -> Self {
        self.push(tool, Err(error));
        self
    }

    /// Makes [`ToolTransport::initialize`] fail with `error`.
    #[must_use]
    pub fn failing_initialize(self, error: TransportError) -> Self {
        lock(&self.state).initialize_failure = Some(error);
        self
    }

    /// Delays every invocation by `latency`.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        lock(&self.state).latency = Some(latency);
        self
    }

    /// Returns the invocations received in order.
    #[must_use]
    pub fn invocations(&self) -> Vec<RecordedInvocation> {
        lock(&self.state).invocations.clone()
    }

    /// Returns how often [`ToolTransport::close`] was called.
    #[must_use]
    pub fn close_count(&self) -> u32 {
        lock(&self.state).closes
    }

    fn push(&self, tool: &str, outcome: Result<InvocationResult, InvocationError>) {
        lock(&self.state)
            .scripted
            .entry(tool.to_owned())
            .or_default()
            .push_back(outcome);
    }
}

#[async_trait]
impl ToolTransport for InMemoryToolTransport {
    async fn initialize(&mut self) -> Result<Arc<ToolRegistry>, TransportError> {
        let mut state = lock(&self.state);
        if let Some(error) = state.initialize_failure.clone() {
            return Err(error);
        }
        state.initialized = true;
        Ok(Arc::clone(&self.registry))
    }

    async fn invoke(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> Result<InvocationResult, InvocationError> {
        let latency = {
            let mut state = lock(&self.state);
            if !state.initialized {
                return Err(TransportError::NotInitialized.into());
            }
            if !self.registry.contains(name) {
                return Err(ToolError::UnknownTool(name.to_owned()).into());
            }
            state.invocations.push(RecordedInvocation {
                tool: name.to_owned(),
                arguments,
            });
            state.latency
        };

        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }

        lock(&self.state)
            .scripted
            .get_mut(name)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(InvocationResult::text("ok")))
    }

    async fn close(&mut self) {
        let mut state = lock(&self.state);
        state.closes = state.closes.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nmap() -> ToolDescriptor {
        ToolDescriptor::new("nmap_scan", "Run nmap", ToolDescriptor::default_schema())
            .expect("valid descriptor")
    }

    #[tokio::test]
    async fn scripted_results_are_consumed_in_order() {
        let mut transport = InMemoryToolTransport::new([nmap()])
            .expect("valid catalog")
            .with_result("nmap_scan", InvocationResult::text("first"))
            .with_result("nmap_scan", InvocationResult::text("second"));
        let observer = transport.clone();
        transport.initialize().await.expect("initialize");

        let first = transport.invoke("nmap_scan", json!({"target": "a"})).await;
        let second = transport.invoke("nmap_scan", json!({"target": "b"})).await;
        let third = transport.invoke("nmap_scan", json!({})).await;

        assert_eq!(first.expect("scripted").content().render(), "first");
        assert_eq!(second.expect("scripted").content().render(), "second");
        assert_eq!(third.expect("default").content().render(), "ok");
        let recorded = observer.invocations();
        assert_eq!(recorded.len(), 3);
        assert_eq!(
            recorded.first().map(|call| &call.arguments),
            Some(&json!({"target": "a"}))
        );
    }

    #[tokio::test]
    async fn unknown_tools_are_not_recorded() {
        let mut transport = InMemoryToolTransport::new([nmap()]).expect("valid catalog");
        transport.initialize().await.expect("initialize");

        let result = transport.invoke("hydra_attack", json!({})).await;

        assert!(matches!(
            result,
            Err(InvocationError::Tool(ToolError::UnknownTool(_)))
        ));
        assert!(transport.invocations().is_empty());
    }
}
