//! MCP client speaking to a peer process over its standard streams.

use super::framed::{FramedConnection, RpcOutcome};
use super::protocol::{
    CallToolParams, CallToolResult, InitializeParams, JsonRpcError, ListToolsResult, ListedTool,
};
use crate::tool_registry::{
    domain::{
        InvocationContent, InvocationResult, McpPeerSpec, ToolDescriptor, ToolRegistry,
        TransportTimeouts,
    },
    ports::{InvocationError, ToolError, ToolTransport, TransportError},
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

const EXIT_GRACE: Duration = Duration::from_secs(2);

/// Transport to a peer spawned as a child process.
pub type StdioMcpTransport = McpToolTransport<BufReader<ChildStdout>, ChildStdin>;

/// MCP client over any newline-delimited byte stream pair.
#[derive(Debug)]
pub struct McpToolTransport<R, W> {
    connection: FramedConnection<R, W>,
    timeouts: TransportTimeouts,
    registry: Option<Arc<ToolRegistry>>,
    child: Option<Child>,
    closed: bool,
}

impl<R, W> McpToolTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Creates a client over an already connected stream pair.
    #[must_use]
    pub const fn new(reader: R, writer: W, timeouts: TransportTimeouts) -> Self {
        Self {
            connection: FramedConnection::new(reader, writer),
            timeouts,
            registry: None,
            child: None,
            closed: false,
        }
    }

    /// Returns the registry discovered by [`ToolTransport::initialize`].
    #[must_use]
    pub fn registry(&self) -> Option<Arc<ToolRegistry>> {
        self.registry.clone()
    }

    async fn handshake(&mut self) -> Result<(), TransportError> {
        let params = serde_json::to_value(InitializeParams::for_client()).map_err(|err| {
            TransportError::InvalidPayload {
                method: "initialize".to_owned(),
                reason: err.to_string(),
            }
        })?;
        let outcome = self
            .connection
            .request("initialize", Some(params), self.timeouts.request)
            .await?;
        let server = outcome.map_err(|err| TransportError::Handshake(err.message))?;

        let server_name = server
            .pointer("/serverInfo/name")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let protocol = server
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!(server = server_name, protocol, "MCP handshake complete");

        self.connection
            .notify("notifications/initialized", None)
            .await
    }

    async fn discover(&mut self) -> Result<Vec<ToolDescriptor>, TransportError> {
        let mut descriptors = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen_cursors = HashSet::new();

        loop {
            let params = cursor.as_ref().map(|next| json!({ "cursor": next }));
            let outcome = self
                .connection
                .request("tools/list", params, self.timeouts.request)
                .await?;
            let page: ListToolsResult = decode("tools/list", outcome)?;

            for tool in page.tools {
                descriptors.push(descriptor_from(tool)?);
            }

            match page.next_cursor {
                Some(next) if !next.is_empty() => {
                    if !seen_cursors.insert(next.clone()) {
                        return Err(TransportError::InvalidPayload {
                            method: "tools/list".to_owned(),
                            reason: format!("cursor '{next}' repeated"),
                        });
                    }
                    cursor = Some(next);
                }
                _ => break,
            }
        }

        Ok(descriptors)
    }
}

impl StdioMcpTransport {
    /// Spawns the peer process and connects to its standard streams.
    ///
    /// The peer's stderr is forwarded to the log at debug level.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Spawn`] when the process cannot be started.
    pub fn spawn(config: &McpPeerSpec) -> Result<Self, TransportError> {
        let mut command = Command::new(config.command());
        command
            .args(config.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(directory) = config.working_directory() {
            command.current_dir(directory);
        }

        let mut child = command.spawn().map_err(|err| TransportError::Spawn {
            command: config.command().to_owned(),
            source: Arc::new(err),
        })?;
        info!(command = config.command(), pid = child.id(), "spawned MCP peer");

        let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr));
        }

        let mut transport = Self::new(BufReader::new(stdout), stdin, config.timeouts());
        transport.child = Some(child);
        Ok(transport)
    }
}

#[async_trait]
impl<R, W> ToolTransport for McpToolTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn initialize(&mut self) -> Result<Arc<ToolRegistry>, TransportError> {
        if let Some(registry) = &self.registry {
            return Ok(Arc::clone(registry));
        }
        if self.closed {
            return Err(TransportError::Unusable);
        }

        self.handshake().await?;
        let registry = Arc::new(ToolRegistry::new(self.discover().await?)?);
        info!(tools = registry.len(), "discovered MCP tools");

        self.registry = Some(Arc::clone(&registry));
        Ok(registry)
    }

    async fn invoke(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> Result<InvocationResult, InvocationError> {
        let Some(registry) = &self.registry else {
            return Err(TransportError::NotInitialized.into());
        };
        if !registry.contains(name) {
            return Err(ToolError::UnknownTool(name.to_owned()).into());
        }

        let call_arguments = if arguments.is_null() {
            json!({})
        } else {
            arguments
        };
        let call = CallToolParams {
            name,
            arguments: call_arguments,
        };
        let params = serde_json::to_value(call).map_err(|err| {
            TransportError::InvalidPayload {
                method: "tools/call".to_owned(),
                reason: err.to_string(),
            }
        })?;

        debug!(tool = name, "invoking MCP tool");
        let answer = self
            .connection
            .request("tools/call", Some(params), self.timeouts.invocation)
            .await?
            .map_err(|err| remote_failure(name, err))?;
        let result: CallToolResult = decode("tools/call", Ok(answer))?;

        Ok(invocation_result(result))
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.connection.shutdown().await;

        let Some(mut child) = self.child.take() else {
            return;
        };
        match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => debug!(code = status.code(), "MCP peer exited"),
            Ok(Err(err)) => warn!(error = %err, "waiting for MCP peer failed"),
            Err(_) => {
                warn!("MCP peer did not exit after input closed, killing");
                if let Err(err) = child.kill().await {
                    warn!(error = %err, "killing MCP peer failed");
                }
            }
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    method: &str,
    outcome: RpcOutcome,
) -> Result<T, TransportError> {
    let value = outcome.map_err(|err| TransportError::InvalidPayload {
        method: method.to_owned(),
        reason: format!("peer returned error {}: {}", err.code, err.message),
    })?;
    serde_json::from_value(value).map_err(|err| TransportError::InvalidPayload {
        method: method.to_owned(),
        reason: err.to_string(),
    })
}

fn descriptor_from(tool: ListedTool) -> Result<ToolDescriptor, TransportError> {
    let schema = tool
        .input_schema
        .unwrap_or_else(ToolDescriptor::default_schema);
    Ok(ToolDescriptor::new(
        tool.name,
        tool.description.unwrap_or_default(),
        schema,
    )?)
}

fn remote_failure(tool: &str, err: JsonRpcError) -> ToolError {
    ToolError::Remote {
        tool: tool.to_owned(),
        code: err.code,
        message: err.message,
    }
}

fn invocation_result(result: CallToolResult) -> InvocationResult {
    let content = match (result.joined_text(), result.structured_content) {
        (Some(text), _) => InvocationContent::Text(text),
        (None, Some(structured)) => InvocationContent::Structured(structured),
        (None, None) => InvocationContent::Text(String::new()),
    };

    if result.is_error {
        InvocationResult::tool_failure(content)
    } else {
        InvocationResult::success(content)
    }
}

fn missing_pipe(stream: &str) -> TransportError {
    TransportError::io(std::io::Error::other(format!(
        "MCP peer {stream} was not captured"
    )))
}

async fn forward_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => debug!(target: "hexpilot::mcp_peer", "{line}"),
            Ok(None) => break,
            Err(err) => {
                debug!(error = %err, "MCP peer stderr closed");
                break;
            }
        }
    }
}
