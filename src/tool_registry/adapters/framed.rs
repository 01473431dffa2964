//! Newline-delimited JSON-RPC connection.
//!
//! Each frame is one JSON document terminated by `\n`. A timeout, an I/O
//! failure, or an undecodable frame poisons the connection because the
//! stream can no longer be trusted to line up with pending requests.

use super::protocol::{JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::tool_registry::ports::TransportError;
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

/// Outcome of a request that reached the peer and was answered.
pub type RpcOutcome = Result<Value, JsonRpcError>;

/// Sequential JSON-RPC client over a byte stream pair.
#[derive(Debug)]
pub struct FramedConnection<R, W> {
    reader: R,
    writer: W,
    next_id: u64,
    poisoned: bool,
}

impl<R, W> FramedConnection<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Wraps a reader and writer.
    #[must_use]
    pub const fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            next_id: 1,
            poisoned: false,
        }
    }

    /// Sends a request and waits up to `deadline` for its response.
    ///
    /// The outer `Result` reports link failures; the inner one carries the
    /// peer's answer.
    pub async fn request(
        &mut self,
        method: &str,
        params: Option<Value>,
        deadline: Duration,
    ) -> Result<RpcOutcome, TransportError> {
        if self.poisoned {
            return Err(TransportError::Unusable);
        }

        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);

        let result = self.round_trip(id, method, params, deadline).await;
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }

    /// Sends a notification.
    pub async fn notify(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> Result<(), TransportError> {
        if self.poisoned {
            return Err(TransportError::Unusable);
        }

        let frame = encode(&JsonRpcNotification::new(method, params))?;
        let result = self.write_frame(&frame).await;
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }

    /// Closes the write side so the peer sees end of input.
    pub async fn shutdown(&mut self) {
        self.poisoned = true;
        if let Err(err) = self.writer.shutdown().await {
            debug!(error = %err, "closing MCP input stream failed");
        }
    }

    async fn round_trip(
        &mut self,
        id: u64,
        method: &str,
        params: Option<Value>,
        deadline: Duration,
    ) -> Result<RpcOutcome, TransportError> {
        let frame = encode(&JsonRpcRequest::new(id, method, params))?;
        self.write_frame(&frame).await?;

        tokio::time::timeout(deadline, self.read_response(id))
            .await
            .map_err(|_| TransportError::Timeout {
                method: method.to_owned(),
                after: deadline,
            })?
    }

    async fn write_frame(&mut self, frame: &str) -> Result<(), TransportError> {
        trace!(frame, "-> MCP");
        self.writer
            .write_all(frame.as_bytes())
            .await
            .map_err(TransportError::io)?;
        self.writer.flush().await.map_err(TransportError::io)
    }

    async fn read_response(&mut self, id: u64) -> Result<RpcOutcome, TransportError> {
        loop {
            let line = self.read_frame().await?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let message: Value = serde_json::from_str(trimmed)
                .map_err(|err| TransportError::MalformedFrame(err.to_string()))?;
            if let Some(method) = message.get("method") {
                let name = method.as_str().unwrap_or_default();
                debug!(method = name, "ignoring peer-initiated MCP message");
                continue;
            }

            let response: JsonRpcResponse = serde_json::from_value(message)
                .map_err(|err| TransportError::MalformedFrame(err.to_string()))?;
            if !response.answers(id) {
                return Err(TransportError::UnexpectedResponse {
                    expected: id,
                    received: response.id.to_string(),
                });
            }
            return Ok(response.into_outcome());
        }
    }

    async fn read_frame(&mut self) -> Result<String, TransportError> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(TransportError::io)?;
        if read == 0 {
            return Err(TransportError::Closed);
        }
        if !line.ends_with('\n') {
            return Err(TransportError::MalformedFrame(
                "frame truncated by end of stream".to_owned(),
            ));
        }
        trace!(frame = line.trim_end(), "<- MCP");
        Ok(line)
    }
}

fn encode(frame: &impl serde::Serialize) -> Result<String, TransportError> {
    let mut encoded = serde_json::to_string(frame)
        .map_err(|err| TransportError::MalformedFrame(err.to_string()))?;
    encoded.push('\n');
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncWriteExt, BufReader};

    #[tokio::test]
    async fn ids_increase_per_request() {
        let (client, peer) = tokio::io::duplex(4096);
        let (client_read, client_write) = tokio::io::split(client);
        let mut connection = FramedConnection::new(BufReader::new(client_read), client_write);

        let peer_task = tokio::spawn(async move {
            let (peer_read, mut peer_write) = tokio::io::split(peer);
            let mut lines = BufReader::new(peer_read).lines();
            let mut seen = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                let request: Value = serde_json::from_str(&line).expect("client sends JSON");
                seen.push(request["id"].clone());
                let reply = format!(
                    "{}\n",
                    json!({"jsonrpc": "2.0", "id": request["id"], "result": {}})
                );
                peer_write.write_all(reply.as_bytes()).await.expect("peer writes");
                if seen.len() == 2 {
                    break;
                }
            }
            seen
        });

        for _ in 0..2 {
            connection
                .request("ping", None, Duration::from_secs(5))
                .await
                .expect("link healthy")
                .expect("peer answers");
        }

        let seen = peer_task.await.expect("peer task completes");
        assert_eq!(seen, vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn closed_stream_is_reported_and_poisons() {
        let (client, peer) = tokio::io::duplex(4096);
        drop(peer);
        let (client_read, client_write) = tokio::io::split(client);
        let mut connection = FramedConnection::new(BufReader::new(client_read), client_write);

        let first = connection
            .request("ping", None, Duration::from_secs(5))
            .await;
        let second = connection
            .request("ping", None, Duration::from_secs(5))
            .await;

        assert!(first.is_err());
        assert!(matches!(second, Err(TransportError::Unusable)));
    }
}
