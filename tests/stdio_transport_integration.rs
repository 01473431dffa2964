//! Integration tests for the MCP transport against a real child process.
//!
//! The peer is a small shell script answering a fixed request sequence, so
//! these tests exercise process spawning, pipe framing, and shutdown.
#![cfg(unix)]

use hexpilot::tool_registry::{
    adapters::StdioMcpTransport,
    domain::{InvocationContent, McpPeerSpec, TransportTimeouts},
    ports::{InvocationError, ToolTransport, TransportError},
};
use rstest::rstest;
use serde_json::json;
use std::time::Duration;

const INITIALIZE_REPLY: &str = r#"{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"fake-hexstrike","version":"0.1.0"}}}"#;
const LIST_REPLY: &str = r#"{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"nmap_scan","description":"Run nmap","inputSchema":{"type":"object","properties":{"target":{"type":"string"}}}}]}}"#;
const CALL_REPLY: &str = r#"{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"22/tcp open ssh"}],"isError":false}}"#;

/// Reads initialize, the initialized notification, tools/list and one
/// tools/call, answering each request, then waits for stdin to close.
fn scripted_peer() -> String {
    format!(
        "read -r _; printf '%s\\n' '{INITIALIZE_REPLY}'; \
         read -r _; read -r _; printf '%s\\n' '{LIST_REPLY}'; \
         read -r _; echo 'peer diagnostics' >&2; printf '%s\\n' '{CALL_REPLY}'; \
         while read -r _; do :; done"
    )
}

fn config(script: &str, invocation: Duration) -> McpPeerSpec {
    McpPeerSpec::new("sh")
        .expect("valid command")
        .with_args(["-c".to_owned(), script.to_owned()])
        .with_timeouts(TransportTimeouts {
            request: Duration::from_secs(5),
            invocation,
        })
}

#[rstest]
#[tokio::test]
async fn discovers_and_invokes_through_a_child_process() {
    let mut transport =
        StdioMcpTransport::spawn(&config(&scripted_peer(), Duration::from_secs(5)))
            .expect("peer spawns");

    let registry = transport.initialize().await.expect("handshake succeeds");
    assert_eq!(registry.len(), 1);
    assert!(registry.contains("nmap_scan"));

    let result = transport
        .invoke("nmap_scan", json!({ "target": "10.10.11.50" }))
        .await
        .expect("call succeeds");
    assert!(!result.is_error());
    assert_eq!(
        result.content(),
        &InvocationContent::Text("22/tcp open ssh".to_owned())
    );

    transport.close().await;
    transport.close().await;
}

#[rstest]
#[tokio::test]
async fn silent_peer_times_out_and_poisons_the_connection() {
    let script = format!(
        "read -r _; printf '%s\\n' '{INITIALIZE_REPLY}'; \
         read -r _; read -r _; printf '%s\\n' '{LIST_REPLY}'; \
         while read -r _; do :; done"
    );
    let mut transport = StdioMcpTransport::spawn(&config(&script, Duration::from_millis(200)))
        .expect("peer spawns");
    transport.initialize().await.expect("handshake succeeds");

    let first = transport.invoke("nmap_scan", json!({})).await;
    let second = transport.invoke("nmap_scan", json!({})).await;

    assert!(matches!(
        first,
        Err(InvocationError::Transport(TransportError::Timeout { .. }))
    ));
    assert!(matches!(
        second,
        Err(InvocationError::Transport(TransportError::Unusable))
    ));
    transport.close().await;
}

#[rstest]
#[tokio::test]
async fn peer_exiting_during_handshake_is_reported() {
    let mut transport = StdioMcpTransport::spawn(&config("exit 0", Duration::from_secs(5)))
        .expect("peer spawns");

    let result = transport.initialize().await;

    assert!(
        matches!(
            result,
            Err(TransportError::Closed | TransportError::Io(_))
        ),
        "unexpected result: {result:?}"
    );
    transport.close().await;
}

#[rstest]
#[tokio::test]
async fn missing_executable_fails_to_spawn() {
    let missing = McpPeerSpec::new("/nonexistent/hexpilot-peer").expect("valid command");

    let result = StdioMcpTransport::spawn(&missing);

    assert!(matches!(result, Err(TransportError::Spawn { .. })));
}
