//! End-to-end relay tests: a real client socket through the axum gateway to
//! a mock upstream agent.

use async_trait::async_trait;
use futures::SinkExt;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use voicegate_core::{ToolDefinition, ToolError};
use voicegate_integration_tests::{
    close_code, next_json, next_message, send_json, MockUpstream, TestGateway, UPSTREAM_API_KEY,
};
use voicegate_tools::{Tool, ToolRegistry};

/// Knowledge search stand-in that counts its calls.
struct SearchTool {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search_algolia"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("search_algolia", "Search the documentation index").with_parameters(json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"]
        }))
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match args.get("query").and_then(Value::as_str) {
            Some(_) => Ok("result-text".to_string()),
            None => Err(ToolError::InvalidInput("missing query".into())),
        }
    }
}

async fn tools(calls: Arc<AtomicUsize>) -> Arc<ToolRegistry> {
    let registry = ToolRegistry::new();
    registry.register(Arc::new(SearchTool { calls })).await;
    Arc::new(registry)
}

#[tokio::test]
async fn test_settings_injection_and_function_call() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut upstream = MockUpstream::spawn().await;
    let gateway = TestGateway::spawn(&upstream.url, tools(calls.clone()).await).await;

    let mut client = gateway.connect().await;
    let mut agent = upstream.accept().await;
    assert_eq!(agent.path, "/v1/agent/converse");
    assert_eq!(
        agent.authorization.as_deref(),
        Some(format!("Bearer {}", UPSTREAM_API_KEY).as_str())
    );

    // Client settings arrive upstream with the gateway's catalogue.
    send_json(
        &mut client,
        json!({
            "type": "Settings",
            "audio": { "input": { "encoding": "linear16", "sample_rate": 16000 } },
            "agent": { "think": { "functions": [] } }
        }),
    )
    .await;
    let settings = next_json(&mut agent.socket).await;
    let functions = settings["agent"]["think"]["functions"].as_array().unwrap();
    assert_eq!(functions.len(), 1);
    assert_eq!(functions[0]["name"], "search_algolia");
    assert_eq!(settings["audio"]["input"]["sample_rate"], 16000);

    // The function call is answered by the gateway; the client never sees it.
    send_json(
        &mut agent.socket,
        json!({
            "type": "FunctionCallRequest",
            "function_name": "search_algolia",
            "correlation_id": "abc",
            "input": { "query": "pricing" }
        }),
    )
    .await;
    let response = next_json(&mut agent.socket).await;
    assert_eq!(
        response,
        json!({ "type": "FunctionCallResponse", "correlation_id": "abc", "output": "result-text" })
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    send_json(&mut agent.socket, json!({ "type": "ConversationText", "content": "Here you go" })).await;
    let first_seen = next_json(&mut client).await;
    assert_eq!(first_seen["type"], "ConversationText");

    gateway.shutdown.cancel();
}

#[tokio::test]
async fn test_binary_audio_passes_both_ways() {
    let mut upstream = MockUpstream::spawn().await;
    let gateway = TestGateway::spawn(&upstream.url, tools(Arc::default()).await).await;

    let mut client = gateway.connect().await;
    let mut agent = upstream.accept().await;

    let audio = vec![0u8, 1, 2, 250, 251, 252];
    client.send(Message::Binary(audio.clone())).await.unwrap();
    assert_eq!(next_message(&mut agent.socket).await, Message::Binary(audio.clone()));

    agent.socket.send(Message::Binary(audio.clone())).await.unwrap();
    assert_eq!(next_message(&mut client).await, Message::Binary(audio));

    gateway.shutdown.cancel();
}

#[tokio::test]
async fn test_upstream_close_ends_session() {
    let mut upstream = MockUpstream::spawn().await;
    let gateway = TestGateway::spawn(&upstream.url, tools(Arc::default()).await).await;

    let mut client = gateway.connect().await;
    let mut agent = upstream.accept().await;
    gateway.wait_for_sessions(1).await;

    agent
        .socket
        .send(Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "conversation over".into(),
        })))
        .await
        .unwrap();

    let message = next_message(&mut client).await;
    assert_eq!(close_code(&message), Some(1000));
    gateway.wait_for_sessions(0).await;

    gateway.shutdown.cancel();
}

#[tokio::test]
async fn test_tool_failure_closes_client_with_internal_error() {
    let mut upstream = MockUpstream::spawn().await;
    let gateway = TestGateway::spawn(&upstream.url, tools(Arc::default()).await).await;

    let mut client = gateway.connect().await;
    let mut agent = upstream.accept().await;

    send_json(
        &mut agent.socket,
        json!({
            "type": "FunctionCallRequest",
            "function_name": "does_not_exist",
            "correlation_id": "x1",
            "input": {}
        }),
    )
    .await;

    let message = next_message(&mut client).await;
    assert_eq!(close_code(&message), Some(1011));
    gateway.wait_for_sessions(0).await;

    gateway.shutdown.cancel();
}

#[tokio::test]
async fn test_server_shutdown_sends_going_away() {
    let mut upstream = MockUpstream::spawn().await;
    let gateway = TestGateway::spawn(&upstream.url, tools(Arc::default()).await).await;

    let mut client = gateway.connect().await;
    let mut agent = upstream.accept().await;

    // Round-trip one frame so the relay is known to be running.
    send_json(&mut client, json!({ "type": "KeepAlive" })).await;
    assert_eq!(next_json(&mut agent.socket).await["type"], "KeepAlive");

    gateway.shutdown.cancel();
    let message = next_message(&mut client).await;
    assert_eq!(close_code(&message), Some(1001));
}

#[tokio::test]
async fn test_unreachable_upstream_rejects_client() {
    // Reserve a port and free it so nothing listens there.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let gateway = TestGateway::spawn(&dead, tools(Arc::default()).await).await;
    let mut client = gateway.connect().await;

    let message = next_message(&mut client).await;
    assert_eq!(close_code(&message), Some(1011));
    gateway.wait_for_sessions(0).await;

    gateway.shutdown.cancel();
}
