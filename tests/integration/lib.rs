//! Shared harness for the cross-crate integration tests: a real gateway on an
//! ephemeral port and a scriptable mock of the upstream agent service.

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use voicegate_core::config::{GatewayConfig, UpstreamConfig};
use voicegate_core::SecretString;
use voicegate_gateway::Gateway;
use voicegate_proxy::{EngineOptions, ProxyEngine, SessionRegistry, UpstreamConnector};
use voicegate_tools::ToolRegistry;

/// How long any single expectation waits.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// API key the gateway presents upstream.
pub const UPSTREAM_API_KEY: &str = "test-upstream-key";

/// Client side of a test WebSocket.
pub type ClientSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One accepted upstream connection.
pub struct UpstreamConnection {
    /// Request path the gateway dialled.
    pub path: String,
    /// `Authorization` header the gateway sent.
    pub authorization: Option<String>,
    /// Server side of the socket.
    pub socket: WebSocketStream<TcpStream>,
}

/// Mock of the upstream agent service.
pub struct MockUpstream {
    /// `ws://` base URL.
    pub url: String,
    connections: mpsc::UnboundedReceiver<UpstreamConnection>,
}

impl MockUpstream {
    /// Listen on an ephemeral port and accept WebSocket connections.
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (tx, connections) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let seen = Arc::new(Mutex::new((String::new(), None)));
                let record = seen.clone();
                let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                    let authorization = request
                        .headers()
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    *record.lock() = (request.uri().path().to_string(), authorization);
                    Ok(response)
                };

                if let Ok(socket) = tokio_tungstenite::accept_hdr_async(stream, callback).await {
                    let (path, authorization) = seen.lock().clone();
                    let _ = tx.send(UpstreamConnection {
                        path,
                        authorization,
                        socket,
                    });
                }
            }
        });

        Self { url, connections }
    }

    /// Next accepted connection.
    pub async fn accept(&mut self) -> UpstreamConnection {
        tokio::time::timeout(STEP_TIMEOUT, self.connections.recv())
            .await
            .expect("timed out waiting for upstream connection")
            .expect("mock upstream stopped")
    }
}

/// A running gateway.
pub struct TestGateway {
    /// `host:port` the gateway listens on.
    pub addr: String,
    /// Live sessions.
    pub registry: Arc<SessionRegistry>,
    /// Cancels the server and every session.
    pub shutdown: CancellationToken,
}

impl TestGateway {
    /// Start a loopback gateway in front of `upstream_url`.
    pub async fn spawn(upstream_url: &str, tools: Arc<ToolRegistry>) -> Self {
        let upstream = UpstreamConfig {
            base_url: Some(upstream_url.to_string()),
            api_key: Some(SecretString::new(UPSTREAM_API_KEY)),
            retry_delay_ms: 10,
            ..Default::default()
        };
        let options = EngineOptions {
            upstream_path: upstream.path.clone(),
            tool_timeout: Some(Duration::from_secs(5)),
        };

        let registry = Arc::new(SessionRegistry::new());
        let engine = Arc::new(ProxyEngine::new(
            UpstreamConnector::websocket(upstream),
            tools.clone(),
            tools,
            registry.clone(),
            options,
        ));
        let gateway = Gateway::new(GatewayConfig::default(), engine, registry.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        tokio::spawn(async move { gateway.serve(listener, token).await });

        Self {
            addr,
            registry,
            shutdown,
        }
    }

    /// Open a client WebSocket on the session endpoint.
    pub async fn connect(&self) -> ClientSocket {
        let (socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/v1/agent", self.addr))
            .await
            .expect("client handshake");
        socket
    }

    /// Wait until the registry holds `count` sessions.
    pub async fn wait_for_sessions(&self, count: usize) {
        tokio::time::timeout(STEP_TIMEOUT, async {
            while self.registry.count().await != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("timed out waiting for session count");
    }
}

/// Next data or close message, skipping pings and pongs.
pub async fn next_message<S>(socket: &mut WebSocketStream<S>) -> Message
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    loop {
        let message = tokio::time::timeout(STEP_TIMEOUT, socket.next())
            .await
            .expect("timed out waiting for message")
            .expect("socket ended")
            .expect("socket error");
        match message {
            Message::Ping(_) | Message::Pong(_) => continue,
            other => return other,
        }
    }
}

/// Next text message decoded as JSON.
pub async fn next_json<S>(socket: &mut WebSocketStream<S>) -> serde_json::Value
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    match next_message(socket).await {
        Message::Text(text) => serde_json::from_str(&text).expect("JSON text frame"),
        other => panic!("expected text frame, got {:?}", other),
    }
}

/// Send a JSON value as a text frame.
pub async fn send_json<S>(socket: &mut WebSocketStream<S>, value: serde_json::Value)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    socket.send(Message::Text(value.to_string())).await.expect("send");
}

/// Close code of a close message.
pub fn close_code(message: &Message) -> Option<u16> {
    match message {
        Message::Close(Some(frame)) => Some(frame.code.into()),
        _ => None,
    }
}
