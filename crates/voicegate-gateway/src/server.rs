//! HTTP/WebSocket gateway server.

use crate::error::GatewayError;
use crate::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, Query, State, WebSocketUpgrade,
    },
    http::{header, HeaderMap, HeaderValue, Method},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use voicegate_core::config::{BindMode, GatewayConfig};
use voicegate_proxy::{split_socket, ProxyEngine, SessionRegistry};

/// Gateway server state.
pub struct GatewayState {
    /// Configuration.
    pub config: GatewayConfig,

    /// Proxy engine sessions are handed to.
    pub engine: Arc<ProxyEngine>,

    /// Live sessions.
    pub registry: Arc<SessionRegistry>,

    /// Parent of every session's cancellation token.
    shutdown: CancellationToken,

    /// One permit per allowed concurrent session.
    slots: Arc<Semaphore>,
}

/// Credentials accepted in the query string, for browser clients that cannot
/// set headers on a WebSocket handshake.
#[derive(Debug, Default, Deserialize)]
struct AuthQuery {
    access_token: Option<String>,
}

impl GatewayState {
    fn new(config: GatewayConfig, engine: Arc<ProxyEngine>, registry: Arc<SessionRegistry>) -> Self {
        let slots = Arc::new(Semaphore::new(
            config.max_connections.min(Semaphore::MAX_PERMITS),
        ));
        Self {
            config,
            engine,
            registry,
            shutdown: CancellationToken::new(),
            slots,
        }
    }

    /// Reserve a session slot; held until the session ends.
    fn reserve_slot(&self) -> std::result::Result<OwnedSemaphorePermit, GatewayError> {
        self.slots
            .clone()
            .try_acquire_owned()
            .map_err(|_| GatewayError::Capacity(self.config.max_connections))
    }

    /// Check the presented bearer token.
    ///
    /// Loopback binds without a configured token are trusted; otherwise the
    /// token must come from the `Authorization` header or the `access_token`
    /// query parameter.
    fn authenticate(&self, headers: &HeaderMap, query_token: Option<&str>) -> std::result::Result<(), GatewayError> {
        let expected = match self.config.auth_token.as_ref().filter(|t| !t.is_empty()) {
            Some(token) => token,
            None if self.config.bind == BindMode::Loopback => return Ok(()),
            None => {
                return Err(GatewayError::Auth(
                    "Authentication required for non-loopback connections".to_string(),
                ))
            }
        };

        let header_token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        match header_token.or(query_token) {
            Some(token) if expected.matches(token) => Ok(()),
            Some(_) => Err(GatewayError::Auth("Invalid authentication token".to_string())),
            None => Err(GatewayError::Auth("Missing authentication token".to_string())),
        }
    }

    /// Validate the WebSocket Origin header.
    fn validate_origin(&self, headers: &HeaderMap) -> std::result::Result<(), GatewayError> {
        // Loopback: any origin is fine
        if self.config.bind == BindMode::Loopback {
            return Ok(());
        }

        let origin = match headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) {
            Some(o) => o,
            None => return Ok(()), // No origin header (non-browser client)
        };

        // Prefix match to handle ports
        if self
            .config
            .allowed_origins
            .iter()
            .any(|allowed| origin.starts_with(allowed.as_str()))
        {
            return Ok(());
        }

        warn!("Rejected WebSocket connection from untrusted origin: {}", origin);
        Err(GatewayError::Forbidden(origin.to_string()))
    }
}

/// The HTTP/WebSocket gateway server.
pub struct Gateway {
    /// Server state.
    state: Arc<GatewayState>,
}

impl Gateway {
    /// Create a new gateway.
    pub fn new(config: GatewayConfig, engine: Arc<ProxyEngine>, registry: Arc<SessionRegistry>) -> Self {
        let state = Arc::new(GatewayState::new(config, engine, registry));

        Self { state }
    }

    /// Shared server state.
    pub fn state(&self) -> &Arc<GatewayState> {
        &self.state
    }

    /// Bind the configured address and serve until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let addr = self.bind_address();

        // Security warning for non-loopback binds
        if self.state.config.bind != BindMode::Loopback {
            warn!("Gateway binding to {} is accessible from the network", addr);
        }

        let listener = tokio::net::TcpListener::bind(addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` is cancelled.
    ///
    /// Cancelling `shutdown` also cancels every live session, which closes
    /// their clients with status 1001.
    pub async fn serve(&self, listener: tokio::net::TcpListener, shutdown: CancellationToken) -> Result<()> {
        let addr = listener.local_addr()?;
        info!(
            "Starting gateway server on {} (sessions at {})",
            addr, self.state.config.path
        );

        let sessions = self.state.shutdown.clone();
        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!("Shutting down gateway");
            sessions.cancel();
        })
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

        // Sessions were cancelled with the server; wait for their teardown.
        self.state.registry.close_all().await;
        info!("Gateway stopped");

        Ok(())
    }

    /// Create the Axum router.
    pub fn router(&self) -> Router {
        let state = self.state.clone();

        let mut router = Router::new()
            .route(&self.state.config.path, get(ws_handler))
            .route("/health", get(health_handler))
            .route("/sessions", get(sessions_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http());

        if self.state.config.cors {
            router = router.layer(Self::create_cors_layer(&self.state.config));
        }

        router
    }

    /// CORS layer restricted to the configured origins.
    fn create_cors_layer(config: &GatewayConfig) -> CorsLayer {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .max_age(std::time::Duration::from_secs(3600))
    }

    /// Get the bind address.
    fn bind_address(&self) -> SocketAddr {
        let ip = match self.state.config.bind {
            BindMode::Loopback => [127, 0, 0, 1],
            BindMode::Lan => [0, 0, 0, 0],
        };

        SocketAddr::from((ip, self.state.config.port))
    }
}

/// WebSocket upgrade handler with connection cap, origin and token checks.
async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Query(query): Query<AuthQuery>,
    State(state): State<Arc<GatewayState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> std::result::Result<impl IntoResponse, GatewayError> {
    // 1. Max connections check; the slot is held for the whole session
    let slot = match state.reserve_slot() {
        Ok(slot) => slot,
        Err(e) => {
            warn!(
                "Max connections ({}) reached, rejecting {}",
                state.config.max_connections, addr
            );
            return Err(e);
        }
    };

    // 2. Origin validation
    state.validate_origin(&headers)?;

    // 3. Authentication
    if let Err(e) = state.authenticate(&headers, query.access_token.as_deref()) {
        warn!("Authentication failed from {}: {}", addr, e);
        return Err(e);
    }

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, addr, slot)))
}

/// Hand an upgraded socket to the proxy engine.
async fn handle_socket(
    socket: WebSocket,
    state: Arc<GatewayState>,
    remote_addr: SocketAddr,
    _slot: OwnedSemaphorePermit,
) {
    let client = split_socket::<_, Message>(socket, remote_addr.to_string());
    let cancel = state.shutdown.child_token();

    if let Err(e) = state.engine.run_session(client, cancel).await {
        debug!("Session from {} ended: {}", remote_addr, e);
    }
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let sessions = state.registry.count().await;
    Json(serde_json::json!({
        "status": "ok",
        "sessions": sessions,
    }))
}

/// Live session listing, gated like the WebSocket endpoint.
async fn sessions_handler(
    headers: HeaderMap,
    Query(query): Query<AuthQuery>,
    State(state): State<Arc<GatewayState>>,
) -> std::result::Result<impl IntoResponse, GatewayError> {
    state.authenticate(&headers, query.access_token.as_deref())?;
    Ok(Json(state.registry.list().await))
}
