//! Session orchestration: connect upstream, build the chains, relay.

use crate::connection::{Connection, FrameWriter};
use crate::connector::UpstreamConnector;
use crate::error::ProxyError;
use crate::frame::close_code;
use crate::processor::ProcessorChain;
use crate::processors::{FunctionCallProcessor, SettingsProcessor};
use crate::registry::SessionRegistry;
use crate::session::Session;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use voicegate_core::{Config, ToolCatalogue, ToolExecutor};

/// Per-engine settings derived from configuration.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Upstream path each session connects to.
    pub upstream_path: String,

    /// Bound on each tool call; `None` waits indefinitely.
    pub tool_timeout: Option<Duration>,
}

impl EngineOptions {
    /// Take the options from a loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            upstream_path: config.upstream.path.clone(),
            tool_timeout: config.tools.timeout(),
        }
    }
}

/// The proxy engine: one [`Session`] per accepted client.
pub struct ProxyEngine {
    connector: UpstreamConnector,
    catalogue: Arc<dyn ToolCatalogue>,
    executor: Arc<dyn ToolExecutor>,
    registry: Arc<SessionRegistry>,
    options: EngineOptions,
}

impl ProxyEngine {
    /// Create a new engine.
    pub fn new(
        connector: UpstreamConnector,
        catalogue: Arc<dyn ToolCatalogue>,
        executor: Arc<dyn ToolExecutor>,
        registry: Arc<SessionRegistry>,
        options: EngineOptions,
    ) -> Self {
        Self {
            connector,
            catalogue,
            executor,
            registry,
            options,
        }
    }

    /// Live sessions.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Client-to-upstream chain for a new session.
    pub fn inbound_processors(&self) -> ProcessorChain {
        ProcessorChain::new().with(SettingsProcessor::new(self.catalogue.clone()))
    }

    /// Upstream-to-client chain for a new session.
    pub fn outbound_processors(&self) -> ProcessorChain {
        ProcessorChain::new().with(
            FunctionCallProcessor::new(self.executor.clone()).with_timeout(self.options.tool_timeout),
        )
    }

    /// Run one client session to completion.
    ///
    /// Connects upstream, relays until either side ends, and closes both
    /// connections before returning. Cancelling `cancel` ends the session
    /// with `Ok(())`.
    pub async fn run_session(&self, client: Connection, cancel: CancellationToken) -> Result<()> {
        let session = Arc::new(Session::new());
        info!(session = %session.id(), "Client connected: {}", client.peer());

        self.registry.register(session.clone()).await;
        let result = self.drive(&session, client, &cancel).await;
        self.registry.remove(session.id()).await;

        match &result {
            Ok(()) => info!(session = %session.id(), "Client disconnected"),
            Err(e) => warn!(session = %session.id(), "Session ended with error: {}", e),
        }
        result
    }

    async fn drive(&self, session: &Session, client: Connection, cancel: &CancellationToken) -> Result<()> {
        let client_writer = client.writer();

        let upstream = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = client_writer.close(close_code::GOING_AWAY, "server shutting down").await;
                return Ok(());
            }
            upstream = self.connector.connect(&self.options.upstream_path) => upstream,
        };

        let started = upstream.and_then(|upstream| {
            session.attach_upstream(upstream)?;
            session.start_proxy(client, self.inbound_processors(), self.outbound_processors())
        });
        if let Err(e) = started {
            reject(&client_writer, &e).await;
            return Err(e);
        }

        session.wait(cancel).await
    }
}

async fn reject(client: &Arc<dyn FrameWriter>, error: &ProxyError) {
    let reason = match error {
        ProxyError::ConnectFailed { .. } | ProxyError::Config(_) => "upstream unavailable",
        _ => "session setup failed",
    };
    let _ = client.close(error.close_code(), reason).await;
}

impl std::fmt::Debug for ProxyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyEngine")
            .field("connector", &self.connector)
            .field("options", &self.options)
            .finish()
    }
}
