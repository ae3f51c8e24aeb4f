//! Upstream agent connection establishment with bounded retry.

use crate::connection::{split_socket, Connection};
use crate::error::ProxyError;
use crate::frame::WireMessage;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;
use voicegate_core::config::UpstreamConfig;
use voicegate_core::SecretString;

/// Opens one WebSocket connection to the upstream agent.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Dial `url`, sending `authorization` as the `Authorization` header.
    async fn dial(&self, url: &Url, authorization: &SecretString) -> Result<Connection>;
}

/// [`Dialer`] backed by `tokio-tungstenite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketDialer;

#[async_trait]
impl Dialer for WebSocketDialer {
    async fn dial(&self, url: &Url, authorization: &SecretString) -> Result<Connection> {
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(<Message as WireMessage>::transport_error)?;

        let mut value = HeaderValue::from_str(authorization.expose_secret())
            .map_err(|_| ProxyError::Config("API key contains invalid header characters".into()))?;
        value.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, value);

        let (socket, response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(<Message as WireMessage>::transport_error)?;
        debug!("Upstream handshake completed with status {}", response.status());

        Ok(split_socket::<_, Message>(socket, url.as_str()))
    }
}

/// Connects sessions to the upstream agent.
pub struct UpstreamConnector {
    config: UpstreamConfig,
    dialer: Arc<dyn Dialer>,
}

impl UpstreamConnector {
    /// Create a connector.
    pub fn new(config: UpstreamConfig, dialer: Arc<dyn Dialer>) -> Self {
        Self { config, dialer }
    }

    /// Create a connector using [`WebSocketDialer`].
    pub fn websocket(config: UpstreamConfig) -> Self {
        Self::new(config, Arc::new(WebSocketDialer))
    }

    /// Configured default path.
    pub fn default_path(&self) -> &str {
        &self.config.path
    }

    /// Resolve the endpoint URL for `path`.
    ///
    /// `path` is appended to whatever path the base URL already carries; a
    /// `?query` on `path` replaces the base query.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self
            .config
            .base_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ProxyError::Config("upstream.base_url is not set".into()))?;

        let mut url = Url::parse(base)
            .map_err(|e| ProxyError::Config(format!("upstream.base_url '{}' is invalid: {}", base, e)))?;
        if url.cannot_be_a_base() {
            return Err(ProxyError::Config(format!(
                "upstream.base_url '{}' cannot carry a path",
                base
            )));
        }

        let (suffix, query) = match path.split_once('?') {
            Some((suffix, query)) => (suffix, Some(query)),
            None => (path, None),
        };
        let suffix = suffix.trim_start_matches('/');
        if !suffix.is_empty() {
            let joined = format!("{}/{}", url.path().trim_end_matches('/'), suffix);
            url.set_path(&joined);
        }
        if let Some(query) = query {
            url.set_query(Some(query));
        }
        Ok(url)
    }

    fn authorization(&self) -> Result<SecretString> {
        let key = self
            .config
            .api_key
            .as_ref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ProxyError::Config("upstream.api_key is not set".into()))?;

        Ok(SecretString::new(format!(
            "{} {}",
            self.config.auth_scheme,
            key.expose_secret()
        )))
    }

    /// Open a connection to `path` on the upstream agent.
    ///
    /// Configuration problems fail immediately. Dial failures are retried up
    /// to `connect_attempts` times with a fixed `retry_delay_ms` pause between
    /// attempts.
    pub async fn connect(&self, path: &str) -> Result<Connection> {
        let url = self.endpoint(path)?;
        let authorization = self.authorization()?;
        let attempts = self.config.connect_attempts.max(1);
        let delay: Duration = self.config.retry_delay();

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.dialer.dial(&url, &authorization).await {
                Ok(connection) => {
                    info!("Connected to upstream {} (attempt {})", url, attempt);
                    return Ok(connection);
                }
                Err(e) if attempt < attempts => {
                    warn!(
                        "Upstream connect attempt {}/{} failed: {}; retrying in {:?}",
                        attempt, attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!("Upstream connect attempt {}/{} failed: {}", attempt, attempts, e);
                    return Err(ProxyError::ConnectFailed {
                        attempts,
                        last: Box::new(e),
                    });
                }
            }
        }
    }
}

impl std::fmt::Debug for UpstreamConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConnector")
            .field("base_url", &self.config.base_url)
            .field("connect_attempts", &self.config.connect_attempts)
            .finish()
    }
}
