//! Serve command.

use clap::Args;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use voicegate_core::config::{BindMode, Config};
use voicegate_core::SecretString;
use voicegate_gateway::Gateway;
use voicegate_proxy::{EngineOptions, ProxyEngine, SessionRegistry, UpstreamConnector};
use voicegate_tools::ToolRegistry;

/// Serve command arguments.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Bind mode (loopback, lan)
    #[arg(short, long)]
    pub bind: Option<BindMode>,

    /// Port number
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Bearer token clients must present
    #[arg(long)]
    pub auth_token: Option<String>,
}

impl ServeArgs {
    /// Apply flag overrides on top of file and environment values.
    fn apply(&self, config: &mut Config) {
        if let Some(bind) = self.bind {
            config.gateway.bind = bind;
        }
        if let Some(port) = self.port {
            config.gateway.port = port;
        }
        if let Some(token) = &self.auth_token {
            config.gateway.auth_token = Some(SecretString::new(token.clone()));
        }
    }
}

/// Run the serve command.
pub async fn run(args: ServeArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;
    args.apply(&mut config);
    config.validate()?;

    if config.upstream.base_url.is_none() || config.upstream.api_key.is_none() {
        warn!("Upstream base_url or api_key not configured; sessions will be rejected");
    }

    let tools = Arc::new(ToolRegistry::from_config(&config.tools)?);
    if tools.is_empty().await {
        warn!("No tools configured; client settings will advertise no functions");
    } else {
        info!("Tool catalogue ({}): {:?}", tools.len().await, tools.names().await);
    }

    let registry = Arc::new(SessionRegistry::new());
    let engine = Arc::new(ProxyEngine::new(
        UpstreamConnector::websocket(config.upstream.clone()),
        tools.clone(),
        tools,
        registry.clone(),
        EngineOptions::from_config(&config),
    ));
    let gateway = Gateway::new(config.gateway.clone(), engine, registry);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C");
        }
        signal.cancel();
    });

    if config.gateway.bind != BindMode::Loopback {
        info!("Clients must authenticate with the configured bearer token");
    }
    gateway.run(shutdown).await?;

    info!("Gateway stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_overrides() {
        let mut config = Config::default();
        let args = ServeArgs {
            bind: Some(BindMode::Lan),
            port: Some(9100),
            auth_token: Some("tok".into()),
        };
        args.apply(&mut config);

        assert_eq!(config.gateway.bind, BindMode::Lan);
        assert_eq!(config.gateway.port, 9100);
        assert!(config.gateway.auth_token.unwrap().matches("tok"));
    }

    #[test]
    fn test_no_flags_keep_config() {
        let mut config = Config::default();
        ServeArgs::default().apply(&mut config);
        assert_eq!(config.gateway.port, Config::default().gateway.port);
        assert!(config.gateway.auth_token.is_none());
    }
}
