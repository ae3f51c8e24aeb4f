//! Configuration schema definitions.

use crate::secret::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Main Voicegate configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Gateway (client-facing) settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Upstream voice agent settings.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Tool catalogue and execution settings.
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Gateway configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Bind mode.
    #[serde(default)]
    pub bind: BindMode,

    /// Port number.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token clients must present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<SecretString>,

    /// Enable CORS.
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Origins accepted for browser clients on non-loopback binds.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Maximum concurrent voice sessions.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// WebSocket path clients connect to.
    #[serde(default = "default_gateway_path")]
    pub path: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: BindMode::default(),
            port: default_port(),
            auth_token: None,
            cors: true,
            allowed_origins: default_allowed_origins(),
            max_connections: default_max_connections(),
            path: default_gateway_path(),
        }
    }
}

fn default_port() -> u16 {
    8787
}

fn default_max_connections() -> usize {
    100
}

fn default_gateway_path() -> String {
    "/v1/agent".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        "http://127.0.0.1".to_string(),
        "https://localhost".to_string(),
        "https://127.0.0.1".to_string(),
    ]
}

/// Bind mode for the gateway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    /// Bind to loopback only (127.0.0.1).
    #[default]
    Loopback,

    /// Bind to all interfaces.
    Lan,
}

impl std::str::FromStr for BindMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "loopback" => Ok(Self::Loopback),
            "lan" => Ok(Self::Lan),
            other => Err(format!("Invalid bind mode: {}", other)),
        }
    }
}

/// Upstream voice agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base WebSocket URL, e.g. `wss://agent.deepgram.com`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Path appended to the base URL.
    #[serde(default = "default_upstream_path")]
    pub path: String,

    /// API key sent in the authorization header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<SecretString>,

    /// Authorization scheme placed before the key.
    #[serde(default = "default_auth_scheme")]
    pub auth_scheme: String,

    /// Connection attempts before giving up.
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    /// Fixed delay between connection attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl UpstreamConfig {
    /// Delay between connection attempts.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            path: default_upstream_path(),
            api_key: None,
            auth_scheme: default_auth_scheme(),
            connect_attempts: default_connect_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_upstream_path() -> String {
    "/v1/agent/converse".to_string()
}

fn default_auth_scheme() -> String {
    "Bearer".to_string()
}

fn default_connect_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

/// Tool configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Upper bound for a single tool call, in seconds (0 disables it).
    #[serde(default = "default_tool_timeout_secs")]
    pub timeout_secs: u64,

    /// Register the built-in clock tool.
    #[serde(default = "default_true")]
    pub clock: bool,

    /// Knowledge sources reached over HTTP.
    #[serde(default)]
    pub webhooks: Vec<WebhookToolConfig>,
}

impl ToolsConfig {
    /// Per-call timeout, if enabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_tool_timeout_secs(),
            clock: true,
            webhooks: Vec::new(),
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    30
}

/// A tool backed by an HTTP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookToolConfig {
    /// Tool name advertised to the agent.
    pub name: String,

    /// Description advertised to the agent.
    pub description: String,

    /// JSON Schema for the arguments.
    #[serde(default = "default_parameters")]
    pub parameters: serde_json::Value,

    /// Endpoint receiving the arguments as a JSON POST body.
    pub url: String,

    /// Bearer key for the endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<SecretString>,

    /// Extra request headers.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// HTTP timeout in seconds.
    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_parameters() -> serde_json::Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

fn default_webhook_timeout_secs() -> u64 {
    15
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,

    /// One JSON object per line.
    Json,
}

fn default_true() -> bool {
    true
}
